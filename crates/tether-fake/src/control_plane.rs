use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tether_capability::{
  ApiResource, Capabilities, CapabilityError, ChangeStream, CreateFunctionRequest, FunctionClient,
  FunctionInfo, IntegrationRequest, NotificationConfig, ObjectStoreClient, PermissionGrant,
  Protocol, QueueClient, RouteClient, SchedulerClient, StreamView, TableClient, TopicClient,
};
use tether_config::HttpMethod;

pub const TEST_ACCOUNT: &str = "123456789012";
pub const TEST_REGION: &str = "us-east-1";

/// One recorded capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub op: String,
  /// The call's primary argument (a name, ARN or URL).
  pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRule {
  pub arn: String,
  pub expression: String,
  /// Target id -> target ARN.
  pub targets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeSubscription {
  pub arn: String,
  pub topic_arn: String,
  pub protocol: Protocol,
  pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeMapping {
  pub id: String,
  pub source_arn: String,
  pub function: String,
}

#[derive(Default)]
struct State {
  functions: BTreeMap<String, FunctionInfo>,
  permissions: BTreeMap<String, BTreeMap<String, PermissionGrant>>,
  rules: BTreeMap<String, FakeRule>,
  apis: BTreeMap<String, Vec<ApiResource>>,
  integrations: BTreeMap<String, IntegrationRequest>,
  subscriptions: BTreeMap<String, FakeSubscription>,
  queues: BTreeMap<String, String>,
  tables: BTreeMap<String, Option<(StreamView, String)>>,
  buckets: BTreeMap<String, Vec<NotificationConfig>>,
  mappings: BTreeMap<String, FakeMapping>,
  revision: u64,
}

impl State {
  fn next_revision(&mut self) -> u64 {
    self.revision += 1;
    self.revision
  }
}

/// An in-memory control plane implementing every capability trait.
///
/// Fixtures that tether never creates itself (APIs, tables, buckets) are
/// added with the `add_*` helpers and are not part of [`snapshot`].
///
/// [`snapshot`]: FakeControlPlane::snapshot
#[derive(Default)]
pub struct FakeControlPlane {
  state: Mutex<State>,
  calls: Mutex<Vec<Call>>,
  failures: Mutex<HashMap<String, CapabilityError>>,
  delays: Mutex<HashMap<String, Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Functions may be addressed by name or ARN.
fn function_name(id: &str) -> &str {
  id.rsplit_once(":function:").map_or(id, |(_, name)| name)
}

fn integration_key(api_id: &str, resource_id: &str, method: HttpMethod) -> String {
  format!("{api_id}/{resource_id}/{method}")
}

impl FakeControlPlane {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Capability handles backed by this double.
  pub fn capabilities(self: &Arc<Self>) -> Capabilities {
    Capabilities {
      function: self.clone(),
      scheduler: self.clone(),
      route: self.clone(),
      topic: self.clone(),
      queue: self.clone(),
      table: self.clone(),
      object_store: self.clone(),
    }
  }

  // Fixtures

  /// Register an HTTP API exposing `paths`. Resource ids are `res-<n>`.
  pub fn add_api(&self, api_id: &str, paths: &[&str]) {
    let resources = paths
      .iter()
      .enumerate()
      .map(|(i, path)| ApiResource {
        id: format!("res-{i}"),
        path: path.to_string(),
      })
      .collect();
    lock(&self.state).apis.insert(api_id.to_string(), resources);
  }

  pub fn add_table(&self, table: &str) {
    lock(&self.state).tables.insert(table.to_string(), None);
  }

  pub fn add_bucket(&self, bucket: &str) {
    lock(&self.state).buckets.insert(bucket.to_string(), Vec::new());
  }

  /// Deploy a function directly, bypassing the call trace.
  pub fn add_function(&self, name: &str) -> FunctionInfo {
    let mut state = lock(&self.state);
    let revision = state.next_revision();
    let info = FunctionInfo {
      name: name.to_string(),
      arn: format!("arn:aws:lambda:{TEST_REGION}:{TEST_ACCOUNT}:function:{name}"),
      runtime: Default::default(),
      code_sha256: format!("sha-{revision}"),
      last_modified: format!("rev-{revision}"),
    };
    state.functions.insert(name.to_string(), info.clone());
    info
  }

  // Failure injection

  /// Fail every subsequent call to `op` with `error`.
  pub fn fail_on(&self, op: &str, error: CapabilityError) {
    lock(&self.failures).insert(op.to_string(), error);
  }

  pub fn clear_failure(&self, op: &str) {
    lock(&self.failures).remove(op);
  }

  /// Stall every subsequent call to `op` for `delay` before answering.
  pub fn delay_on(&self, op: &str, delay: Duration) {
    lock(&self.delays).insert(op.to_string(), delay);
  }

  // Inspection

  pub fn calls(&self) -> Vec<Call> {
    lock(&self.calls).clone()
  }

  /// Names of the recorded calls, in order.
  pub fn ops(&self) -> Vec<String> {
    lock(&self.calls).iter().map(|c| c.op.clone()).collect()
  }

  pub fn count(&self, op: &str) -> usize {
    lock(&self.calls).iter().filter(|c| c.op == op).count()
  }

  pub fn clear_calls(&self) {
    lock(&self.calls).clear();
  }

  /// Every object tether can create, as comparable descriptors.
  pub fn snapshot(&self) -> BTreeSet<String> {
    let state = lock(&self.state);
    let mut objects = BTreeSet::new();

    for name in state.functions.keys() {
      objects.insert(format!("function:{name}"));
    }
    for (function, grants) in &state.permissions {
      for sid in grants.keys() {
        objects.insert(format!("permission:{function}/{sid}"));
      }
    }
    for (name, rule) in &state.rules {
      objects.insert(format!("rule:{name}"));
      for target in rule.targets.keys() {
        objects.insert(format!("target:{name}/{target}"));
      }
    }
    for key in state.integrations.keys() {
      objects.insert(format!("integration:{key}"));
    }
    for arn in state.subscriptions.keys() {
      objects.insert(format!("subscription:{arn}"));
    }
    for url in state.queues.keys() {
      objects.insert(format!("queue:{url}"));
    }
    for (table, stream) in &state.tables {
      if let Some((view, _)) = stream {
        objects.insert(format!("stream:{table}:{}", view.as_str()));
      }
    }
    for (bucket, configs) in &state.buckets {
      for config in configs {
        objects.insert(format!("notification:{bucket}/{}", config.id));
      }
    }
    for id in state.mappings.keys() {
      objects.insert(format!("mapping:{id}"));
    }

    objects
  }

  pub fn function(&self, name: &str) -> Option<FunctionInfo> {
    lock(&self.state).functions.get(function_name(name)).cloned()
  }

  pub fn rule(&self, name: &str) -> Option<FakeRule> {
    lock(&self.state).rules.get(name).cloned()
  }

  pub fn rules(&self) -> Vec<FakeRule> {
    lock(&self.state).rules.values().cloned().collect()
  }

  pub fn permissions(&self, function: &str) -> Vec<PermissionGrant> {
    lock(&self.state)
      .permissions
      .get(function_name(function))
      .map(|grants| grants.values().cloned().collect())
      .unwrap_or_default()
  }

  pub fn integrations(&self) -> Vec<IntegrationRequest> {
    lock(&self.state).integrations.values().cloned().collect()
  }

  pub fn subscriptions(&self) -> Vec<FakeSubscription> {
    lock(&self.state).subscriptions.values().cloned().collect()
  }

  /// URLs of existing queues.
  pub fn queues(&self) -> Vec<String> {
    lock(&self.state).queues.keys().cloned().collect()
  }

  pub fn stream(&self, table: &str) -> Option<(StreamView, String)> {
    lock(&self.state).tables.get(table).cloned().flatten()
  }

  pub fn notifications(&self, bucket: &str) -> Vec<NotificationConfig> {
    lock(&self.state)
      .buckets
      .get(bucket)
      .cloned()
      .unwrap_or_default()
  }

  pub fn mappings(&self) -> Vec<FakeMapping> {
    lock(&self.state).mappings.values().cloned().collect()
  }

  /// Record the call, apply any configured delay, then any configured failure.
  async fn enter(&self, op: &str, target: &str) -> Result<(), CapabilityError> {
    lock(&self.calls).push(Call {
      op: op.to_string(),
      target: target.to_string(),
    });

    let delay = lock(&self.delays).get(op).copied();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    match lock(&self.failures).get(op) {
      Some(error) => Err(error.clone()),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl FunctionClient for FakeControlPlane {
  async fn create_function(
    &self,
    request: &CreateFunctionRequest,
  ) -> Result<FunctionInfo, CapabilityError> {
    self.enter("create_function", &request.name).await?;
    let mut state = lock(&self.state);

    if state.functions.contains_key(&request.name) {
      return Err(CapabilityError::conflict(format!(
        "function {} already exists",
        request.name
      )));
    }

    let revision = state.next_revision();
    let info = FunctionInfo {
      name: request.name.clone(),
      arn: format!(
        "arn:aws:lambda:{TEST_REGION}:{TEST_ACCOUNT}:function:{}",
        request.name
      ),
      runtime: request.runtime.clone(),
      code_sha256: format!("sha-{revision}"),
      last_modified: format!("rev-{revision}"),
    };
    state.functions.insert(request.name.clone(), info.clone());
    Ok(info)
  }

  async fn get_function(&self, function: &str) -> Result<FunctionInfo, CapabilityError> {
    self.enter("get_function", function).await?;
    lock(&self.state)
      .functions
      .get(function_name(function))
      .cloned()
      .ok_or_else(|| CapabilityError::not_found(format!("function {function}")))
  }

  async fn update_function(
    &self,
    function: &str,
    request: &CreateFunctionRequest,
  ) -> Result<FunctionInfo, CapabilityError> {
    self.enter("update_function", function).await?;
    let mut state = lock(&self.state);
    let revision = state.next_revision();

    let info = state
      .functions
      .get_mut(function_name(function))
      .ok_or_else(|| CapabilityError::not_found(format!("function {function}")))?;
    info.runtime = request.runtime.clone();
    info.code_sha256 = format!("sha-{revision}");
    info.last_modified = format!("rev-{revision}");
    Ok(info.clone())
  }

  async fn delete_function(&self, function: &str) -> Result<(), CapabilityError> {
    self.enter("delete_function", function).await?;
    let mut state = lock(&self.state);
    let name = function_name(function);

    state
      .functions
      .remove(name)
      .ok_or_else(|| CapabilityError::not_found(format!("function {function}")))?;
    state.permissions.remove(name);
    Ok(())
  }

  async fn add_permission(&self, grant: &PermissionGrant) -> Result<(), CapabilityError> {
    self.enter("add_permission", &grant.statement_id).await?;
    let mut state = lock(&self.state);
    let name = function_name(&grant.function).to_string();

    if !state.functions.contains_key(&name) {
      return Err(CapabilityError::not_found(format!("function {name}")));
    }

    let grants = state.permissions.entry(name).or_default();
    if grants.contains_key(&grant.statement_id) {
      return Err(CapabilityError::conflict(format!(
        "statement {} already exists",
        grant.statement_id
      )));
    }
    grants.insert(grant.statement_id.clone(), grant.clone());
    Ok(())
  }

  async fn has_permission(
    &self,
    function: &str,
    statement_id: &str,
  ) -> Result<bool, CapabilityError> {
    self.enter("has_permission", statement_id).await?;
    Ok(
      lock(&self.state)
        .permissions
        .get(function_name(function))
        .is_some_and(|grants| grants.contains_key(statement_id)),
    )
  }

  async fn remove_permission(
    &self,
    function: &str,
    statement_id: &str,
  ) -> Result<(), CapabilityError> {
    self.enter("remove_permission", statement_id).await?;
    lock(&self.state)
      .permissions
      .get_mut(function_name(function))
      .and_then(|grants| grants.remove(statement_id))
      .map(|_| ())
      .ok_or_else(|| CapabilityError::not_found(format!("statement {statement_id}")))
  }

  async fn create_event_source_mapping(
    &self,
    source_arn: &str,
    function: &str,
  ) -> Result<String, CapabilityError> {
    self.enter("create_event_source_mapping", source_arn).await?;
    let mut state = lock(&self.state);

    if !state.functions.contains_key(function_name(function)) {
      return Err(CapabilityError::not_found(format!("function {function}")));
    }

    let id = uuid::Uuid::new_v4().to_string();
    state.mappings.insert(
      id.clone(),
      FakeMapping {
        id: id.clone(),
        source_arn: source_arn.to_string(),
        function: function.to_string(),
      },
    );
    Ok(id)
  }

  async fn find_event_source_mapping(
    &self,
    source_arn: &str,
    function: &str,
  ) -> Result<Option<String>, CapabilityError> {
    self.enter("find_event_source_mapping", source_arn).await?;
    let name = function_name(function);
    Ok(
      lock(&self.state)
        .mappings
        .values()
        .find(|m| m.source_arn == source_arn && function_name(&m.function) == name)
        .map(|m| m.id.clone()),
    )
  }

  async fn delete_event_source_mapping(&self, mapping_id: &str) -> Result<(), CapabilityError> {
    self.enter("delete_event_source_mapping", mapping_id).await?;
    lock(&self.state)
      .mappings
      .remove(mapping_id)
      .map(|_| ())
      .ok_or_else(|| CapabilityError::not_found(format!("mapping {mapping_id}")))
  }
}

#[async_trait]
impl SchedulerClient for FakeControlPlane {
  async fn put_rule(&self, name: &str, expression: &str) -> Result<String, CapabilityError> {
    self.enter("put_rule", name).await?;
    let mut state = lock(&self.state);
    let arn = format!("arn:aws:events:{TEST_REGION}:{TEST_ACCOUNT}:rule/{name}");

    let rule = state.rules.entry(name.to_string()).or_insert_with(|| FakeRule {
      arn: arn.clone(),
      expression: String::new(),
      targets: BTreeMap::new(),
    });
    rule.expression = expression.to_string();
    Ok(arn)
  }

  async fn put_target(
    &self,
    rule: &str,
    target_id: &str,
    target_arn: &str,
  ) -> Result<(), CapabilityError> {
    self.enter("put_target", target_id).await?;
    lock(&self.state)
      .rules
      .get_mut(rule)
      .ok_or_else(|| CapabilityError::not_found(format!("rule {rule}")))?
      .targets
      .insert(target_id.to_string(), target_arn.to_string());
    Ok(())
  }

  async fn remove_targets(
    &self,
    rule: &str,
    target_ids: &[String],
  ) -> Result<(), CapabilityError> {
    self.enter("remove_targets", rule).await?;
    let mut state = lock(&self.state);
    let rule = state
      .rules
      .get_mut(rule)
      .ok_or_else(|| CapabilityError::not_found(format!("rule {rule}")))?;

    for id in target_ids {
      rule.targets.remove(id);
    }
    Ok(())
  }

  async fn delete_rule(&self, name: &str) -> Result<(), CapabilityError> {
    self.enter("delete_rule", name).await?;
    let mut state = lock(&self.state);

    match state.rules.get(name) {
      None => Err(CapabilityError::not_found(format!("rule {name}"))),
      Some(rule) if !rule.targets.is_empty() => Err(CapabilityError::conflict(format!(
        "rule {name} still has targets"
      ))),
      Some(_) => {
        state.rules.remove(name);
        Ok(())
      }
    }
  }
}

#[async_trait]
impl RouteClient for FakeControlPlane {
  async fn list_resources(&self, api_id: &str) -> Result<Vec<ApiResource>, CapabilityError> {
    self.enter("list_resources", api_id).await?;
    lock(&self.state)
      .apis
      .get(api_id)
      .cloned()
      .ok_or_else(|| CapabilityError::not_found(format!("api {api_id}")))
  }

  async fn put_integration(&self, request: &IntegrationRequest) -> Result<(), CapabilityError> {
    self.enter("put_integration", &request.resource_id).await?;
    let mut state = lock(&self.state);

    let exists = state
      .apis
      .get(&request.api_id)
      .is_some_and(|resources| resources.iter().any(|r| r.id == request.resource_id));
    if !exists {
      return Err(CapabilityError::not_found(format!(
        "resource {} on api {}",
        request.resource_id, request.api_id
      )));
    }

    state.integrations.insert(
      integration_key(&request.api_id, &request.resource_id, request.method),
      request.clone(),
    );
    Ok(())
  }

  async fn delete_integration(
    &self,
    api_id: &str,
    resource_id: &str,
    method: HttpMethod,
  ) -> Result<(), CapabilityError> {
    let key = integration_key(api_id, resource_id, method);
    self.enter("delete_integration", &key).await?;
    lock(&self.state)
      .integrations
      .remove(&key)
      .map(|_| ())
      .ok_or_else(|| CapabilityError::not_found(format!("integration {key}")))
  }
}

#[async_trait]
impl TopicClient for FakeControlPlane {
  async fn subscribe(
    &self,
    topic_arn: &str,
    protocol: Protocol,
    endpoint: &str,
  ) -> Result<String, CapabilityError> {
    self.enter("subscribe", topic_arn).await?;
    let mut state = lock(&self.state);

    if protocol == Protocol::Sqs && !state.queues.values().any(|arn| arn == endpoint) {
      return Err(CapabilityError::not_found(format!("queue {endpoint}")));
    }

    let revision = state.next_revision();
    let arn = format!("{topic_arn}:sub-{revision}");
    state.subscriptions.insert(
      arn.clone(),
      FakeSubscription {
        arn: arn.clone(),
        topic_arn: topic_arn.to_string(),
        protocol,
        endpoint: endpoint.to_string(),
      },
    );
    Ok(arn)
  }

  async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), CapabilityError> {
    self.enter("unsubscribe", subscription_arn).await?;
    lock(&self.state)
      .subscriptions
      .remove(subscription_arn)
      .map(|_| ())
      .ok_or_else(|| CapabilityError::not_found(format!("subscription {subscription_arn}")))
  }
}

#[async_trait]
impl QueueClient for FakeControlPlane {
  async fn create_queue(&self, name: &str) -> Result<String, CapabilityError> {
    self.enter("create_queue", name).await?;
    let url = format!("https://sqs.{TEST_REGION}.amazonaws.com/{TEST_ACCOUNT}/{name}");
    let arn = format!("arn:aws:sqs:{TEST_REGION}:{TEST_ACCOUNT}:{name}");

    lock(&self.state).queues.insert(url.clone(), arn);
    Ok(url)
  }

  async fn queue_arn(&self, queue_url: &str) -> Result<String, CapabilityError> {
    self.enter("queue_arn", queue_url).await?;
    lock(&self.state)
      .queues
      .get(queue_url)
      .cloned()
      .ok_or_else(|| CapabilityError::not_found(format!("queue {queue_url}")))
  }

  async fn delete_queue(&self, queue_url: &str) -> Result<(), CapabilityError> {
    self.enter("delete_queue", queue_url).await?;
    lock(&self.state)
      .queues
      .remove(queue_url)
      .map(|_| ())
      .ok_or_else(|| CapabilityError::not_found(format!("queue {queue_url}")))
  }
}

#[async_trait]
impl TableClient for FakeControlPlane {
  async fn enable_change_stream(
    &self,
    table: &str,
    view: StreamView,
  ) -> Result<ChangeStream, CapabilityError> {
    self.enter("enable_change_stream", table).await?;
    let mut state = lock(&self.state);
    let revision = state.next_revision();

    let stream = state
      .tables
      .get_mut(table)
      .ok_or_else(|| CapabilityError::not_found(format!("table {table}")))?;
    if let Some((view, arn)) = stream {
      return Ok(ChangeStream {
        arn: arn.clone(),
        view: *view,
        newly_enabled: false,
      });
    }

    let arn = format!("arn:aws:dynamodb:{TEST_REGION}:{TEST_ACCOUNT}:table/{table}/stream/{revision}");
    *stream = Some((view, arn.clone()));
    Ok(ChangeStream {
      arn,
      view,
      newly_enabled: true,
    })
  }

  async fn disable_change_stream(&self, table: &str) -> Result<(), CapabilityError> {
    self.enter("disable_change_stream", table).await?;
    let mut state = lock(&self.state);

    match state.tables.get_mut(table) {
      Some(stream) if stream.is_some() => {
        *stream = None;
        Ok(())
      }
      _ => Err(CapabilityError::not_found(format!("stream on table {table}"))),
    }
  }
}

#[async_trait]
impl ObjectStoreClient for FakeControlPlane {
  async fn put_notification(
    &self,
    bucket: &str,
    config: &NotificationConfig,
  ) -> Result<(), CapabilityError> {
    self.enter("put_notification", bucket).await?;
    let mut state = lock(&self.state);
    let configs = state
      .buckets
      .get_mut(bucket)
      .ok_or_else(|| CapabilityError::not_found(format!("bucket {bucket}")))?;

    configs.retain(|c| c.id != config.id);
    configs.push(config.clone());
    Ok(())
  }

  async fn remove_notification(&self, bucket: &str, id: &str) -> Result<(), CapabilityError> {
    self.enter("remove_notification", bucket).await?;
    let mut state = lock(&self.state);
    let configs = state
      .buckets
      .get_mut(bucket)
      .ok_or_else(|| CapabilityError::not_found(format!("bucket {bucket}")))?;

    let before = configs.len();
    configs.retain(|c| c.id != id);
    if configs.len() == before {
      return Err(CapabilityError::not_found(format!("notification {id}")));
    }
    Ok(())
  }
}
