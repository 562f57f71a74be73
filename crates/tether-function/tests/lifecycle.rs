use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tether_capability::{CapabilityError, FunctionClient};
use tether_config::{
  CodeRef, DatastoreTrigger, FunctionSpec, HttpMethod, RouteTrigger, RuntimeDescriptor,
  ScheduleTrigger, TriggerKind, TriggerSpec,
};
use tether_fake::{FakeControlPlane, TEST_ACCOUNT, TEST_REGION};
use tether_function::{FunctionLifecycle, LifecycleError, LifecycleSettings};
use tether_registry::{InMemoryRegistry, Registry, RegistryItem};
use tether_trigger::{BindingState, Role, Step, TriggerBinding, TriggerError};

const FN_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:fn-1";

fn settings() -> LifecycleSettings {
  LifecycleSettings {
    app_name: "shop".to_string(),
    account_id: TEST_ACCOUNT.to_string(),
    region: TEST_REGION.to_string(),
    partition: "aws".to_string(),
    execution_role_name: "TetherInvokeRole".to_string(),
    call_timeout: Duration::from_secs(5),
  }
}

fn setup_with(
  settings: LifecycleSettings,
) -> (Arc<FakeControlPlane>, InMemoryRegistry, FunctionLifecycle) {
  let fake = FakeControlPlane::new();
  let registry = InMemoryRegistry::new();
  let lifecycle =
    FunctionLifecycle::new(&fake.capabilities(), Arc::new(registry.clone()), settings);
  (fake, registry, lifecycle)
}

fn setup() -> (Arc<FakeControlPlane>, InMemoryRegistry, FunctionLifecycle) {
  setup_with(settings())
}

fn spec(triggers: impl IntoIterator<Item = TriggerSpec>) -> FunctionSpec {
  FunctionSpec {
    name: "fn-1".to_string(),
    code: CodeRef::ZipFile {
      path: "build/fn-1.zip".into(),
    },
    runtime: RuntimeDescriptor::default(),
    publish: true,
    environment: BTreeMap::new(),
    triggers: triggers.into_iter().collect(),
  }
}

fn schedule(expression: &str) -> TriggerSpec {
  TriggerSpec::Schedule(ScheduleTrigger {
    expression: expression.to_string(),
  })
}

fn route(path: &str) -> TriggerSpec {
  TriggerSpec::Route(RouteTrigger {
    api_id: "a1".to_string(),
    path: path.to_string(),
    method: HttpMethod::Post,
    content_type: "application/json".to_string(),
  })
}

fn datastore(id: &str) -> TriggerSpec {
  TriggerSpec::Datastore(DatastoreTrigger {
    datastore_id: id.to_string(),
  })
}

#[tokio::test]
async fn test_create_binds_every_trigger_and_persists() {
  let (fake, registry, lifecycle) = setup();
  fake.add_api("a1", &["/items"]);

  let report = lifecycle
    .create(&spec([schedule("rate(5 minutes)"), route("/items")]))
    .await
    .unwrap();

  assert!(report.is_success());
  assert_eq!(report.deployment.id, FN_ARN);
  assert_eq!(report.deployment.account_id, TEST_ACCOUNT);
  assert!(fake.function("fn-1").is_some());

  let kinds: Vec<TriggerKind> = report.bindings.iter().map(|r| r.binding.kind).collect();
  assert_eq!(kinds, vec![TriggerKind::Schedule, TriggerKind::Route]);
  assert!(
    report
      .bindings
      .iter()
      .all(|r| r.binding.state == BindingState::Active)
  );

  let item = registry.get("shop", FN_ARN).await.unwrap();
  assert_eq!(item.kind, "function");
  assert_eq!(item.triggers.len(), 2);
  assert_eq!(item.triggers[0]["kind"], "schedule");
  assert!(item.triggers[0]["createdIds"].is_array());

  let recorded = lifecycle.bindings(FN_ARN).await.unwrap();
  let reported: Vec<TriggerBinding> = report.bindings.into_iter().map(|r| r.binding).collect();
  assert_eq!(recorded, reported);
}

#[tokio::test]
async fn test_create_isolates_failed_binding() {
  let (fake, _registry, lifecycle) = setup();
  fake.add_api("a1", &["/health"]);

  let report = lifecycle
    .create(&spec([schedule("rate(5 minutes)"), route("/items")]))
    .await
    .unwrap();

  assert!(!report.is_success());
  assert!(fake.function("fn-1").is_some());
  assert_eq!(fake.rules().len(), 1);

  let failed: Vec<_> = report.failed().collect();
  assert_eq!(failed.len(), 1);
  assert_eq!(failed[0].binding.kind, TriggerKind::Route);
  assert_eq!(failed[0].binding.state, BindingState::Error);
  assert_eq!(
    failed[0].error.as_ref().and_then(TriggerError::step),
    Some(Step::ResolveResource)
  );

  let recorded = lifecycle.bindings(FN_ARN).await.unwrap();
  assert_eq!(recorded[0].state, BindingState::Active);
  assert_eq!(recorded[1].state, BindingState::Error);
  assert!(recorded[1].last_error.is_some());
}

#[tokio::test]
async fn test_create_failure_binds_nothing() {
  let (fake, registry, lifecycle) = setup();
  fake.fail_on("create_function", CapabilityError::conflict("exists"));

  let err = lifecycle
    .create(&spec([schedule("rate(5 minutes)")]))
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    LifecycleError::Function {
      action: "create",
      ..
    }
  ));
  assert_eq!(fake.ops(), vec!["create_function"]);
  assert!(registry.items("shop").await.is_empty());
}

#[tokio::test]
async fn test_create_without_account_makes_no_calls() {
  let (fake, _registry, lifecycle) = setup_with(LifecycleSettings {
    account_id: String::new(),
    ..settings()
  });

  let err = lifecycle.create(&spec(Vec::<TriggerSpec>::new())).await.unwrap_err();

  assert!(matches!(err, LifecycleError::UnknownAccount { ref role } if role == "TetherInvokeRole"));
  assert!(fake.ops().is_empty());
}

#[tokio::test]
async fn test_read_missing_function() {
  let (_fake, _registry, lifecycle) = setup();

  let err = lifecycle.read(FN_ARN).await.unwrap_err();

  assert!(matches!(err, LifecycleError::NotFound { ref id } if id == FN_ARN));
}

#[tokio::test]
async fn test_read_returns_control_plane_view() {
  let (_fake, _registry, lifecycle) = setup();
  let created = lifecycle.create(&spec(Vec::<TriggerSpec>::new())).await.unwrap().deployment;

  let read = lifecycle.read(FN_ARN).await.unwrap();

  assert_eq!(read.code, None);
  assert_eq!(read.code_sha256, created.code_sha256);
  assert_eq!(read.name, "fn-1");
  assert_eq!(read.region, TEST_REGION);
}

#[tokio::test]
async fn test_update_leaves_unchanged_triggers_alone() {
  let (fake, _registry, lifecycle) = setup();
  let spec = spec([schedule("rate(5 minutes)")]);
  let created = lifecycle.create(&spec).await.unwrap();
  fake.clear_calls();

  let updated = lifecycle.update(FN_ARN, &spec).await.unwrap();

  assert!(updated.is_success());
  assert_eq!(fake.ops(), vec!["get_function", "update_function"]);
  assert_ne!(updated.deployment.code_sha256, created.deployment.code_sha256);
  assert_eq!(updated.bindings[0].binding, created.bindings[0].binding);
}

#[tokio::test]
async fn test_update_reconciles_changed_and_removed_triggers() {
  let (fake, registry, lifecycle) = setup();
  fake.add_api("a1", &["/items"]);
  fake.add_bucket("uploads");
  lifecycle
    .create(&spec([schedule("rate(5 minutes)"), route("/items")]))
    .await
    .unwrap();

  let report = lifecycle
    .update(
      FN_ARN,
      &spec([schedule("rate(10 minutes)"), datastore("arn:aws:s3:::uploads")]),
    )
    .await
    .unwrap();

  assert!(report.is_success());
  let kinds: Vec<TriggerKind> = report.bindings.iter().map(|r| r.binding.kind).collect();
  assert_eq!(kinds, vec![TriggerKind::Schedule, TriggerKind::Datastore]);

  let rules = fake.rules();
  assert_eq!(rules.len(), 1);
  assert_eq!(rules[0].expression, "rate(10 minutes)");
  assert!(fake.integrations().is_empty());
  assert_eq!(fake.notifications("uploads").len(), 1);
  assert_eq!(fake.permissions("fn-1").len(), 2);

  let item = registry.get("shop", FN_ARN).await.unwrap();
  assert_eq!(item.triggers.len(), 2);
}

#[tokio::test]
async fn test_update_resumes_failed_binding() {
  let (fake, _registry, lifecycle) = setup();
  fake.add_api("a1", &["/items"]);
  fake.fail_on("put_integration", CapabilityError::service("apigateway", "throttled"));
  let spec = spec([route("/items")]);

  let created = lifecycle.create(&spec).await.unwrap();
  assert_eq!(created.bindings[0].binding.state, BindingState::Error);
  assert_eq!(
    created.bindings[0].binding.created(Role::Permission),
    Some("tether-route-fn-1")
  );

  fake.clear_failure("put_integration");
  let updated = lifecycle.update(FN_ARN, &spec).await.unwrap();

  assert!(updated.is_success());
  assert_eq!(updated.bindings[0].binding.state, BindingState::Active);
  assert_eq!(fake.count("add_permission"), 1);
  assert_eq!(fake.integrations().len(), 1);
}

#[tokio::test]
async fn test_update_rejects_rename() {
  let (fake, _registry, lifecycle) = setup();
  lifecycle.create(&spec(Vec::<TriggerSpec>::new())).await.unwrap();
  fake.clear_calls();

  let renamed = FunctionSpec {
    name: "fn-2".to_string(),
    ..spec(Vec::<TriggerSpec>::new())
  };
  let err = lifecycle.update(FN_ARN, &renamed).await.unwrap_err();

  assert!(matches!(err, LifecycleError::InvalidSpec { .. }));
  assert_eq!(fake.ops(), vec!["get_function"]);
}

#[tokio::test]
async fn test_delete_unbinds_everything() {
  let (fake, registry, lifecycle) = setup();
  fake.add_table("orders");
  let before = fake.snapshot();
  lifecycle
    .create(&spec([
      schedule("rate(5 minutes)"),
      datastore("arn:aws:dynamodb:us-east-1:123456789012:table/orders"),
    ]))
    .await
    .unwrap();

  let report = lifecycle.delete(FN_ARN, false).await.unwrap();

  assert_eq!(report.bindings.len(), 2);
  assert!(report.bindings.iter().all(|r| r.binding.is_released()));
  assert!(report.orphaned().is_empty());
  assert_eq!(fake.snapshot(), before);
  assert!(registry.items("shop").await.is_empty());
  assert!(lifecycle.orchestrator().locks().is_empty());
}

#[tokio::test]
async fn test_delete_refused_when_teardown_fails() {
  let (fake, _registry, lifecycle) = setup();
  lifecycle
    .create(&spec([schedule("rate(5 minutes)")]))
    .await
    .unwrap();
  fake.fail_on("delete_rule", CapabilityError::service("events", "throttled"));

  let err = lifecycle.delete(FN_ARN, false).await.unwrap_err();

  let LifecycleError::DeletionRefused { id, pending } = err else {
    panic!("expected refusal, got {err:?}");
  };
  assert_eq!(id, FN_ARN);
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].state, BindingState::Error);
  assert_eq!(pending[0].created_ids.len(), 1);
  assert_eq!(pending[0].created_ids[0].role, Role::Rule);
  assert!(fake.function("fn-1").is_some());
  assert_eq!(lifecycle.bindings(FN_ARN).await.unwrap(), pending);

  fake.clear_failure("delete_rule");
  lifecycle.delete(FN_ARN, false).await.unwrap();
  assert!(fake.function("fn-1").is_none());
  assert!(fake.rules().is_empty());
}

#[tokio::test]
async fn test_forced_delete_reports_orphans() {
  let (fake, registry, lifecycle) = setup();
  lifecycle
    .create(&spec([schedule("rate(5 minutes)")]))
    .await
    .unwrap();
  fake.fail_on("delete_rule", CapabilityError::service("events", "throttled"));

  let report = lifecycle.delete(FN_ARN, true).await.unwrap();

  let orphaned = report.orphaned();
  assert_eq!(orphaned.len(), 1);
  assert_eq!(orphaned[0].role, Role::Rule);
  assert!(fake.function("fn-1").is_none());
  assert_eq!(fake.rules().len(), 1);

  let items = registry.items("shop").await;
  assert_eq!(items.len(), 1);
  let recorded = lifecycle.bindings(FN_ARN).await.unwrap();
  assert_eq!(recorded.len(), 1);
  assert_eq!(recorded[0].state, BindingState::Error);
  assert_eq!(recorded[0].created_ids[0].role, Role::Rule);

  fake.clear_failure("delete_rule");
  let report = lifecycle.delete(FN_ARN, false).await.unwrap();
  assert!(report.orphaned().is_empty());
  assert!(fake.rules().is_empty());
  assert!(registry.items("shop").await.is_empty());
}

#[tokio::test]
async fn test_delete_refuses_mid_transition_binding_even_when_forced() {
  let (fake, registry, lifecycle) = setup();
  lifecycle.create(&spec(Vec::<TriggerSpec>::new())).await.unwrap();

  let mut stuck = TriggerBinding::new(schedule("rate(5 minutes)"));
  stuck.state = BindingState::Provisioning;
  registry
    .put(
      "shop",
      &RegistryItem::function(FN_ARN, vec![serde_json::to_value(&stuck).unwrap()]),
    )
    .await
    .unwrap();

  let err = lifecycle.delete(FN_ARN, true).await.unwrap_err();

  assert!(matches!(err, LifecycleError::DeletionRefused { ref pending, .. } if pending.len() == 1));
  assert!(fake.function("fn-1").is_some());
  assert_eq!(fake.count("delete_function"), 0);
}

#[tokio::test]
async fn test_delete_of_vanished_function_releases_recorded_bindings() {
  let (fake, registry, lifecycle) = setup();
  lifecycle
    .create(&spec([schedule("rate(5 minutes)")]))
    .await
    .unwrap();
  fake.delete_function(FN_ARN).await.unwrap();

  let report = lifecycle.delete(FN_ARN, false).await.unwrap();

  assert!(report.bindings[0].binding.is_released());
  assert!(fake.rules().is_empty());
  assert!(registry.items("shop").await.is_empty());
}
