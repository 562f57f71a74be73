use std::sync::Arc;
use std::time::Duration;

use tether_capability::{
  CapabilityError, Principal, Protocol, SchedulerClient, StreamView, TableClient,
};
use tether_config::{
  CodeRef, DatastoreTrigger, HttpMethod, RouteTrigger, ScheduleTrigger, SubscriptionTrigger,
  TriggerKind, TriggerSpec,
};
use tether_fake::{FakeControlPlane, TEST_ACCOUNT, TEST_REGION};
use tether_trigger::{
  BindingState, FunctionDeployment, Role, Step, TriggerBinding, TriggerError, TriggerOrchestrator,
};

fn setup() -> (Arc<FakeControlPlane>, TriggerOrchestrator, FunctionDeployment) {
  let fake = FakeControlPlane::new();
  let info = fake.add_function("fn-1");
  let orchestrator =
    TriggerOrchestrator::new(&fake.capabilities(), "TetherInvokeRole", Duration::from_secs(5));
  let deployment = FunctionDeployment::new(&info, TEST_ACCOUNT, TEST_REGION, "aws").with_code(
    CodeRef::ZipFile {
      path: "build/fn-1.zip".into(),
    },
  );
  (fake, orchestrator, deployment)
}

fn schedule(expression: &str) -> TriggerBinding {
  TriggerBinding::new(TriggerSpec::Schedule(ScheduleTrigger {
    expression: expression.to_string(),
  }))
}

fn route(api_id: &str, path: &str) -> TriggerBinding {
  TriggerBinding::new(TriggerSpec::Route(RouteTrigger {
    api_id: api_id.to_string(),
    path: path.to_string(),
    method: HttpMethod::Post,
    content_type: "application/json".to_string(),
  }))
}

fn subscription(buffered: bool) -> TriggerBinding {
  TriggerBinding::new(TriggerSpec::Subscription(SubscriptionTrigger {
    topic_id: format!("arn:aws:sns:{TEST_REGION}:{TEST_ACCOUNT}:orders"),
    buffered,
  }))
}

fn datastore(id: &str) -> TriggerBinding {
  TriggerBinding::new(TriggerSpec::Datastore(DatastoreTrigger {
    datastore_id: id.to_string(),
  }))
}

fn roles(binding: &TriggerBinding) -> Vec<Role> {
  binding.created_ids.iter().map(|c| c.role).collect()
}

fn ops_among(fake: &FakeControlPlane, wanted: &[&str]) -> Vec<String> {
  fake
    .ops()
    .into_iter()
    .filter(|op| wanted.contains(&op.as_str()))
    .collect()
}

#[tokio::test]
async fn test_schedule_bind_creates_rule_permission_and_target() {
  let (fake, orchestrator, deployment) = setup();
  let mut binding = schedule("rate(5 minutes)");

  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  assert_eq!(binding.state, BindingState::Active);
  assert_eq!(roles(&binding), vec![Role::Rule, Role::Permission, Role::Target]);

  let rules = fake.rules();
  assert_eq!(rules.len(), 1);
  assert_eq!(rules[0].expression, "rate(5 minutes)");
  assert_eq!(rules[0].targets.len(), 1);
  assert!(rules[0].targets.values().all(|arn| arn.ends_with(":function:fn-1")));

  let permissions = fake.permissions("fn-1");
  assert_eq!(permissions.len(), 1);
  assert_eq!(permissions[0].principal, Principal::Scheduler);
  assert_eq!(permissions[0].principal.as_str(), "scheduler");
  assert_eq!(permissions[0].source_arn, rules[0].arn);
}

#[tokio::test]
async fn test_schedule_unbind_restores_object_set() {
  let (fake, orchestrator, deployment) = setup();
  let before = fake.snapshot();
  let mut binding = schedule("rate(5 minutes)");

  orchestrator.bind(&deployment, &mut binding).await.unwrap();
  let after_bind = fake.snapshot();
  assert_eq!(after_bind.difference(&before).count(), 3);

  fake.clear_calls();
  orchestrator.unbind(&deployment, &mut binding).await.unwrap();

  assert_eq!(fake.snapshot(), before);
  assert_eq!(binding.state, BindingState::Absent);
  assert!(binding.created_ids.is_empty());
  assert_eq!(
    fake.ops(),
    vec!["remove_targets", "remove_permission", "delete_rule"]
  );
}

#[tokio::test]
async fn test_route_missing_path_creates_nothing() {
  let (fake, orchestrator, deployment) = setup();
  fake.add_api("a1", &["/health"]);
  let before = fake.snapshot();
  let mut binding = route("a1", "/items");

  let err = orchestrator
    .bind(&deployment, &mut binding)
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    TriggerError::ProvisioningStepFailed {
      kind: TriggerKind::Route,
      step: Step::ResolveResource,
      ref source,
    } if source.is_not_found()
  ));
  assert_eq!(binding.state, BindingState::Error);
  assert!(binding.created_ids.is_empty());
  assert!(binding.last_error.is_some());
  assert!(fake.permissions("fn-1").is_empty());
  assert_eq!(fake.count("add_permission"), 0);
  assert_eq!(fake.snapshot(), before);
}

#[tokio::test]
async fn test_route_bind_and_unbind() {
  let (fake, orchestrator, deployment) = setup();
  fake.add_api("a1", &["/health", "/items"]);
  let mut binding = route("a1", "/items");

  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  assert_eq!(roles(&binding), vec![Role::Permission, Role::Integration]);
  assert_eq!(binding.created(Role::Integration), Some("a1/res-1/POST"));

  let permissions = fake.permissions("fn-1");
  assert_eq!(permissions[0].principal, Principal::Gateway);
  assert_eq!(
    permissions[0].source_arn,
    "arn:aws:execute-api:us-east-1:123456789012:a1/*"
  );

  let integrations = fake.integrations();
  assert_eq!(integrations.len(), 1);
  assert_eq!(integrations[0].resource_id, "res-1");
  assert_eq!(
    integrations[0].role_arn,
    "arn:aws:iam::123456789012:role/TetherInvokeRole"
  );
  assert!(integrations[0].uri.contains(&deployment.id));

  fake.clear_calls();
  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert_eq!(fake.ops(), vec!["delete_integration", "remove_permission"]);
  assert!(fake.integrations().is_empty());
  assert!(fake.permissions("fn-1").is_empty());
}

#[tokio::test]
async fn test_table_datastore_enables_stream_and_maps_it() {
  let (fake, orchestrator, deployment) = setup();
  fake.add_table("orders");
  let mut binding = datastore("arn:aws:dynamodb:us-east-1:123456789012:table/orders");

  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  let (view, stream_arn) = fake.stream("orders").expect("stream enabled");
  assert_eq!(view, StreamView::NewImage);

  let mappings = fake.mappings();
  assert_eq!(mappings.len(), 1);
  assert_eq!(mappings[0].source_arn, stream_arn);
  assert_eq!(mappings[0].function, deployment.id);

  assert_eq!(roles(&binding), vec![Role::Stream, Role::StreamMapping]);
  assert_eq!(binding.created(Role::Stream), Some(stream_arn.as_str()));

  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert_eq!(fake.stream("orders"), None);
  assert!(fake.mappings().is_empty());
}

#[tokio::test]
async fn test_preexisting_stream_is_used_but_left_running() {
  let (fake, orchestrator, deployment) = setup();
  fake.add_table("orders");
  let existing = fake
    .enable_change_stream("orders", StreamView::NewImage)
    .await
    .unwrap();
  let mut binding = datastore("arn:aws:dynamodb:us-east-1:123456789012:table/orders");

  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  assert_eq!(binding.state, BindingState::Active);
  assert_eq!(roles(&binding), vec![Role::StreamMapping]);
  assert_eq!(fake.mappings()[0].source_arn, existing.arn);

  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert_eq!(fake.count("disable_change_stream"), 0);
  assert_eq!(
    fake.stream("orders"),
    Some((StreamView::NewImage, existing.arn))
  );
  assert!(fake.mappings().is_empty());
}

#[tokio::test]
async fn test_preexisting_keys_only_stream_is_rejected() {
  let (fake, orchestrator, deployment) = setup();
  fake.add_table("orders");
  let existing = fake
    .enable_change_stream("orders", StreamView::KeysOnly)
    .await
    .unwrap();
  let mut binding = datastore("arn:aws:dynamodb:us-east-1:123456789012:table/orders");

  let err = orchestrator
    .bind(&deployment, &mut binding)
    .await
    .unwrap_err();

  let TriggerError::ProvisioningStepFailed { step, source, .. } = err else {
    panic!("expected step failure, got {err:?}");
  };
  assert_eq!(step, Step::EnableStream);
  assert!(matches!(source, CapabilityError::Conflict { .. }), "{source:?}");
  assert_eq!(binding.state, BindingState::Error);
  assert!(binding.created_ids.is_empty());
  assert!(fake.mappings().is_empty());

  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert_eq!(
    fake.stream("orders"),
    Some((StreamView::KeysOnly, existing.arn))
  );
}

#[tokio::test]
async fn test_bucket_datastore_registers_notification() {
  let (fake, orchestrator, deployment) = setup();
  fake.add_bucket("uploads");
  let before = fake.snapshot();
  let mut binding = datastore("arn:aws:s3:::uploads");

  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  let notifications = fake.notifications("uploads");
  assert_eq!(notifications.len(), 1);
  assert_eq!(notifications[0].function_arn, deployment.id);
  assert_eq!(notifications[0].events, vec!["s3:ObjectCreated:*"]);

  let permissions = fake.permissions("fn-1");
  assert_eq!(permissions[0].principal, Principal::ObjectStore);
  assert_eq!(permissions[0].source_arn, "arn:aws:s3:::uploads");
  assert!(fake.stream("uploads").is_none());

  fake.clear_calls();
  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert_eq!(fake.ops(), vec!["remove_notification", "remove_permission"]);
  assert_eq!(fake.snapshot(), before);
}

#[tokio::test]
async fn test_unsupported_datastore_touches_nothing() {
  let (fake, orchestrator, deployment) = setup();
  let mut binding = datastore("arn:aws:sqs:us-east-1:123456789012:jobs");

  let err = orchestrator
    .bind(&deployment, &mut binding)
    .await
    .unwrap_err();

  assert!(matches!(err, TriggerError::UnsupportedDatastoreKind { ref service } if service == "sqs"));
  assert_eq!(binding.state, BindingState::Error);
  assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_buffered_subscription_creation_order() {
  let (fake, orchestrator, deployment) = setup();
  let before = fake.snapshot();
  let mut binding = subscription(true);

  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  assert_eq!(
    roles(&binding),
    vec![Role::Queue, Role::Subscription, Role::Mapping]
  );
  assert_eq!(
    ops_among(
      &fake,
      &["create_queue", "subscribe", "create_event_source_mapping"]
    ),
    vec!["create_queue", "subscribe", "create_event_source_mapping"]
  );

  let subscriptions = fake.subscriptions();
  assert_eq!(subscriptions.len(), 1);
  assert_eq!(subscriptions[0].protocol, Protocol::Sqs);
  assert_eq!(
    subscriptions[0].endpoint,
    format!("arn:aws:sqs:{TEST_REGION}:{TEST_ACCOUNT}:fn-1-buffer")
  );
  assert_eq!(fake.mappings()[0].source_arn, subscriptions[0].endpoint);

  fake.clear_calls();
  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert_eq!(
    fake.ops(),
    vec!["delete_event_source_mapping", "unsubscribe", "delete_queue"]
  );
  assert_eq!(fake.snapshot(), before);
}

#[tokio::test]
async fn test_direct_subscription_targets_function() {
  let (fake, orchestrator, deployment) = setup();
  let mut binding = subscription(false);

  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  assert_eq!(roles(&binding), vec![Role::Permission, Role::Subscription]);
  let subscriptions = fake.subscriptions();
  assert_eq!(subscriptions[0].protocol, Protocol::Lambda);
  assert_eq!(subscriptions[0].endpoint, deployment.id);
  assert_eq!(fake.permissions("fn-1")[0].principal, Principal::Topic);
  assert!(fake.queues().is_empty());
}

#[tokio::test]
async fn test_unbind_error_binding_with_only_queue() {
  let (fake, orchestrator, deployment) = setup();
  fake.fail_on("subscribe", CapabilityError::service("sns", "topic unavailable"));
  let mut binding = subscription(true);

  let err = orchestrator
    .bind(&deployment, &mut binding)
    .await
    .unwrap_err();
  assert_eq!(err.step(), Some(Step::Subscribe));
  assert_eq!(binding.state, BindingState::Error);
  assert_eq!(roles(&binding), vec![Role::Queue]);
  assert_eq!(fake.queues().len(), 1);

  fake.clear_calls();
  orchestrator.unbind(&deployment, &mut binding).await.unwrap();

  assert_eq!(fake.ops(), vec!["delete_queue"]);
  assert_eq!(binding.state, BindingState::Absent);
  assert!(fake.queues().is_empty());
}

#[tokio::test]
async fn test_rebind_resumes_after_failed_step() {
  let (fake, orchestrator, deployment) = setup();
  fake.fail_on("put_target", CapabilityError::service("events", "throttled"));
  let mut binding = schedule("rate(1 hour)");

  let err = orchestrator
    .bind(&deployment, &mut binding)
    .await
    .unwrap_err();
  assert_eq!(err.step(), Some(Step::AttachTarget));
  assert_eq!(roles(&binding), vec![Role::Rule, Role::Permission]);

  fake.clear_failure("put_target");
  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  assert_eq!(binding.state, BindingState::Active);
  assert_eq!(binding.last_error, None);
  assert_eq!(roles(&binding), vec![Role::Rule, Role::Permission, Role::Target]);
  assert_eq!(fake.count("put_rule"), 1);
  assert_eq!(fake.count("add_permission"), 1);
  assert_eq!(fake.count("put_target"), 2);
}

#[tokio::test]
async fn test_active_binding_is_not_rebound() {
  let (fake, orchestrator, deployment) = setup();
  let mut binding = schedule("rate(1 hour)");
  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  fake.clear_calls();
  orchestrator.bind(&deployment, &mut binding).await.unwrap();
  assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_existing_permission_statement_is_reused() {
  let (fake, orchestrator, deployment) = setup();
  let mut first = schedule("rate(1 hour)");
  orchestrator.bind(&deployment, &mut first).await.unwrap();

  // A binding rebuilt from scratch finds the statement already present.
  let mut second = schedule("rate(1 hour)");
  orchestrator.bind(&deployment, &mut second).await.unwrap();

  assert_eq!(fake.count("add_permission"), 1);
  assert_eq!(fake.permissions("fn-1").len(), 1);
}

#[tokio::test]
async fn test_failed_teardown_keeps_pending_ids() {
  let (fake, orchestrator, deployment) = setup();
  let mut binding = schedule("rate(1 hour)");
  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  fake.fail_on("delete_rule", CapabilityError::service("events", "internal"));
  let err = orchestrator
    .unbind(&deployment, &mut binding)
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    TriggerError::TeardownStepFailed {
      kind: TriggerKind::Schedule,
      step: Step::DeleteRule,
      ..
    }
  ));
  assert_eq!(binding.state, BindingState::Error);
  assert_eq!(roles(&binding), vec![Role::Rule]);

  fake.clear_failure("delete_rule");
  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert!(binding.is_released());
  assert!(fake.rules().is_empty());
}

#[tokio::test]
async fn test_already_removed_objects_count_as_released() {
  let (fake, orchestrator, deployment) = setup();
  let mut binding = schedule("rate(1 hour)");
  orchestrator.bind(&deployment, &mut binding).await.unwrap();

  let target = binding.created(Role::Target).unwrap().to_string();
  fake
    .remove_targets("fn-1-schedule", &[target])
    .await
    .unwrap();
  fake.delete_rule("fn-1-schedule").await.unwrap();

  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert_eq!(binding.state, BindingState::Absent);
}

#[tokio::test]
async fn test_unbind_absent_binding_is_noop() {
  let (fake, orchestrator, deployment) = setup();
  let mut binding = schedule("rate(1 hour)");

  orchestrator.unbind(&deployment, &mut binding).await.unwrap();
  assert!(fake.calls().is_empty());
  assert_eq!(binding.state, BindingState::Absent);
}

#[tokio::test]
async fn test_mid_transition_binding_is_rejected() {
  let (_fake, orchestrator, deployment) = setup();
  let mut binding = schedule("rate(1 hour)");
  binding.state = BindingState::Provisioning;

  let err = orchestrator
    .bind(&deployment, &mut binding)
    .await
    .unwrap_err();
  assert!(matches!(err, TriggerError::InvalidState { .. }));
  assert_eq!(binding.state, BindingState::Provisioning);
}
