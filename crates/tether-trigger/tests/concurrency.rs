use std::sync::Arc;
use std::time::Duration;

use tether_capability::CapabilityError;
use tether_config::{CodeRef, HttpMethod, RouteTrigger, ScheduleTrigger, TriggerSpec};
use tether_fake::{FakeControlPlane, TEST_ACCOUNT, TEST_REGION};
use tether_trigger::{
  BindingState, FunctionDeployment, Step, TriggerBinding, TriggerError, TriggerOrchestrator,
};

fn setup(
  call_timeout: Duration,
) -> (Arc<FakeControlPlane>, TriggerOrchestrator, FunctionDeployment) {
  let fake = FakeControlPlane::new();
  fake.add_api("a1", &["/items"]);
  let info = fake.add_function("fn-1");
  let orchestrator =
    TriggerOrchestrator::new(&fake.capabilities(), "TetherInvokeRole", call_timeout);
  let deployment = FunctionDeployment::new(&info, TEST_ACCOUNT, TEST_REGION, "aws").with_code(
    CodeRef::ZipFile {
      path: "build/fn-1.zip".into(),
    },
  );
  (fake, orchestrator, deployment)
}

fn schedule() -> TriggerBinding {
  TriggerBinding::new(TriggerSpec::Schedule(ScheduleTrigger {
    expression: "rate(5 minutes)".to_string(),
  }))
}

fn route() -> TriggerBinding {
  TriggerBinding::new(TriggerSpec::Route(RouteTrigger {
    api_id: "a1".to_string(),
    path: "/items".to_string(),
    method: HttpMethod::Get,
    content_type: "application/json".to_string(),
  }))
}

#[tokio::test(start_paused = true)]
async fn test_permission_grants_on_one_deployment_are_serialized() {
  let (fake, orchestrator, deployment) = setup(Duration::from_secs(5));
  fake.delay_on("add_permission", Duration::from_millis(50));

  let mut schedule = schedule();
  let mut route = route();
  let (a, b) = tokio::join!(
    orchestrator.bind(&deployment, &mut schedule),
    orchestrator.bind(&deployment, &mut route),
  );
  a.unwrap();
  b.unwrap();

  let policy_ops: Vec<String> = fake
    .ops()
    .into_iter()
    .filter(|op| op == "has_permission" || op == "add_permission")
    .collect();
  assert_eq!(
    policy_ops,
    vec![
      "has_permission",
      "add_permission",
      "has_permission",
      "add_permission"
    ]
  );
  assert_eq!(fake.permissions("fn-1").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unbind_waits_for_in_flight_bind() {
  let (fake, orchestrator, deployment) = setup(Duration::from_secs(5));

  let mut active = route();
  orchestrator.bind(&deployment, &mut active).await.unwrap();

  fake.delay_on("put_target", Duration::from_millis(100));
  let mut pending = schedule();
  let (bound, unbound) = tokio::join!(
    orchestrator.bind(&deployment, &mut pending),
    orchestrator.unbind(&deployment, &mut active),
  );
  bound.unwrap();
  unbound.unwrap();

  let ops = fake.ops();
  let put_target = ops.iter().position(|op| op == "put_target").unwrap();
  let delete_integration = ops
    .iter()
    .position(|op| op == "delete_integration")
    .unwrap();
  assert!(put_target < delete_integration, "{ops:?}");
}

#[tokio::test(start_paused = true)]
async fn test_stalled_call_fails_the_step() {
  let (fake, orchestrator, deployment) = setup(Duration::from_millis(100));
  fake.delay_on("put_rule", Duration::from_secs(10));

  let mut binding = schedule();
  let err = orchestrator
    .bind(&deployment, &mut binding)
    .await
    .unwrap_err();

  let TriggerError::ProvisioningStepFailed { step, source, .. } = err else {
    panic!("expected step failure, got {err:?}");
  };
  assert_eq!(step, Step::CreateRule);
  assert_eq!(
    source,
    CapabilityError::Timeout {
      after: Duration::from_millis(100)
    }
  );
  assert_eq!(binding.state, BindingState::Error);
  assert!(binding.created_ids.is_empty());
  assert_eq!(fake.count("put_rule"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_different_deployments_bind_in_parallel() {
  let fake = FakeControlPlane::new();
  fake.delay_on("add_permission", Duration::from_millis(50));
  let orchestrator =
    TriggerOrchestrator::new(&fake.capabilities(), "TetherInvokeRole", Duration::from_secs(5));

  let deployments: Vec<FunctionDeployment> = ["fn-a", "fn-b", "fn-c"]
    .iter()
    .map(|name| {
      FunctionDeployment::new(&fake.add_function(name), TEST_ACCOUNT, TEST_REGION, "aws").with_code(
        CodeRef::ZipFile {
          path: format!("build/{name}.zip").into(),
        },
      )
    })
    .collect();

  let mut bindings: Vec<TriggerBinding> = deployments.iter().map(|_| schedule()).collect();
  let started = tokio::time::Instant::now();
  let results = futures::future::join_all(
    deployments
      .iter()
      .zip(bindings.iter_mut())
      .map(|(deployment, binding)| orchestrator.bind(deployment, binding)),
  )
  .await;
  let elapsed = started.elapsed();

  assert!(results.iter().all(Result::is_ok));
  assert!(bindings.iter().all(|b| b.state == BindingState::Active));
  assert_eq!(fake.rules().len(), 3);
  assert_eq!(orchestrator.locks().len(), 3);

  // Three 50ms grants run back to back would take at least 150ms.
  assert!(elapsed < Duration::from_millis(100), "took {elapsed:?}");
  let ops = fake.ops();
  let last_grant = ops.iter().rposition(|op| op == "add_permission").unwrap();
  let first_target = ops.iter().position(|op| op == "put_target").unwrap();
  assert!(last_grant < first_target, "grants did not overlap: {ops:?}");
}
