// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::source::FixedSource;
use crate::test_util::{harness, harness_with_preview, urn};
use gw_core::test_support::{GoalBuilder, StateBuilder};
use gw_core::{PendingOperationKind, SourceEvent};

fn register(name: &str, inputs: &[(&str, &str)]) -> SourceEvent {
    let mut builder = GoalBuilder::new("test:mod:Thing", name);
    for (k, v) in inputs {
        builder = builder.input(*k, *v);
    }
    SourceEvent::RegisterResource { goal: builder.build() }
}

#[tokio::test]
async fn empty_source_against_empty_snapshot_succeeds() {
    let h = harness(vec![], |_| {});
    let executor = Executor::new(h.deployment, Arc::new(FixedSource::empty()));
    let outcome = executor.execute(CancellationToken::new()).await.unwrap();
    assert!(outcome.snapshot.is_empty());
    assert!(outcome.plan.is_none());
}

#[tokio::test]
async fn source_error_bails_the_run() {
    let h = harness(vec![], |_| {});
    let source = FixedSource::failing_after(vec![register("a", &[])], "program crashed");
    let executor = Executor::new(h.deployment, Arc::new(source));
    let err = executor.execute(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::Source(_)));
    assert!(h.sink.has_error_mentioning("program crashed"));
}

#[tokio::test]
async fn caller_cancellation_yields_canceled_result() {
    let h = harness(vec![], |_| {});
    let source = FixedSource::empty();
    let executor = Executor::new(h.deployment, Arc::new(source));
    let caller = CancellationToken::new();
    caller.cancel();
    let err = executor.execute(caller).await.unwrap_err();
    assert!(err.is_cancellation());
}

#[tokio::test]
async fn caller_cancellation_signals_providers() {
    let h = harness(vec![], |_| {});
    let fake = h.fake.clone();
    let executor = Executor::new(h.deployment, Arc::new(FixedSource::empty()));
    let caller = CancellationToken::new();
    caller.cancel();
    let _ = executor.execute(caller).await;
    // The watchdog fans out best-effort; give its task a moment.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(fake.cancellation_signals() >= 1);
}

#[tokio::test]
async fn pending_operations_warn_but_do_not_fail() {
    let prior = StateBuilder::custom(urn("a")).id("i-1").input("k", "v").build();
    let mut snapshot = gw_core::Snapshot::new(vec![prior]);
    snapshot.pending_operations.push(gw_core::PendingOperation {
        resource: urn("a"),
        kind: PendingOperationKind::Creating,
    });

    let fake = gw_providers::FakeProvider::new();
    let provider: Arc<dyn gw_providers::Provider> = Arc::new(fake.clone());
    let sink = gw_core::MemorySink::new();
    let deployment = Deployment::new(
        snapshot,
        Arc::new(gw_providers::DefaultRegistry::with_default(provider)),
        Arc::new(sink.clone()),
        crate::options::UpdateOptions::new("dev", "proj"),
        false,
    )
    .unwrap();

    let source = FixedSource::new(vec![register("a", &[("k", "v")])]);
    Executor::new(deployment, Arc::new(source))
        .execute(CancellationToken::new())
        .await
        .unwrap();

    let warnings = sink.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("interrupted"));
}

#[tokio::test]
async fn unknown_literal_target_fails_validation() {
    let h = harness(vec![], |opts| {
        opts.targets = gw_core::TargetPolicy::from_specs([urn("ghost").as_str()]);
    });
    let source = FixedSource::empty();
    let err = Executor::new(h.deployment, Arc::new(source))
        .execute(CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_bail());
    assert!(h.sink.has_error_mentioning("no resource with this URN"));
}

#[tokio::test]
async fn preview_generates_a_plan_without_touching_infrastructure() {
    let h = harness_with_preview(vec![], |opts| opts.generate_plan = true, true);
    let fake = h.fake.clone();
    let source = FixedSource::new(vec![register("a", &[("k", "v")])]);
    let outcome = Executor::new(h.deployment, Arc::new(source))
        .execute(CancellationToken::new())
        .await
        .unwrap();

    let plan = outcome.plan.unwrap_or_else(|| panic!("preview should produce a plan"));
    let resource_plan = &plan.resources[&urn("a")];
    assert_eq!(resource_plan.expected_ops, vec![gw_core::OpKind::Create]);
    // Preview creates assign no physical id.
    let created = fake.calls_for("create");
    assert_eq!(created.len(), 1);
}

#[tokio::test]
async fn update_consumes_its_constraint_plan() {
    // Record a plan in preview, then run the update against it.
    let preview = harness_with_preview(vec![], |opts| opts.generate_plan = true, true);
    let source = FixedSource::new(vec![register("a", &[("k", "v")])]);
    let outcome = Executor::new(preview.deployment, Arc::new(source))
        .execute(CancellationToken::new())
        .await
        .unwrap();
    let plan = outcome.plan.unwrap_or_else(|| panic!("plan missing"));

    let update = harness(vec![], |opts| opts.plan = Some(plan));
    let source = FixedSource::new(vec![register("a", &[("k", "v")])]);
    Executor::new(update.deployment, Arc::new(source))
        .execute(CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn unconsumed_plan_ops_fail_verification() {
    let mut plan = gw_core::Plan::new();
    plan.record(&urn("a"), gw_core::OpKind::Create, &Default::default(), None);

    // The program never registers `a`, so the planned create is missed.
    let h = harness(vec![], |opts| opts.plan = Some(plan));
    let err = Executor::new(h.deployment, Arc::new(FixedSource::empty()))
        .execute(CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Plan(_)));
    assert!(h.sink.has_error_mentioning("did not perform"));
}

#[tokio::test]
async fn vacuous_planned_delete_is_exempt_from_verification() {
    let mut plan = gw_core::Plan::new();
    plan.record(&urn("gone"), gw_core::OpKind::Delete, &Default::default(), None);

    // `gone` is absent from the prior snapshot: the delete was vacuous.
    let h = harness(vec![], |opts| opts.plan = Some(plan));
    Executor::new(h.deployment, Arc::new(FixedSource::empty()))
        .execute(CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn analyzer_violations_fail_an_otherwise_clean_run() {
    struct DenyEverything;
    impl Analyzer for DenyEverything {
        fn analyze(&self, resources: &[Arc<gw_core::ResourceState>]) -> Vec<(Option<Urn>, String)> {
            resources
                .iter()
                .map(|r| (Some(r.urn.clone()), "policy violation: all resources denied".to_string()))
                .collect()
        }
    }

    let h = harness(vec![], |_| {});
    let sink = h.sink.clone();
    let source = FixedSource::new(vec![register("a", &[])]);
    let err = Executor::new(h.deployment, Arc::new(source))
        .with_analyzer(Arc::new(DenyEverything))
        .execute(CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_bail());
    assert!(sink.has_error_mentioning("policy violation"));
}

#[tokio::test]
async fn generator_error_takes_precedence_over_step_errors() {
    // continue-on-error keeps the step failure from cancelling the loop,
    // so both the step error and the later duplicate-URN generation error
    // are guaranteed to be observed; generation must win the precedence.
    let h = harness(vec![], |opts| opts.continue_on_error = true);
    h.fake.fail_op(&urn("a"), "create", "boom");
    let source = FixedSource::new(vec![
        register("a", &[]),
        register("b", &[]),
        register("b", &[]),
    ]);
    let err = Executor::new(h.deployment, Arc::new(source))
        .execute(CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Generation(_)));
}

#[tokio::test]
async fn final_snapshot_carries_untouched_prior_resources_in_targeted_runs() {
    let a = StateBuilder::custom(urn("a")).id("i-a").input("k", "v").build();
    let b = StateBuilder::custom(urn("b")).id("i-b").input("k", "v").build();
    let h = harness(vec![a, b], |opts| {
        opts.targets = gw_core::TargetPolicy::from_specs([urn("a").as_str()]);
    });
    let source = FixedSource::new(vec![register("a", &[("k", "v2")])]);
    let outcome = Executor::new(h.deployment, Arc::new(source))
        .execute(CancellationToken::new())
        .await
        .unwrap();

    let urns: Vec<Urn> = outcome.snapshot.resources.iter().map(|r| r.urn.clone()).collect();
    assert!(urns.contains(&urn("a")));
    // b was neither seen nor deleted: it survives untouched.
    assert!(urns.contains(&urn("b")));
}
