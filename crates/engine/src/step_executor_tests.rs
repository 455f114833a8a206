// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::step::Step;
use crate::test_util::{harness, urn};
use gw_core::test_support::StateBuilder;
use gw_core::PropertyValue;
use std::time::Duration;

fn create_step(name: &str) -> Step {
    Step::Create {
        old: None,
        new: StateBuilder::custom(urn(name)).input("k", "v").build(),
        replacing: false,
        pending_delete: false,
        timeout: None,
    }
}

#[tokio::test]
async fn serial_chain_applies_steps_in_order() {
    let h = harness(vec![], |_| {});
    let executor = StepExecutor::new(h.state(), CancellationToken::new());

    executor.execute_serial(vec![create_step("first"), create_step("second")]);
    executor.signal_completion();
    executor.wait_for_completion().await;

    assert!(!executor.errored());
    let state = h.state();
    let news = state.news.lock();
    let order: Vec<Urn> = news.list().iter().map(|r| r.urn.clone()).collect();
    assert_eq!(order, vec![urn("first"), urn("second")]);
}

#[tokio::test]
async fn parallel_batch_token_waits_for_every_step() {
    let h = harness(vec![], |opts| opts.parallel = 8);
    h.fake.set_op_delay(Duration::from_millis(10));
    let executor = StepExecutor::new(h.state(), CancellationToken::new());

    let batch: Vec<Step> = (0..5).map(|i| create_step(&format!("r{i}"))).collect();
    let token = executor.execute_parallel(batch);
    token.wait().await;

    let state = h.state();
    assert_eq!(state.news.lock().list().len(), 5);
    executor.signal_completion();
    executor.wait_for_completion().await;
}

#[tokio::test]
async fn step_failure_is_sticky_and_cancels_internal_context() {
    let h = harness(vec![], |_| {});
    h.fake.fail_op(&urn("bad"), "create", "simulated create failure");
    let internal = CancellationToken::new();
    let executor = StepExecutor::new(h.state(), internal.clone());

    executor.execute_serial(vec![create_step("bad")]);
    executor.signal_completion();
    executor.wait_for_completion().await;

    assert!(executor.errored());
    assert!(internal.is_cancelled());
    assert!(h.sink.has_error_mentioning("simulated create failure"));
}

#[tokio::test]
async fn chain_aborts_after_its_first_failed_step() {
    let h = harness(vec![], |_| {});
    h.fake.fail_op(&urn("bad"), "create", "boom");
    let executor = StepExecutor::new(h.state(), CancellationToken::new());

    executor.execute_serial(vec![create_step("bad"), create_step("after")]);
    executor.signal_completion();
    executor.wait_for_completion().await;

    let state = h.state();
    assert!(!state.news.lock().contains(&urn("after")));
}

#[tokio::test]
async fn continue_on_error_lets_independent_chains_finish() {
    let h = harness(vec![], |opts| opts.continue_on_error = true);
    h.fake.fail_op(&urn("bad"), "create", "boom");
    let internal = CancellationToken::new();
    let executor = StepExecutor::new(h.state(), internal.clone());

    executor.execute_serial(vec![create_step("bad")]);
    executor.execute_serial(vec![create_step("good")]);
    executor.signal_completion();
    executor.wait_for_completion().await;

    assert!(executor.errored());
    assert!(!internal.is_cancelled());
    let state = h.state();
    assert!(state.news.lock().contains(&urn("good")));
}

#[tokio::test]
async fn register_outputs_updates_recorded_state() {
    let h = harness(vec![], |_| {});
    let executor = StepExecutor::new(h.state(), CancellationToken::new());

    executor.execute_serial(vec![create_step("a")]);
    executor.signal_completion();
    executor.wait_for_completion().await;

    let outputs =
        [("endpoint".to_string(), PropertyValue::string("https://x"))].into_iter().collect();
    executor.execute_register_resource_outputs(&urn("a"), outputs);

    let state = h.state();
    let news = state.news.lock();
    let recorded = news.get_live(&urn("a")).cloned();
    drop(news);
    let recorded = recorded.unwrap_or_else(|| panic!("state for a missing"));
    assert_eq!(recorded.outputs.get("endpoint"), Some(&PropertyValue::string("https://x")));
    assert!(!executor.errored());
}

#[tokio::test]
async fn register_outputs_for_unknown_urn_is_an_error() {
    let h = harness(vec![], |_| {});
    let internal = CancellationToken::new();
    let executor = StepExecutor::new(h.state(), internal.clone());

    executor.execute_register_resource_outputs(&urn("ghost"), Default::default());

    assert!(executor.errored());
    assert!(internal.is_cancelled());
    assert!(h.sink.has_error_mentioning("unknown resource"));
}

#[tokio::test]
async fn partially_created_state_is_still_recorded() {
    let h = harness(vec![], |_| {});
    h.fake.fail_create_init(&urn("flaky"), vec!["health check failed".to_string()]);
    let executor = StepExecutor::new(h.state(), CancellationToken::new());

    executor.execute_serial(vec![create_step("flaky")]);
    executor.signal_completion();
    executor.wait_for_completion().await;

    assert!(executor.errored());
    let state = h.state();
    let news = state.news.lock();
    let recorded = news.get_live(&urn("flaky")).cloned();
    drop(news);
    let recorded = recorded.unwrap_or_else(|| panic!("partial state missing"));
    assert_eq!(recorded.init_errors, vec!["health check failed".to_string()]);
}

#[tokio::test]
async fn queued_chains_are_dropped_after_cancellation() {
    let h = harness(vec![], |opts| opts.parallel = 1);
    let internal = CancellationToken::new();
    let executor = StepExecutor::new(h.state(), internal.clone());

    internal.cancel();
    executor.execute_serial(vec![create_step("never")]);
    executor.signal_completion();
    executor.wait_for_completion().await;

    let state = h.state();
    assert!(state.news.lock().list().is_empty());
}
