// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_util::{harness, urn};
use gw_core::test_support::{GoalBuilder, StateBuilder};
use gw_core::OpKind;

fn ops(chain: &Chain) -> Vec<OpKind> {
    chain.iter().map(|s| s.op()).collect()
}

#[tokio::test]
async fn fresh_goal_generates_a_create() {
    let h = harness(vec![], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").input("k", "v").build())
        .await
        .unwrap();
    assert_eq!(ops(&chain), vec![OpKind::Create]);
    assert!(generator.creates().contains(&urn("a")));
    assert!(!generator.sames().contains(&urn("a")));
}

#[tokio::test]
async fn unchanged_resource_generates_same() {
    let prior = StateBuilder::custom(urn("a")).id("i-1").input("k", "v").output("o", "x").build();
    let h = harness(vec![prior], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").input("k", "v").build())
        .await
        .unwrap();
    assert_eq!(ops(&chain), vec![OpKind::Same]);
    // The same step carries the old id and outputs forward.
    let new = chain[0].new().unwrap_or_else(|| panic!("same step has new state"));
    assert_eq!(new.id, "i-1");
    assert_eq!(new.outputs.get("o"), Some(&gw_core::PropertyValue::string("x")));
    assert!(generator.sames().contains(&urn("a")));
}

#[tokio::test]
async fn changed_inputs_generate_update() {
    let prior = StateBuilder::custom(urn("a")).id("i-1").input("k", "v1").build();
    let h = harness(vec![prior], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").input("k", "v2").build())
        .await
        .unwrap();
    assert_eq!(ops(&chain), vec![OpKind::Update]);
    assert!(generator.updates().contains(&urn("a")));
}

#[tokio::test]
async fn ignore_changes_suppresses_an_update() {
    let prior = StateBuilder::custom(urn("a")).id("i-1").input("k", "v1").build();
    let h = harness(vec![prior], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(
            GoalBuilder::new("test:mod:Thing", "a")
                .input("k", "v2")
                .ignore_changes(["k"])
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(ops(&chain), vec![OpKind::Same]);
}

#[tokio::test]
async fn replace_key_diff_generates_create_before_delete_chain() {
    let prior = StateBuilder::custom(urn("a")).id("i-1").input("p", "v1").build();
    let h = harness(vec![prior], |_| {});
    h.fake.set_diff(
        &urn("a"),
        gw_providers::DiffResult::replace(vec!["p".to_string()], vec!["p".to_string()]),
    );
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").input("p", "v2").build())
        .await
        .unwrap();
    assert_eq!(
        ops(&chain),
        vec![OpKind::CreateReplacement, OpKind::Replace, OpKind::DeleteReplaced]
    );
    assert!(generator.replaces().contains(&urn("a")));
}

#[tokio::test]
async fn delete_before_replace_flag_reorders_the_chain() {
    let prior = StateBuilder::custom(urn("a")).id("i-1").input("p", "v1").build();
    let h = harness(vec![prior], |_| {});
    h.fake.set_diff(
        &urn("a"),
        gw_providers::DiffResult::replace(vec!["p".to_string()], vec!["p".to_string()]),
    );
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(
            GoalBuilder::new("test:mod:Thing", "a")
                .input("p", "v2")
                .delete_before_replace(true)
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(
        ops(&chain),
        vec![OpKind::DeleteReplaced, OpKind::CreateReplacement, OpKind::Replace]
    );
}

#[tokio::test]
async fn replace_on_changes_forces_replacement_without_provider_keys() {
    let prior = StateBuilder::custom(urn("a")).id("i-1").input("p", "v1").build();
    let h = harness(vec![prior], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(
            GoalBuilder::new("test:mod:Thing", "a")
                .input("p", "v2")
                .replace_on_changes(["p"])
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(
        ops(&chain),
        vec![OpKind::CreateReplacement, OpKind::Replace, OpKind::DeleteReplaced]
    );
}

#[tokio::test]
async fn dependent_replacements_are_spliced_into_the_chain() {
    let a = StateBuilder::custom(urn("a")).id("i-a").input("p", "v1").build();
    let b = StateBuilder::custom(urn("b"))
        .id("i-b")
        .input("q", "ref")
        .dependency(urn("a"))
        .property_dependency("q", vec![urn("a")])
        .build();
    let h = harness(vec![a, b], |_| {});
    h.fake.set_diff(
        &urn("a"),
        gw_providers::DiffResult::replace(vec!["p".to_string()], vec!["p".to_string()]),
    );
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").input("p", "v2").build())
        .await
        .unwrap();

    // B's replacement rides A's chain: creates first, deletes in reverse
    // topological order (dependent B's old before A's old).
    let described: Vec<(OpKind, Urn)> = chain.iter().map(|s| (s.op(), s.urn().clone())).collect();
    assert_eq!(
        described,
        vec![
            (OpKind::CreateReplacement, urn("a")),
            (OpKind::Replace, urn("a")),
            (OpKind::CreateReplacement, urn("b")),
            (OpKind::Replace, urn("b")),
            (OpKind::DeleteReplaced, urn("b")),
            (OpKind::DeleteReplaced, urn("a")),
        ]
    );
    assert_eq!(
        generator.dependent_replace_keys().get(&urn("b")),
        Some(&vec!["q".to_string()])
    );

    // B's own register event is satisfied by the splice.
    let followup = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "b").input("q", "ref").build())
        .await
        .unwrap();
    assert!(followup.is_empty());
    assert!(generator.has_seen(&urn("b")));
}

#[tokio::test]
async fn duplicate_urn_is_fatal_and_sticky() {
    let h = harness(vec![], |_| {});
    let mut generator = StepGenerator::new(h.state());
    generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").build())
        .await
        .unwrap();
    let err = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").build())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerateError::DuplicateUrn(_)));
    assert!(generator.errored());
    assert!(h.sink.has_error_mentioning("duplicate resource"));
}

#[tokio::test]
async fn replacing_a_protected_resource_is_fatal() {
    let prior = StateBuilder::custom(urn("a")).id("i-1").input("p", "v1").protect().build();
    let h = harness(vec![prior], |_| {});
    h.fake.set_diff(
        &urn("a"),
        gw_providers::DiffResult::replace(vec!["p".to_string()], vec!["p".to_string()]),
    );
    let mut generator = StepGenerator::new(h.state());
    let err = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").input("p", "v2").build())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerateError::Protected(_)));
    assert!(generator.errored());
}

#[tokio::test]
async fn alias_resolves_prior_state_under_old_urn() {
    let prior = StateBuilder::custom(urn("old-name")).id("i-1").input("k", "v").build();
    let h = harness(vec![prior], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(
            GoalBuilder::new("test:mod:Thing", "new-name")
                .input("k", "v")
                .alias(gw_core::Alias::Urn(urn("old-name")))
                .build(),
        )
        .await
        .unwrap();
    // The alias match makes this a same, not a create.
    assert_eq!(ops(&chain), vec![OpKind::Same]);
    assert_eq!(chain[0].old().map(|o| o.urn.clone()), Some(urn("old-name")));
}

#[tokio::test]
async fn untargeted_create_is_skipped_and_poisonous_downstream() {
    let h = harness(vec![], |opts| {
        opts.targets = gw_core::TargetPolicy::from_specs([urn("wanted").as_str()]);
    });
    let mut generator = StepGenerator::new(h.state());

    let chain = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "unwanted").build())
        .await
        .unwrap();
    assert!(matches!(chain[0], Step::Same { skipped_create: true, .. }));
    assert!(generator.skipped_creates().contains(&urn("unwanted")));

    // A targeted resource depending on the skipped create must fail.
    let err = generator
        .generate_steps(
            GoalBuilder::new("test:mod:Thing", "wanted").dependency(urn("unwanted")).build(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GenerateError::SkippedDependency { .. }));
}

#[tokio::test]
async fn untargeted_existing_resource_stays_as_is() {
    let prior = StateBuilder::custom(urn("other")).id("i-1").input("k", "v1").build();
    let h = harness(vec![prior.clone()], |opts| {
        opts.targets = gw_core::TargetPolicy::from_specs([urn("wanted").as_str()]);
    });
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "other").input("k", "v2").build())
        .await
        .unwrap();
    // Out of target: no update happens, the old state is carried through.
    assert_eq!(ops(&chain), vec![OpKind::Same]);
    assert!(std::sync::Arc::ptr_eq(chain[0].new().unwrap_or(&prior), &prior));
}

#[tokio::test]
async fn generate_deletes_covers_unseen_prior_resources() {
    let a = StateBuilder::custom(urn("a")).id("i-a").build();
    let b = StateBuilder::custom(urn("b")).id("i-b").dependency(urn("a")).build();
    let h = harness(vec![a, b], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let deletes = generator.generate_deletes().unwrap();
    let urns: Vec<Urn> = deletes.iter().map(|s| s.urn().clone()).collect();
    // Reverse topological: dependent b first.
    assert_eq!(urns, vec![urn("b"), urn("a")]);
    assert!(generator.deletes().contains(&urn("a")));
}

#[tokio::test]
async fn seen_resources_are_not_delete_candidates() {
    let a = StateBuilder::custom(urn("a")).id("i-a").input("k", "v").build();
    let h = harness(vec![a], |_| {});
    let mut generator = StepGenerator::new(h.state());
    generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").input("k", "v").build())
        .await
        .unwrap();
    assert!(generator.generate_deletes().unwrap().is_empty());
}

#[tokio::test]
async fn protected_prior_resource_blocks_the_delete_phase() {
    let a = StateBuilder::custom(urn("a")).id("i-a").protect().build();
    let h = harness(vec![a], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let err = generator.generate_deletes().unwrap_err();
    assert!(matches!(err, GenerateError::Protected(_)));
}

#[tokio::test]
async fn targeted_destroy_without_dependents_flag_errors_and_cites_blocker() {
    let a = StateBuilder::custom(urn("a")).id("i-a").build();
    let b = StateBuilder::custom(urn("b")).id("i-b").dependency(urn("a")).build();
    let h = harness(vec![a, b], |opts| {
        opts.destroy_targets = gw_core::TargetPolicy::from_specs([urn("a").as_str()]);
        opts.target_dependents = false;
    });
    let mut generator = StepGenerator::new(h.state());
    let err = generator.generate_deletes().unwrap_err();
    match err {
        GenerateError::UntargetedDependent { dependent, target } => {
            assert_eq!(dependent, urn("b"));
            assert_eq!(target, urn("a"));
        }
        other => panic!("expected untargeted dependent error, got {other:?}"),
    }
}

#[tokio::test]
async fn targeted_destroy_with_dependents_includes_the_closure() {
    let a = StateBuilder::custom(urn("a")).id("i-a").build();
    let b = StateBuilder::custom(urn("b")).id("i-b").dependency(urn("a")).build();
    let h = harness(vec![a, b], |opts| {
        opts.destroy_targets = gw_core::TargetPolicy::from_specs([urn("a").as_str()]);
        opts.target_dependents = true;
    });
    let mut generator = StepGenerator::new(h.state());
    let deletes = generator.generate_deletes().unwrap();
    let urns: Vec<Urn> = deletes.iter().map(|s| s.urn().clone()).collect();
    assert_eq!(urns, vec![urn("b"), urn("a")]);
}

#[tokio::test]
async fn missing_destroy_target_is_fatal() {
    let h = harness(vec![], |opts| {
        opts.destroy_targets = gw_core::TargetPolicy::from_specs([urn("ghost").as_str()]);
    });
    let mut generator = StepGenerator::new(h.state());
    let err = generator.generate_deletes().unwrap_err();
    assert!(matches!(err, GenerateError::MissingDeleteTarget(_)));
}

#[tokio::test]
async fn schedule_deletes_groups_independent_deletes() {
    // chain: c -> b -> a, d independent
    let a = StateBuilder::custom(urn("a")).id("i").build();
    let b = StateBuilder::custom(urn("b")).id("i").dependency(urn("a")).build();
    let c = StateBuilder::custom(urn("c")).id("i").dependency(urn("b")).build();
    let d = StateBuilder::custom(urn("d")).id("i").build();
    let h = harness(vec![a, b, c, d], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let deletes = generator.generate_deletes().unwrap();
    let antichains = generator.schedule_deletes(deletes);

    let layers: Vec<Vec<Urn>> = antichains
        .iter()
        .map(|layer| layer.iter().map(|s| s.urn().clone()).collect())
        .collect();
    // d may run with c; b waits for c; a waits for b.
    assert_eq!(layers.len(), 3);
    assert!(layers[0].contains(&urn("c")));
    assert!(layers[0].contains(&urn("d")));
    assert_eq!(layers[1], vec![urn("b")]);
    assert_eq!(layers[2], vec![urn("a")]);
}

#[tokio::test]
async fn pending_replacement_entry_is_cleared_when_resource_returns_unreplaced() {
    let pending = StateBuilder::custom(urn("a")).id("i-old").pending_replacement().build();
    let live = StateBuilder::custom(urn("a")).id("i-new").input("k", "v").build();
    let h = harness(vec![pending, live], |_| {});
    let mut generator = StepGenerator::new(h.state());
    generator
        .generate_steps(GoalBuilder::new("test:mod:Thing", "a").input("k", "v").build())
        .await
        .unwrap();
    let deletes = generator.generate_deletes().unwrap();
    assert_eq!(deletes.len(), 1);
    assert!(matches!(deletes[0], Step::RemovePendingReplace { .. }));
}

#[tokio::test]
async fn component_goal_never_touches_the_provider() {
    let h = harness(vec![], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let chain = generator
        .generate_steps(GoalBuilder::component("test:mod:Component", "group").build())
        .await
        .unwrap();
    assert_eq!(ops(&chain), vec![OpKind::Create]);
    assert!(h.fake.calls().is_empty());
}

#[tokio::test]
async fn parent_defaults_are_inherited_by_children() {
    let h = harness(vec![], |_| {});
    let mut generator = StepGenerator::new(h.state());
    let parent_urn = Urn::from_parts("dev", "proj", "test:mod:Component", "parent");
    generator
        .generate_steps(
            GoalBuilder::component("test:mod:Component", "parent").protect(true).build(),
        )
        .await
        .unwrap();
    let chain = generator
        .generate_steps(
            GoalBuilder::new("test:mod:Thing", "child").parent(parent_urn).build(),
        )
        .await
        .unwrap();
    let new = chain[0].new().unwrap_or_else(|| panic!("create has new state"));
    assert!(new.protect);
}
