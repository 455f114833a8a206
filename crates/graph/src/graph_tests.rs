// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gw_core::test_support::StateBuilder;

fn urn(name: &str) -> Urn {
    Urn::from_parts("dev", "proj", "test:mod:Thing", name)
}

/// base <- mid <- top, with `side` standing alone.
fn diamond_free_graph() -> DependencyGraph {
    let base = StateBuilder::custom(urn("base")).build();
    let mid = StateBuilder::custom(urn("mid")).dependency(urn("base")).build();
    let top = StateBuilder::custom(urn("top")).dependency(urn("mid")).build();
    let side = StateBuilder::custom(urn("side")).build();
    DependencyGraph::new(vec![base, mid, top, side])
}

#[test]
fn depending_on_walks_transitively_in_topological_order() {
    let graph = diamond_free_graph();
    let dependents: Vec<Urn> =
        graph.depending_on(&urn("base"), false).iter().map(|r| r.urn.clone()).collect();
    assert_eq!(dependents, vec![urn("mid"), urn("top")]);
}

#[test]
fn depending_on_leaf_is_empty() {
    let graph = diamond_free_graph();
    assert!(graph.depending_on(&urn("top"), false).is_empty());
    assert!(graph.depending_on(&urn("side"), false).is_empty());
}

#[test]
fn dependencies_of_reports_only_direct_edges() {
    let graph = diamond_free_graph();
    let deps = graph.dependencies_of(&urn("top"));
    assert!(deps.contains(&urn("mid")));
    assert!(!deps.contains(&urn("base")));
    assert!(graph.dependencies_of(&urn("base")).is_empty());
}

#[test]
fn transitive_dependencies_cover_the_full_closure() {
    let graph = diamond_free_graph();
    let deps = graph.transitive_dependencies_of(&urn("top"));
    assert!(deps.contains(&urn("mid")));
    assert!(deps.contains(&urn("base")));
    assert!(!deps.contains(&urn("top")));
    assert!(!deps.contains(&urn("side")));
}

#[test]
fn depends_on_is_directional() {
    let graph = diamond_free_graph();
    assert!(graph.depends_on(&urn("top"), &urn("base")));
    assert!(!graph.depends_on(&urn("base"), &urn("top")));
    assert!(!graph.depends_on(&urn("side"), &urn("base")));
}

#[test]
fn property_dependencies_and_deleted_with_create_edges() {
    let holder = StateBuilder::custom(urn("holder")).build();
    let tenant = StateBuilder::custom(urn("tenant"))
        .property_dependency("addr", vec![urn("holder")])
        .build();
    let shadow = StateBuilder::custom(urn("shadow")).deleted_with(urn("holder")).build();
    let graph = DependencyGraph::new(vec![holder, tenant, shadow]);

    let dependents: Vec<Urn> =
        graph.depending_on(&urn("holder"), false).iter().map(|r| r.urn.clone()).collect();
    assert_eq!(dependents, vec![urn("tenant"), urn("shadow")]);
}

#[test]
fn parent_edges_are_gated_by_include_children() {
    let parent = StateBuilder::component(urn("parent")).build();
    let child = StateBuilder::custom(urn("child")).parent(urn("parent")).build();
    let graph = DependencyGraph::new(vec![parent, child]);

    assert!(graph.depending_on(&urn("parent"), false).is_empty());
    let with_children: Vec<Urn> =
        graph.depending_on(&urn("parent"), true).iter().map(|r| r.urn.clone()).collect();
    assert_eq!(with_children, vec![urn("child")]);
}

#[test]
fn provider_edge_links_resources_to_their_provider() {
    let prov_urn = Urn::from_parts("dev", "proj", "gw:providers:test", "default");
    let provider = StateBuilder::new(prov_urn.clone(), "gw:providers:test", true).id("p1").build();
    let managed = StateBuilder::custom(urn("managed"))
        .provider(gw_core::ProviderRef::new(prov_urn.clone(), gw_core::ResourceId::new("p1")))
        .build();
    let graph = DependencyGraph::new(vec![provider, managed]);
    let dependents: Vec<Urn> =
        graph.depending_on(&prov_urn, false).iter().map(|r| r.urn.clone()).collect();
    assert_eq!(dependents, vec![urn("managed")]);
}

#[test]
fn duplicate_urns_edge_to_every_occurrence() {
    let old_pending = StateBuilder::custom(urn("dup")).pending_replacement().build();
    let live = StateBuilder::custom(urn("dup")).build();
    let user = StateBuilder::custom(urn("user")).dependency(urn("dup")).build();
    let graph = DependencyGraph::new(vec![old_pending, live, user]);
    let dependents = graph.depending_on(&urn("dup"), false);
    assert_eq!(dependents.len(), 1);
    assert_eq!(dependents[0].urn, urn("user"));
}
