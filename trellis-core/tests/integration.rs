//! Integration Tests for the Reactive Graph
//!
//! These tests drive the public surface the way a consumer would: nodes,
//! subscriptions, dependency links, key-path projections, and teardown
//! working together.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use trellis_core::{Error, Node, NodeKind, NodeState};

/// Test the full lifecycle of a single node: lazy reads, activation,
/// caching, invalidation, and pruning.
#[test]
fn single_node_lifecycle() {
    let compute_count = Arc::new(AtomicI32::new(0));
    let compute_clone = compute_count.clone();
    let node = Node::from_fn(
        move || {
            compute_clone.fetch_add(1, Ordering::SeqCst);
            1
        },
        "lonely",
    );

    // Unobserved: every read computes, nothing activates.
    assert_eq!(node.value(), 1);
    assert_eq!(node.value(), 1);
    assert_eq!(compute_count.load(Ordering::SeqCst), 2);
    assert_eq!(node.state(), NodeState::Inactive);

    // First observer activates the node.
    let notify_count = Arc::new(AtomicI32::new(0));
    let notify_clone = notify_count.clone();
    let sub = node.subscribe(move |_| {
        notify_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(node.state(), NodeState::Dirty);

    // Active: one compute serves many reads.
    assert_eq!(node.value(), 1);
    assert_eq!(node.value(), 1);
    assert_eq!(compute_count.load(Ordering::SeqCst), 3);
    assert_eq!(node.state(), NodeState::Clean);

    // Notification dirties and fans out exactly once.
    node.notify();
    assert_eq!(node.state(), NodeState::Dirty);
    assert_eq!(notify_count.load(Ordering::SeqCst), 1);

    // Unsubscribe with prune: nobody is left, so the node goes away.
    sub.unsubscribe_and_prune();
    assert_eq!(node.state(), NodeState::Destroyed);
}

/// Test that an upstream notification dirties a dependent without a
/// double fan-out.
#[test]
fn dependency_forwards_invalidation_once() {
    let upstream = Node::source(1, "upstream");

    let upstream_clone = upstream.clone();
    let downstream = Node::from_fn(move || upstream_clone.value() * 10, "downstream");
    downstream.add_dependency(&upstream);

    let notify_count = Arc::new(AtomicI32::new(0));
    let notify_clone = notify_count.clone();
    let sub = downstream.subscribe(move |_| {
        notify_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(downstream.value(), 10);

    upstream.set_value(2).unwrap();
    assert_eq!(downstream.state(), NodeState::Dirty);
    assert_eq!(notify_count.load(Ordering::SeqCst), 1);

    // Upstream is already dirty; nothing new to announce downstream.
    upstream.notify();
    assert_eq!(notify_count.load(Ordering::SeqCst), 1);

    assert_eq!(downstream.value(), 20);
    sub.unsubscribe();
}

/// Test that a diamond-shaped graph collapses the double notification into
/// a single fan-out and a single recomputation.
#[test]
fn diamond_fan_in_collapses() {
    let base = Node::source(1, "base");

    let base_left = base.clone();
    let left = Node::from_fn(move || base_left.value() + 1, "left");
    left.add_dependency(&base);

    let base_right = base.clone();
    let right = Node::from_fn(move || base_right.value() + 2, "right");
    right.add_dependency(&base);

    let top_count = Arc::new(AtomicI32::new(0));
    let top_clone = top_count.clone();
    let left_clone = left.clone();
    let right_clone = right.clone();
    let top = Node::from_fn(
        move || {
            top_clone.fetch_add(1, Ordering::SeqCst);
            left_clone.value() + right_clone.value()
        },
        "top",
    );
    top.add_dependency(&left);
    top.add_dependency(&right);

    let notify_count = Arc::new(AtomicI32::new(0));
    let notify_clone = notify_count.clone();
    let sub = top.subscribe(move |_| {
        notify_clone.fetch_add(1, Ordering::SeqCst);
    });

    // Subscribing the top activated the whole diamond.
    assert!(base.is_active());
    assert!(left.is_active());
    assert!(right.is_active());

    assert_eq!(top.value(), 5);
    assert_eq!(top_count.load(Ordering::SeqCst), 1);

    // One write reaches the top through both arms; the second arrival finds
    // the top already dirty and stops.
    base.set_value(10).unwrap();
    assert_eq!(notify_count.load(Ordering::SeqCst), 1);

    assert_eq!(top.value(), 23);
    assert_eq!(top_count.load(Ordering::SeqCst), 2);

    sub.unsubscribe();
}

/// Test key-path projections end to end: shared identity, chain
/// activation, write-through, and detachment.
#[test]
fn key_path_projections_share_and_update() {
    let store = Node::keyed_source(json!({ "user": { "name": "dale" } }), "store");

    let name = store.get("user.name");
    assert!(name.same(&store.get("user").get("name")));
    assert_eq!(name.value(), json!("dale"));

    let notify_count = Arc::new(AtomicI32::new(0));
    let notify_clone = notify_count.clone();
    let sub = name.subscribe(move |_| {
        notify_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert!(store.is_active());

    // Writing the leaf rebuilds the stored value and invalidates the chain.
    name.value();
    name.set_value(json!("audrey")).unwrap();
    assert_eq!(notify_count.load(Ordering::SeqCst), 1);
    assert_eq!(name.value(), json!("audrey"));
    assert_eq!(store.value(), json!({ "user": { "name": "audrey" } }));

    // Replacing the whole store value reaches the leaf the same way.
    name.value();
    store.set_value(json!({ "user": { "name": "laura" } })).unwrap();
    assert_eq!(notify_count.load(Ordering::SeqCst), 2);
    assert_eq!(name.value(), json!("laura"));

    sub.unsubscribe();
    assert_eq!(store.state(), NodeState::Inactive);
}

/// Test that destroying a root tears down every projection derived from it.
#[test]
fn destroy_cascades_through_projections() {
    let store = Node::keyed_source(json!({ "a": { "b": 1 } }), "store");
    let a = store.get("a");
    let b = store.get("a.b");

    assert!(store.destroy(false));
    assert_eq!(a.state(), NodeState::Destroyed);
    assert_eq!(b.state(), NodeState::Destroyed);

    // Destruction is terminal and idempotent.
    assert!(!store.destroy(false));
    assert_eq!(store.state(), NodeState::Destroyed);
}

/// A custom kind: doubles its source and accepts halved writes.
struct Doubled {
    source: Node<i32>,
}

impl NodeKind<i32> for Doubled {
    fn compute(&self) -> i32 {
        self.source.value() * 2
    }

    fn set_value(&self, _node: &Node<i32>, value: i32) -> Result<(), Error> {
        self.source.set_value(value / 2)
    }
}

/// Test that a hand-written kind participates like the stock ones.
#[test]
fn custom_kinds_plug_into_the_graph() {
    let base = Node::source(3, "base");
    let doubled = Node::new(
        Doubled {
            source: base.clone(),
        },
        "doubled",
    );
    doubled.add_dependency(&base);

    assert_eq!(doubled.value(), 6);

    let notify_count = Arc::new(AtomicI32::new(0));
    let notify_clone = notify_count.clone();
    let sub = doubled.subscribe(move |_| {
        notify_clone.fetch_add(1, Ordering::SeqCst);
    });

    doubled.value();
    doubled.set_value(10).unwrap();
    assert_eq!(base.value(), 5);
    assert_eq!(doubled.value(), 10);
    assert_eq!(notify_count.load(Ordering::SeqCst), 1);

    sub.unsubscribe();
}

/// Test that pruning an abandoned projection chain frees it, root and all,
/// while an observed root stays.
#[test]
fn pruning_frees_abandoned_chains() {
    let store = Node::keyed_source(json!({ "user": { "name": "dale" } }), "store");
    let keep = store.subscribe(|_| {});

    let name = store.get("user.name");
    let sub = name.subscribe(|_| {});
    sub.unsubscribe_and_prune();

    // The projection chain is gone, the observed store is not.
    assert_eq!(name.state(), NodeState::Destroyed);
    assert_ne!(store.state(), NodeState::Destroyed);

    // A fresh lookup rebuilds the path from scratch.
    let rebuilt = store.get("user.name");
    assert!(!rebuilt.same(&name));
    assert_eq!(rebuilt.value(), json!("dale"));

    keep.unsubscribe();
}

/// Test that values pushed into a destroyed projection are swallowed, as
/// happens when a binding writes during teardown.
#[test]
fn writes_after_destroy_are_swallowed() {
    let store = Node::keyed_source(json!({ "user": "dale" }), "store");
    let user = store.get("user");

    user.destroy(false);
    assert!(user.set_value(json!("audrey")).is_ok());
    assert_eq!(store.value(), json!({ "user": "dale" }));
    assert_eq!(store.get("user").value(), Value::String("dale".to_owned()));
}
