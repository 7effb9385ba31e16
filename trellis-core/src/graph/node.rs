//! The reactive node: cache, lifecycle state machine, observer fan-out,
//! dependency activation, key-path children, and the destroy cascade.
//!
//! # How Nodes Work
//!
//! A [`Node`] wraps a compute function and decides, per read, whether to run
//! it. Invalidation is push: an upstream change or an explicit
//! [`notify`](Node::notify) marks the node dirty and fans out to observers.
//! Recomputation is pull: nothing is recomputed until the next
//! [`value`](Node::value) call. A node that is notified ten times between
//! two reads computes once, and a diamond-shaped graph collapses the double
//! notification into a single recomputation.
//!
//! Activation is driven entirely by the observer list. While nobody
//! observes a node it stays inactive: reads call straight through to the
//! compute function and no upstream subscriptions exist. The first observer
//! activates it (subscribing every registered [`Link`]); removing the last
//! observer deactivates it again and drops the cache.
//!
//! # Thread Safety
//!
//! All internal state sits behind `parking_lot` locks, so sharing nodes
//! across threads is memory-safe. The propagation model itself is the
//! single-threaded one: notification runs synchronously on the caller's
//! stack and callbacks may re-enter the graph freely, because no lock is
//! held while user code (observer callbacks, kind hooks, compute) runs.
//! Two threads mutating one region of the graph in parallel get no ordering
//! guarantees beyond what the locks provide.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::Error;
use crate::path;

use super::link::{Link, LinkHandle};
use super::observer::{Observer, ObserverCallback, ObserverId, ObserverList};
use super::state::NodeState;

/// Generate a unique node id.
///
/// Uses an atomic counter to ensure uniqueness across threads.
fn next_node_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Behavior slot for a node: how it computes, and optionally how it accepts
/// writes and reacts to activation edges.
///
/// `compute` is the one required operation; everything else defaults to the
/// base behavior (writes rejected, activation hooks no-ops).
pub trait NodeKind<T>: Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
{
    /// Produce the node's current value. Must be idempotent between
    /// invalidations; the node decides when calls happen.
    fn compute(&self) -> T;

    /// Accept a value pushed into this node. Kinds that have somewhere to
    /// put it (sources, key projections) override this.
    fn set_value(&self, node: &Node<T>, _value: T) -> Result<(), Error> {
        Err(Error::SetUnsupported {
            label: node.label().to_owned(),
        })
    }

    /// Called after the node activates, once its links are subscribed.
    /// Kinds that watch something outside the graph start that watch here.
    fn became_active(&self, _node: &Node<T>) {}

    /// Called after the node deactivates or is destroyed while active.
    fn became_inactive(&self, _node: &Node<T>) {}
}

/// Builds child nodes for key-path derivation.
///
/// [`Node::get`] consults this when a key is accessed for the first time.
/// The factory decides what a child means for its value type and is expected
/// to equip the child for further derivation (typically by installing itself
/// on the child as well).
pub trait ChildFactory<T>: Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
{
    fn make_child(&self, parent: &Node<T>, key: &str) -> Node<T>;
}

/// Adapts a plain closure into a compute-only kind.
struct FnKind<F>(F);

impl<T, F> NodeKind<T> for FnKind<F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    fn compute(&self) -> T {
        (self.0)()
    }
}

type TeardownFn = Box<dyn FnOnce(bool) + Send>;

struct Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this node.
    id: u64,

    /// Diagnostic label, mandatory at construction.
    label: String,

    /// The behavior object: compute, optional set_value, activation hooks.
    kind: Box<dyn NodeKind<T>>,

    /// Builds `get` children; absent for nodes without key-path derivation.
    factory: Option<Arc<dyn ChildFactory<T>>>,

    /// Lifecycle state; see [`NodeState`] for the transition diagram.
    state: RwLock<NodeState>,

    /// Last computed value. Meaningful only while the state is `Clean`.
    cache: RwLock<Option<T>>,

    /// Who to tell when this node changes, in subscription order.
    observers: Mutex<ObserverList<T>>,

    /// Upstream subscriptions, toggled in bulk at the activation boundary.
    links: Mutex<SmallVec<[Arc<Link<T>>; 2]>>,

    /// Memoized children by key. Lazily created; once a key is present it
    /// is never replaced, so repeated lookups observe the identical child.
    children: Mutex<Option<IndexMap<String, Node<T>>>>,

    /// Cleanup actions to run on destroy, in registration order.
    teardowns: Mutex<SmallVec<[TeardownFn; 2]>>,
}

/// A lazily evaluated, observable value in the dependency graph.
///
/// Cloning a `Node` is cheap and shares the underlying state: every clone
/// sees the same cache, observers, and children. Identity comparisons
/// (memoized children, test assertions) go through [`Node::same`].
///
/// ```rust,ignore
/// let width = Node::from_fn(|| 42, "width");
/// assert_eq!(width.value(), 42);
/// ```
pub struct Node<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<T>>,
}

/// Non-owning reference to a node, for callbacks that must not keep their
/// target alive. See [`Node::downgrade`].
pub struct WeakNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Weak<Inner<T>>,
}

impl<T> Clone for Node<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Cloning shares the same underlying node.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Clone for WeakNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn upgrade(&self) -> Option<Node<T>> {
        self.inner.upgrade().map(|inner| Node { inner })
    }
}

impl<T> fmt::Debug for Node<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .finish()
    }
}

/// An observer registration on one node.
///
/// Removing the registration consumes the handle, so a subscription cannot
/// be cancelled twice. Dropping the handle without calling
/// [`unsubscribe`](Subscription::unsubscribe) leaves the observer in place
/// for the node's lifetime.
#[must_use = "dropping a Subscription does not unsubscribe; call unsubscribe() when done"]
pub struct Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    node: Node<T>,
    id: ObserverId,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Identity this registration was made under; feeds
    /// [`Node::notify_except`] and [`Node::unsubscribe`].
    pub fn observer_id(&self) -> ObserverId {
        self.id
    }

    /// The node this subscription observes.
    pub fn node(&self) -> &Node<T> {
        &self.node
    }

    /// Remove this registration. Deactivates the node if it was the last.
    pub fn unsubscribe(self) {
        self.node.remove_first_observer(self.id);
    }

    /// Remove this registration and, if the node now has no observers at
    /// all, destroy it. This is how short-lived consumers free derived
    /// nodes nobody else references.
    pub fn unsubscribe_and_prune(self) {
        let node = self.node.clone();
        self.unsubscribe();
        node.prune();
    }
}

impl<T> Node<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Build a node from a kind, without key-path derivation.
    pub fn new(kind: impl NodeKind<T>, label: impl Into<String>) -> Self {
        Self::build(Box::new(kind), None, label.into())
    }

    /// Build a node from a kind plus a factory for `get`-derived children.
    pub fn with_factory(
        kind: impl NodeKind<T>,
        factory: Arc<dyn ChildFactory<T>>,
        label: impl Into<String>,
    ) -> Self {
        Self::build(Box::new(kind), Some(factory), label.into())
    }

    /// Build a compute-only node from a closure.
    pub fn from_fn(
        compute: impl Fn() -> T + Send + Sync + 'static,
        label: impl Into<String>,
    ) -> Self {
        Self::new(FnKind(compute), label)
    }

    fn build(
        kind: Box<dyn NodeKind<T>>,
        factory: Option<Arc<dyn ChildFactory<T>>>,
        label: String,
    ) -> Self {
        debug_assert!(!label.is_empty(), "node requires a non-empty label");
        Self {
            inner: Arc::new(Inner {
                id: next_node_id(),
                label,
                kind,
                factory,
                state: RwLock::new(NodeState::Inactive),
                cache: RwLock::new(None),
                observers: Mutex::new(ObserverList::new()),
                links: Mutex::new(SmallVec::new()),
                children: Mutex::new(None),
                teardowns: Mutex::new(SmallVec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Diagnostic label supplied at construction.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn state(&self) -> NodeState {
        *self.inner.state.read()
    }

    /// Whether the node currently holds upstream subscriptions and may cache.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    /// Identity comparison: do both handles refer to the same node?
    pub fn same(&self, other: &Node<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakNode<T> {
        WeakNode {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ------------------------------------------------------------------------
    // Value
    // ------------------------------------------------------------------------

    /// Current value of the node, computing it if necessary.
    ///
    /// Inactive nodes compute on every call; there is nobody to invalidate
    /// a cache for, so none is kept. Active nodes return the cache while
    /// clean and recompute exactly once after an invalidation.
    pub fn value(&self) -> T {
        let state = *self.inner.state.read();
        match state {
            NodeState::Inactive => self.inner.kind.compute(),
            NodeState::Clean => self
                .inner
                .cache
                .read()
                .clone()
                .expect("clean node with empty cache"),
            NodeState::Dirty => {
                let value = self.inner.kind.compute();
                trace!(id = self.inner.id, "{} recomputed", self.inner.label);
                let mut state = self.inner.state.write();
                // Compute may have re-entered the graph; only commit the
                // cache if the node is still the dirty node we started with.
                if *state == NodeState::Dirty {
                    *self.inner.cache.write() = Some(value.clone());
                    *state = NodeState::Clean;
                }
                value
            }
            NodeState::Destroyed => {
                debug_assert!(false, "value() called on destroyed node {}", self.inner.label);
                self.inner.kind.compute()
            }
        }
    }

    /// Push a value into the node, if its kind accepts writes.
    ///
    /// Destroyed nodes swallow writes: in a teardown cascade a setter may
    /// legitimately fire after its target is gone.
    pub fn set_value(&self, value: T) -> Result<(), Error> {
        if self.state().is_destroyed() {
            return Ok(());
        }
        self.inner.kind.set_value(self, value)
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    /// Register an observer under a fresh identity.
    ///
    /// The first observer activates the node. The callback receives the
    /// notifying node and runs synchronously, on the notifier's stack, with
    /// no internal lock held.
    pub fn subscribe(
        &self,
        callback: impl Fn(&Node<T>) + Send + Sync + 'static,
    ) -> Subscription<T> {
        self.subscribe_with(ObserverId::new(), Arc::new(callback))
    }

    /// Register an observer under a caller-chosen identity.
    ///
    /// Several registrations may share one id; [`Node::unsubscribe`]
    /// removes them together and [`Node::notify_except`] skips them as one
    /// party.
    pub fn subscribe_with(
        &self,
        id: ObserverId,
        callback: ObserverCallback<T>,
    ) -> Subscription<T> {
        let first = {
            let mut observers = self.inner.observers.lock();
            let was_empty = observers.is_empty();
            observers.push(Observer::new(id, callback));
            was_empty
        };
        if first {
            self.maybe_activate();
        }
        Subscription {
            node: self.clone(),
            id,
        }
    }

    /// Remove every observer registered under `id`.
    ///
    /// Deactivation follows through the normal removal path if the list
    /// empties. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: ObserverId) {
        let removed = self.inner.observers.lock().remove_all(id);
        if removed > 0 {
            self.maybe_deactivate();
        }
    }

    fn remove_first_observer(&self, id: ObserverId) {
        let removed = self.inner.observers.lock().remove_first(id);
        if removed {
            self.maybe_deactivate();
        }
    }

    /// Mark the node stale and tell every observer.
    pub fn notify(&self) {
        self.notify_except(None);
    }

    /// Mark the node stale and tell every observer except `skip`.
    ///
    /// Only a clean node has anything to announce: an inactive node has no
    /// observers worth telling, and a dirty node already fanned out for the
    /// current staleness. Fan-out runs over a snapshot of the observer list
    /// in subscription order, so callbacks may subscribe and unsubscribe
    /// freely; observers added mid-fan-out wait for the next one.
    ///
    /// The skip identity is how a node avoids hearing its own echo when it
    /// pushes a value into a peer it also observes.
    pub fn notify_except(&self, skip: Option<ObserverId>) {
        {
            let mut state = self.inner.state.write();
            if *state != NodeState::Clean {
                return;
            }
            *state = NodeState::Dirty;
        }
        trace!(id = self.inner.id, "{} invalidated", self.inner.label);
        let snapshot = self.inner.observers.lock().snapshot();
        for (id, callback) in snapshot {
            if Some(id) == skip {
                continue;
            }
            callback(self);
        }
    }

    // ------------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------------

    /// Register a dependency on `upstream` with the default reaction:
    /// notify this node whenever the upstream notifies.
    ///
    /// The link is recorded immediately but only subscribed while this node
    /// is active; activation and deactivation toggle it in bulk with every
    /// other link. The default callback captures this node weakly and the
    /// link holds its upstream weakly, so an idle link keeps nothing alive
    /// in either direction.
    pub fn add_dependency(&self, upstream: &Node<T>) -> LinkHandle<T> {
        let weak = self.downgrade();
        self.add_dependency_with(
            upstream,
            Arc::new(move |_: &Node<T>| {
                if let Some(node) = weak.upgrade() {
                    node.notify();
                }
            }),
        )
    }

    /// Register a dependency on `upstream` with a custom reaction.
    ///
    /// The callback must capture this node weakly if it references it at
    /// all; a strong capture creates a reference cycle through the link.
    pub fn add_dependency_with(
        &self,
        upstream: &Node<T>,
        callback: ObserverCallback<T>,
    ) -> LinkHandle<T> {
        let link = Arc::new(Link::new(upstream, callback));
        self.inner.links.lock().push(Arc::clone(&link));
        if self.is_active() {
            link.subscribe();
        }
        LinkHandle::new(link)
    }

    fn subscribe_links(&self) {
        let links: Vec<Arc<Link<T>>> = self.inner.links.lock().to_vec();
        for link in links {
            link.subscribe();
        }
    }

    fn unsubscribe_links(&self) {
        let links: Vec<Arc<Link<T>>> = self.inner.links.lock().to_vec();
        for link in links {
            link.unsubscribe();
        }
    }

    /// Activate if the node is inactive and somebody now observes it.
    ///
    /// The state flips before any side effect runs, so re-entrant
    /// activation attempts (a link subscription activating a cycle back
    /// into this node) see the node as already active and stop.
    fn maybe_activate(&self) {
        let flipped = {
            let mut state = self.inner.state.write();
            if *state == NodeState::Inactive && !self.inner.observers.lock().is_empty() {
                *state = NodeState::Dirty;
                true
            } else {
                false
            }
        };
        if flipped {
            trace!(id = self.inner.id, "{} activated", self.inner.label);
            self.subscribe_links();
            self.inner.kind.became_active(self);
        }
    }

    /// Deactivate if the node is active and the last observer just left.
    /// Drops the cache and the upstream subscriptions.
    fn maybe_deactivate(&self) {
        let flipped = {
            let mut state = self.inner.state.write();
            if state.is_active() && self.inner.observers.lock().is_empty() {
                *state = NodeState::Inactive;
                true
            } else {
                false
            }
        };
        if flipped {
            trace!(id = self.inner.id, "{} deactivated", self.inner.label);
            *self.inner.cache.write() = None;
            self.unsubscribe_links();
            self.inner.kind.became_inactive(self);
        }
    }

    /// Run `f` with the activation hooks cycled around it.
    ///
    /// Kinds that rewire what they watch (for example a projection whose
    /// source node is being swapped) wrap the rewiring in `update` so the
    /// old watch is released and the new one established while observers
    /// stay subscribed throughout.
    pub fn update(&self, f: impl FnOnce(&Node<T>)) {
        if self.is_active() {
            self.inner.kind.became_inactive(self);
        }
        f(self);
        if self.is_active() {
            self.inner.kind.became_active(self);
        }
    }

    // ------------------------------------------------------------------------
    // Key-path children
    // ------------------------------------------------------------------------

    /// Memoized child node for a dotted key path.
    ///
    /// `get("a.b")` and `get("a").get("b")` resolve to the identical node:
    /// children are memoized per key for the parent's lifetime, which is
    /// what makes subscription identity and cache reuse work across
    /// separate lookups of the same path.
    pub fn get(&self, node_path: &str) -> Node<T> {
        let (first, tail) = path::split_first(node_path);
        let child = self.get_key(first);
        match tail {
            Some(rest) => child.get(rest),
            None => child,
        }
    }

    /// Memoized child node for a single key segment.
    pub fn get_key(&self, key: &str) -> Node<T> {
        if self.state().is_destroyed() {
            debug_assert!(false, "get_key() called on destroyed node {}", self.inner.label);
            return self.make_child(key);
        }

        if let Some(child) = self.child(key) {
            return child;
        }

        // The factory runs without the children lock held, so it may walk
        // the graph. If it re-entered and memoized this key itself, that
        // child wins and the fresh one is discarded before anybody saw it.
        let child = self.make_child(key);
        let mut children = self.inner.children.lock();
        let map = children.get_or_insert_with(IndexMap::new);
        if let Some(existing) = map.get(key) {
            return existing.clone();
        }
        map.insert(key.to_owned(), child.clone());
        child
    }

    fn child(&self, key: &str) -> Option<Node<T>> {
        self.inner
            .children
            .lock()
            .as_ref()
            .and_then(|map| map.get(key).cloned())
    }

    fn make_child(&self, key: &str) -> Node<T> {
        match &self.inner.factory {
            Some(factory) => factory.make_child(self, key),
            None => panic!(
                "node {} cannot derive children: no child factory installed",
                self.inner.label
            ),
        }
    }

    /// Forget the memoized child for `key`. The next `get` builds a fresh
    /// one. Children call this on their parent from their own teardown.
    pub fn remove_child(&self, key: &str) {
        let mut children = self.inner.children.lock();
        if let Some(map) = children.as_mut() {
            map.shift_remove(key);
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Register a cleanup action to run when the node is destroyed.
    ///
    /// Actions run once, in registration order, and receive the destroy
    /// call's prune flag. Registering on an already destroyed node runs the
    /// action immediately with `prune = false`.
    pub fn on_destroy(&self, callback: impl FnOnce(bool) + Send + 'static) {
        if self.state().is_destroyed() {
            callback(false);
            return;
        }
        self.inner.teardowns.lock().push(Box::new(callback));
    }

    /// Tear the node down. Returns whether this call did the work; `false`
    /// means the node was already destroyed and nothing happened.
    ///
    /// The destroyed state commits before any cleanup runs, so nested
    /// destroy calls fired from teardown actions or hooks see the terminal
    /// state and no-op. Cleanup order: observers are dropped, upstream
    /// subscriptions released (with `became_inactive` if the node was
    /// active), memoized children destroyed with the same prune flag, and
    /// finally the registered teardown actions run in order.
    pub fn destroy(&self, prune: bool) -> bool {
        let was_active = {
            let mut state = self.inner.state.write();
            if state.is_destroyed() {
                return false;
            }
            let was_active = state.is_active();
            *state = NodeState::Destroyed;
            was_active
        };

        self.inner.observers.lock().clear();

        if was_active {
            *self.inner.cache.write() = None;
            self.unsubscribe_links();
            self.inner.kind.became_inactive(self);
        }
        self.inner.links.lock().clear();

        let children: Vec<Node<T>> = match self.inner.children.lock().as_mut() {
            Some(map) => map.drain(..).map(|(_, child)| child).collect(),
            None => Vec::new(),
        };
        for child in children {
            child.destroy(prune);
        }

        let teardowns = std::mem::take(&mut *self.inner.teardowns.lock());
        for teardown in teardowns {
            teardown(prune);
        }

        debug!(id = self.inner.id, "{} destroyed", self.inner.label);
        true
    }

    /// Destroy the node if nothing observes it anymore.
    ///
    /// Used by [`Subscription::unsubscribe_and_prune`] to opportunistically
    /// free derived nodes whose one consumer just left; the cascade runs
    /// with `prune = true` so parents get the same chance.
    pub fn prune(&self) {
        if self.inner.observers.lock().is_empty() {
            self.destroy(true);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
