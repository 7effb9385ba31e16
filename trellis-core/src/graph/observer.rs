//! Observer records and the per-node observer list.
//!
//! An [`Observer`] pairs an identity with a notification callback. The
//! identity (an [`ObserverId`]) is what the rest of the graph matches on:
//! removal, duplicate-subscription grouping, and the skip argument of
//! `notify_except` all compare ids, never callbacks. One party may register
//! several observers under a single id and remove them together.
//!
//! The list preserves insertion order because fan-out order is part of the
//! contract: observers are notified strictly in the order they subscribed.
//!
//! # Re-entrancy
//!
//! Fan-out never iterates the live list. Callers take an
//! [`ObserverList::snapshot`] of the callbacks first and invoke them with no
//! lock held, so a callback that unsubscribes itself (or anything else)
//! mutates the list without corrupting the traversal. Observers added
//! during a fan-out are simply not part of that snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::node::Node;

/// Identity of an observer registration.
///
/// Ids are what registrations are matched by: two subscriptions made with
/// the same `ObserverId` are "the same party" for removal and for
/// `notify_except` skipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer id.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback invoked when a node changes; receives the node that notified.
pub type ObserverCallback<T> = Arc<dyn Fn(&Node<T>) + Send + Sync>;

/// One subscription record in a node's observer list.
pub(crate) struct Observer<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: ObserverId,
    callback: ObserverCallback<T>,
}

impl<T> Observer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(id: ObserverId, callback: ObserverCallback<T>) -> Self {
        Self { id, callback }
    }
}

/// Insertion-ordered list of observers owned by one node.
pub(crate) struct ObserverList<T>
where
    T: Clone + Send + Sync + 'static,
{
    entries: Vec<Observer<T>>,
}

impl<T> ObserverList<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Tail-append; the new observer is notified last.
    pub(crate) fn push(&mut self, observer: Observer<T>) {
        self.entries.push(observer);
    }

    /// Remove every record registered under `id`. Returns how many went.
    pub(crate) fn remove_all(&mut self, id: ObserverId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before - self.entries.len()
    }

    /// Remove the first record registered under `id`, if any.
    ///
    /// This is the unsubscribe-handle path: a handle stands for one
    /// registration even when several share an id.
    pub(crate) fn remove_first(&mut self, id: ObserverId) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Clone out the `(id, callback)` pairs in fan-out order.
    pub(crate) fn snapshot(&self) -> Vec<(ObserverId, ObserverCallback<T>)> {
        self.entries
            .iter()
            .map(|entry| (entry.id, Arc::clone(&entry.callback)))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ObserverCallback<i32> {
        Arc::new(|_: &Node<i32>| {})
    }

    #[test]
    fn observer_ids_are_unique() {
        let id1 = ObserverId::new();
        let id2 = ObserverId::new();
        let id3 = ObserverId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let mut list = ObserverList::new();
        let a = ObserverId::new();
        let b = ObserverId::new();
        let c = ObserverId::new();

        list.push(Observer::new(a, noop()));
        list.push(Observer::new(b, noop()));
        list.push(Observer::new(c, noop()));

        let order: Vec<ObserverId> = list.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn remove_all_removes_every_match() {
        let mut list = ObserverList::new();
        let shared = ObserverId::new();
        let other = ObserverId::new();

        list.push(Observer::new(shared, noop()));
        list.push(Observer::new(other, noop()));
        list.push(Observer::new(shared, noop()));

        assert_eq!(list.remove_all(shared), 2);
        assert_eq!(list.len(), 1);
        assert_eq!(list.remove_all(shared), 0);
    }

    #[test]
    fn remove_first_removes_one_match() {
        let mut list = ObserverList::new();
        let shared = ObserverId::new();

        list.push(Observer::new(shared, noop()));
        list.push(Observer::new(shared, noop()));

        assert!(list.remove_first(shared));
        assert_eq!(list.len(), 1);
        assert!(list.remove_first(shared));
        assert!(!list.remove_first(shared));
        assert!(list.is_empty());
    }
}
