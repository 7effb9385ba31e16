//! Cross-node dependency wiring.
//!
//! A [`Link`] is a downstream node's subscription to one upstream node. The
//! record exists from the moment `add_dependency` is called, but the actual
//! observer registration on the upstream only exists while the downstream
//! node is active. Activation subscribes every link in bulk, deactivation
//! unsubscribes them, and both directions are idempotent per link because
//! activation state and link existence are tracked independently.
//!
//! Each link owns a stable [`ObserverId`], so the observer it registers can
//! be matched by `notify_except`: a node that both feeds and is fed by the
//! same peer can push a value upstream without hearing its own echo.
//!
//! Registering with the upstream runs outside the slot lock, because the
//! upstream may activate and run arbitrary kind hooks. A hook that detaches
//! the link mid-registration wins; the fresh registration is taken back out.

use std::sync::Arc;

use parking_lot::Mutex;

use super::node::{Node, Subscription, WeakNode};
use super::observer::{ObserverCallback, ObserverId};

/// Upstream registration state for one link.
enum Slot<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// No registration.
    Idle,
    /// Registration in flight; the call that reserved the slot settles it.
    Pending,
    /// Live registration on the upstream.
    Live(Subscription<T>),
}

/// One upstream subscription owned by a downstream node.
///
/// The upstream is held weakly; only the live registration taken out by
/// [`subscribe`](Link::subscribe) pins it, so an idle link keeps nothing
/// alive in either direction.
pub(crate) struct Link<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: ObserverId,
    target: WeakNode<T>,
    callback: ObserverCallback<T>,
    subscription: Mutex<Slot<T>>,
}

impl<T> Link<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(target: &Node<T>, callback: ObserverCallback<T>) -> Self {
        Self {
            id: ObserverId::new(),
            target: target.downgrade(),
            callback,
            subscription: Mutex::new(Slot::Idle),
        }
    }

    pub(crate) fn id(&self) -> ObserverId {
        self.id
    }

    /// Register with the upstream node. Calling this on an already
    /// subscribed link is a no-op, so bulk activation never double-registers.
    /// A link whose upstream is gone stays quietly unsubscribed.
    ///
    /// The slot lock is dropped before the upstream call: registering the
    /// first observer activates the upstream and runs its hooks, which may
    /// re-enter this link. If a hook unsubscribed mid-registration the slot
    /// comes back idle, and the fresh registration is taken back out.
    pub(crate) fn subscribe(&self) {
        {
            let mut slot = self.subscription.lock();
            if !matches!(*slot, Slot::Idle) {
                return;
            }
            *slot = Slot::Pending;
        }

        let target = match self.target.upgrade() {
            Some(target) => target,
            None => {
                *self.subscription.lock() = Slot::Idle;
                return;
            }
        };
        let subscription = target.subscribe_with(self.id, Arc::clone(&self.callback));

        let mut slot = self.subscription.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Live(subscription);
        } else {
            drop(slot);
            subscription.unsubscribe();
        }
    }

    /// Drop the upstream registration, if one is live.
    pub(crate) fn unsubscribe(&self) {
        let taken = std::mem::replace(&mut *self.subscription.lock(), Slot::Idle);
        if let Slot::Live(subscription) = taken {
            subscription.unsubscribe();
        }
    }
}

/// Handle to a registered dependency, returned by
/// [`Node::add_dependency`](crate::Node::add_dependency).
///
/// The graph subscribes and unsubscribes the underlying link automatically
/// at the activation boundary; the handle exists for node kinds that need
/// manual control, and for [`observer_id`](LinkHandle::observer_id), which
/// feeds `notify_except` when pushing a value back upstream.
pub struct LinkHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    link: Arc<Link<T>>,
}

impl<T> LinkHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(link: Arc<Link<T>>) -> Self {
        Self { link }
    }

    /// Manually register the link with its upstream node. Idempotent.
    pub fn subscribe(&self) {
        self.link.subscribe();
    }

    /// Manually drop the link's upstream registration. Idempotent.
    pub fn unsubscribe(&self) {
        self.link.unsubscribe();
    }

    /// Identity of the observer this link registers on the upstream node.
    pub fn observer_id(&self) -> ObserverId {
        self.link.id()
    }
}

impl<T> Clone for LinkHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Cloning shares the same underlying link.
    fn clone(&self) -> Self {
        Self {
            link: Arc::clone(&self.link),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, NodeState};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn double_subscribe_registers_once() {
        let upstream = Node::source(1, "up");
        let hits = Arc::new(AtomicI32::new(0));
        let hits_clone = Arc::clone(&hits);

        let link = Link::new(
            &upstream,
            Arc::new(move |_: &Node<i32>| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        link.subscribe();
        link.subscribe();

        upstream.value();
        upstream.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn double_unsubscribe_is_harmless() {
        let upstream = Node::source(1, "up");
        let hits = Arc::new(AtomicI32::new(0));
        let hits_clone = Arc::clone(&hits);

        let link = Link::new(
            &upstream,
            Arc::new(move |_: &Node<i32>| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        link.subscribe();
        link.unsubscribe();
        link.unsubscribe();

        upstream.value();
        upstream.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dead_upstream_link_stays_silent() {
        let hits = Arc::new(AtomicI32::new(0));
        let hits_clone = Arc::clone(&hits);

        let link = {
            let upstream = Node::source(1, "up");
            Link::new(
                &upstream,
                Arc::new(move |_: &Node<i32>| {
                    hits_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };

        link.subscribe();
        link.unsubscribe();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    struct Detacher {
        handle: Arc<Mutex<Option<LinkHandle<i32>>>>,
    }

    impl NodeKind<i32> for Detacher {
        fn compute(&self) -> i32 {
            1
        }

        fn became_active(&self, _node: &Node<i32>) {
            if let Some(handle) = self.handle.lock().take() {
                handle.unsubscribe();
            }
        }
    }

    #[test]
    fn activation_hook_may_detach_the_link_that_woke_it() {
        let handle_slot = Arc::new(Mutex::new(None));
        let upstream = Node::new(
            Detacher {
                handle: Arc::clone(&handle_slot),
            },
            "up",
        );
        let downstream = Node::from_fn(|| 2, "down");
        *handle_slot.lock() = Some(downstream.add_dependency(&upstream));

        // Activating the downstream subscribes the link, which activates the
        // upstream, whose hook immediately detaches the same link again. The
        // hook's unsubscribe wins and the registration is taken back out.
        let sub = downstream.subscribe(|_| {});
        assert_eq!(upstream.observer_count(), 0);
        assert_eq!(upstream.state(), NodeState::Inactive);
        assert!(downstream.is_active());

        sub.unsubscribe();
    }
}
