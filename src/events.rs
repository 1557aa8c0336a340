//! Multi-subscriber callback registry
//!
//! Bricks and sensors raise notifications (connected, polled, value changed)
//! to any number of listeners. Each subscription gets a [`SubscriptionId`]
//! that removes exactly that listener.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`Observers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Subscription<E, A> {
    id: SubscriptionId,
    event: E,
    callback: Callback<A>,
}

/// Listeners keyed by event kind `E`, each receiving `&A`
pub struct Observers<E, A> {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription<E, A>>>,
}

impl<E: Copy + PartialEq, A> Observers<E, A> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Register `callback` for `event`
    pub fn subscribe<F>(&self, event: E, callback: F) -> SubscriptionId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            event,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove one subscription; false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Invoke every listener registered for `event`
    ///
    /// Callbacks run on the caller's thread after the registry lock is
    /// released, so a listener may subscribe or unsubscribe re-entrantly.
    pub fn notify(&self, event: E, args: &A) {
        let callbacks: Vec<Callback<A>> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.event == event)
            .map(|s| Arc::clone(&s.callback))
            .collect();

        for callback in callbacks {
            callback(args);
        }
    }

    /// Number of listeners for `event`
    pub fn count(&self, event: E) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.event == event)
            .count()
    }
}

impl<E: Copy + PartialEq, A> Default for Observers<E, A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ping {
        A,
        B,
    }

    #[test]
    fn test_multiple_subscribers_and_unsubscribe() {
        let observers: Observers<Ping, u32> = Observers::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = Arc::clone(&total);
        let first = observers.subscribe(Ping::A, move |v| {
            t1.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let t2 = Arc::clone(&total);
        observers.subscribe(Ping::A, move |v| {
            t2.fetch_add(*v as usize * 10, Ordering::SeqCst);
        });

        observers.notify(Ping::A, &1);
        observers.notify(Ping::B, &1);
        assert_eq!(total.load(Ordering::SeqCst), 11);

        assert!(observers.unsubscribe(first));
        assert!(!observers.unsubscribe(first));
        observers.notify(Ping::A, &1);
        assert_eq!(total.load(Ordering::SeqCst), 21);
        assert_eq!(observers.count(Ping::A), 1);
    }

    #[test]
    fn test_reentrant_unsubscribe() {
        let observers: Arc<Observers<Ping, ()>> = Arc::new(Observers::new());
        let inner = Arc::clone(&observers);
        let id = Arc::new(Mutex::new(None));
        let id_slot = Arc::clone(&id);

        let sub = observers.subscribe(Ping::B, move |_| {
            if let Some(id) = *id_slot.lock() {
                inner.unsubscribe(id);
            }
        });
        *id.lock() = Some(sub);

        observers.notify(Ping::B, &());
        assert_eq!(observers.count(Ping::B), 0);
    }
}
