//! Subscriber lists with a clear generation.
//!
//! [`Observers`] replaces multicast delegates: it stores who is subscribed and
//! a generation counter that is bumped every time the list is cleared. A
//! subscriber that remembers the generation it subscribed at can tell in O(1)
//! whether its subscription was dropped by a clear, even if it never saw the
//! clear happen.
//!
//! Notifications themselves are not delivered through callbacks. Emitters push
//! them into a FIFO outbox and the owner of both sides dispatches them after
//! the emitting call returns, in the order they were produced.

use serde::{Deserialize, Serialize};

/// Ordered, duplicate-free subscriber list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observers<S> {
    subscribers: Vec<S>,
    generation: u64,
}

impl<S: Copy + PartialEq> Observers<S> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            generation: 0,
        }
    }

    /// Add `subscriber`. Returns `false` if it was already subscribed.
    pub fn subscribe(&mut self, subscriber: S) -> bool {
        if self.subscribers.contains(&subscriber) {
            return false;
        }
        self.subscribers.push(subscriber);
        true
    }

    /// Remove `subscriber`. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, subscriber: S) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| *s != subscriber);
        self.subscribers.len() != before
    }

    pub fn contains(&self, subscriber: S) -> bool {
        self.subscribers.contains(&subscriber)
    }

    /// Subscribers in subscription order.
    pub fn subscribers(&self) -> &[S] {
        &self.subscribers
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Number of times the list was cleared.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` if `subscriber` is subscribed and the list has not been cleared
    /// since `generation`.
    pub fn is_current(&self, subscriber: S, generation: u64) -> bool {
        self.generation == generation && self.contains(subscriber)
    }

    /// Drop every subscriber and bump the generation.
    ///
    /// Returns the dropped subscribers so the caller can notify them.
    pub fn clear(&mut self) -> Vec<S> {
        self.generation += 1;
        std::mem::take(&mut self.subscribers)
    }
}

impl<S: Copy + PartialEq> Default for Observers<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let mut obs = Observers::new();
        assert!(obs.subscribe(1u32));
        assert!(!obs.subscribe(1u32));
        assert_eq!(obs.len(), 1);
    }

    #[test]
    fn unsubscribe_unknown_is_reported() {
        let mut obs = Observers::new();
        obs.subscribe(1u32);
        assert!(!obs.unsubscribe(2));
        assert!(obs.unsubscribe(1));
        assert!(obs.is_empty());
    }

    #[test]
    fn clear_invalidates_earlier_generation() {
        let mut obs = Observers::new();
        obs.subscribe(7u32);
        let gen = obs.generation();
        assert!(obs.is_current(7, gen));
        assert_eq!(obs.clear(), vec![7]);
        assert!(!obs.is_current(7, gen));
        obs.subscribe(7);
        assert!(!obs.is_current(7, gen));
        assert!(obs.is_current(7, obs.generation()));
    }

    #[test]
    fn subscription_order_is_preserved() {
        let mut obs = Observers::new();
        for s in [3u32, 1, 2] {
            obs.subscribe(s);
        }
        assert_eq!(obs.subscribers(), &[3, 1, 2]);
    }
}
