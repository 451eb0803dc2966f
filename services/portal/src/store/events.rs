//! services/portal/src/store/events.rs
//!
//! The session event bus. The session controller publishes; every store that holds
//! per-user state subscribes when it is constructed and resets itself on logout.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session ended, explicitly or through the async logout completing.
    LoggedOut,
}

/// Anything that reacts to session changes.
pub trait SessionListener: Send + Sync {
    fn on_session_event(&self, event: SessionEvent);
}

/// Synchronous publish/subscribe hub.
///
/// Listeners are held weakly: a dropped store simply stops receiving events.
#[derive(Clone, Default)]
pub struct SessionBus {
    listeners: Arc<Mutex<Vec<Weak<dyn SessionListener>>>>,
}

impl SessionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Weak<dyn SessionListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Delivers `event` to every live listener before returning.
    pub fn publish(&self, event: SessionEvent) {
        // Collect first so a listener may touch the bus without deadlocking.
        let live: Vec<Arc<dyn SessionListener>> = {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        debug!(?event, listeners = live.len(), "Publishing session event");
        for listener in live {
            listener.on_session_event(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| l.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl SessionListener for Counter {
        fn on_session_event(&self, _event: SessionEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn delivers_to_live_listeners_and_forgets_dropped_ones() {
        let bus = SessionBus::new();
        let kept = Arc::new(Counter::default());
        let dropped = Arc::new(Counter::default());
        let kept_weak: Weak<dyn SessionListener> = Arc::downgrade(&kept) as Weak<dyn SessionListener>;
        let dropped_weak: Weak<dyn SessionListener> = Arc::downgrade(&dropped) as Weak<dyn SessionListener>;
        bus.subscribe(kept_weak);
        bus.subscribe(dropped_weak);
        drop(dropped);

        bus.publish(SessionEvent::LoggedOut);

        assert_eq!(kept.0.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 1);
    }
}
