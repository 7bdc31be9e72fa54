//! Weakly-held subscriber list with synchronous fan-out.
//!
//! Category handlers deliver each decoded report to every live subscriber
//! on the decoding thread, before the next record is parsed. Subscribers
//! are held through `Weak`, so the decoder never extends their lifetime;
//! slots whose owner dropped are pruned opportunistically after a fan-out
//! that observed them.

use std::sync::Weak;

use parking_lot::RwLock;

/// Receives reports of type `R` as they decode.
///
/// Called with the listener registry's shared lock held: implementations
/// must not re-enter the decoder and should return promptly.
pub trait ReportListener<R>: Send + Sync {
    fn on_report(&self, report: &R);
}

/// Multi-reader, single-writer subscriber list.
pub struct ListenerSet<R> {
    listeners: RwLock<Vec<Weak<dyn ReportListener<R>>>>,
}

impl<R> Default for ListenerSet<R> {
    fn default() -> Self {
        ListenerSet { listeners: RwLock::new(Vec::new()) }
    }
}

impl<R> ListenerSet<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe. Duplicates of an already-registered listener are ignored;
    /// dead slots encountered along the way are dropped while the exclusive
    /// lock is held anyway.
    pub fn add(&self, listener: Weak<dyn ReportListener<R>>) {
        let mut listeners = self.listeners.write();
        listeners.retain(|slot| slot.strong_count() > 0);
        if listeners.iter().any(|slot| slot.ptr_eq(&listener)) {
            return;
        }
        listeners.push(listener);
    }

    /// Deliver `report` to every live subscriber, in registration order.
    pub fn fan_out(&self, report: &R) {
        let mut saw_expired = false;
        {
            let listeners = self.listeners.read();
            for slot in listeners.iter() {
                match slot.upgrade() {
                    Some(listener) => listener.on_report(report),
                    None => saw_expired = true,
                }
            }
        }

        if saw_expired {
            self.listeners.write().retain(|slot| slot.strong_count() > 0);
        }
    }

    /// Live subscriber count (expired slots excluded).
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter {
        seen: AtomicUsize,
    }

    impl ReportListener<u32> for Counter {
        fn on_report(&self, _report: &u32) {
            self.seen.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn counter() -> Arc<Counter> {
        Arc::new(Counter { seen: AtomicUsize::new(0) })
    }

    #[test]
    fn test_fan_out_reaches_all() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let a = counter();
        let b = counter();
        set.add(Arc::downgrade(&a) as Weak<dyn ReportListener<u32>>);
        set.add(Arc::downgrade(&b) as Weak<dyn ReportListener<u32>>);

        set.fan_out(&7);
        assert_eq!(a.seen.load(Ordering::Relaxed), 1);
        assert_eq!(b.seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_duplicate_add_ignored() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let a = counter();
        set.add(Arc::downgrade(&a) as Weak<dyn ReportListener<u32>>);
        set.add(Arc::downgrade(&a) as Weak<dyn ReportListener<u32>>);
        assert_eq!(set.len(), 1);

        set.fan_out(&1);
        assert_eq!(a.seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_dropped_listener_not_called_and_pruned() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let a = counter();
        let b = counter();
        set.add(Arc::downgrade(&a) as Weak<dyn ReportListener<u32>>);
        set.add(Arc::downgrade(&b) as Weak<dyn ReportListener<u32>>);

        drop(b);
        set.fan_out(&1);
        assert_eq!(a.seen.load(Ordering::Relaxed), 1);

        // The expired slot was pruned after the fan-out observed it.
        assert_eq!(set.listeners.read().len(), 1);
    }

    #[test]
    fn test_does_not_keep_listener_alive() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let a = counter();
        set.add(Arc::downgrade(&a) as Weak<dyn ReportListener<u32>>);

        let weak = Arc::downgrade(&a);
        drop(a);
        assert!(weak.upgrade().is_none());
        assert!(set.is_empty());
    }
}
