//! Hand-off of owned values into a running callback
//!
//! The capture and render callbacks each own one half of the sample queue.
//! When the engine builds a new queue it cannot reach into a boxed closure,
//! so it posts the new half through a small mailbox. The callback swaps it
//! in at its next period and posts the half it replaced back, so the old
//! ring buffer is freed on the control thread rather than the audio thread.
//!
//! ```text
//!   control thread                          audio callback
//!   ──────────────                          ──────────────
//!   LinkSender::send(new) ──── deliver ───► LinkReceiver::poll()
//!   drop(old)            ◄─── retired ────  current = new, retire old
//! ```

use rtrb::{Consumer, Producer, RingBuffer};

/// Deliveries that may be pending before the callback picks them up
const DELIVER_CAPACITY: usize = 8;

/// Replaced values waiting to be dropped on the control thread
const RETIRED_CAPACITY: usize = DELIVER_CAPACITY * 2;

/// Control-thread end of a link
pub struct LinkSender<T> {
    deliver: Producer<T>,
    retired: Consumer<T>,
}

/// Callback end of a link; owns the value currently in use
pub struct LinkReceiver<T> {
    deliver: Consumer<T>,
    retired: Producer<T>,
    current: Option<T>,
}

/// Create a connected sender/receiver pair with nothing linked yet
pub fn link<T>() -> (LinkSender<T>, LinkReceiver<T>) {
    let (deliver_tx, deliver_rx) = RingBuffer::new(DELIVER_CAPACITY);
    let (retired_tx, retired_rx) = RingBuffer::new(RETIRED_CAPACITY);
    (
        LinkSender {
            deliver: deliver_tx,
            retired: retired_rx,
        },
        LinkReceiver {
            deliver: deliver_rx,
            retired: retired_tx,
            current: None,
        },
    )
}

impl<T> LinkSender<T> {
    /// Post a value for the callback to adopt
    ///
    /// Returns the value back if too many deliveries are still pending.
    pub fn send(&mut self, value: T) -> Result<(), T> {
        self.collect();
        self.deliver.push(value).map_err(|rtrb::PushError::Full(value)| value)
    }

    /// Whether [`LinkSender::send`] would succeed right now
    pub fn has_room(&mut self) -> bool {
        self.collect();
        self.deliver.slots() > 0
    }

    /// Drop values the callback has let go of; returns how many
    pub fn collect(&mut self) -> usize {
        let mut dropped = 0;
        while self.retired.pop().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

impl<T> LinkReceiver<T> {
    /// Adopt any pending deliveries (real-time safe)
    ///
    /// Only the newest one stays current; the others are retired unused.
    /// Nothing is ever dropped here: while the retired queue is full,
    /// deliveries stay pending until the control thread collects.
    #[inline]
    pub fn poll(&mut self) {
        while self.current.is_none() || self.retired.slots() > 0 {
            let Ok(value) = self.deliver.pop() else {
                break;
            };
            if let Some(old) = self.current.replace(value) {
                let retired = self.retired.push(old);
                debug_assert!(retired.is_ok(), "retired slot checked before adopting");
            }
        }
    }

    #[inline]
    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.current.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_receiver_adopts_newest() {
        let (mut tx, mut rx) = link::<u32>();
        assert!(rx.current_mut().is_none());

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        rx.poll();
        assert_eq!(rx.current_mut().copied(), Some(2));
    }

    #[test]
    fn test_replaced_values_drop_on_sender_side() {
        let drops = Arc::new(AtomicUsize::new(0));
        let (mut tx, mut rx) = link();

        tx.send(Tracked(Arc::clone(&drops))).ok().unwrap();
        rx.poll();
        tx.send(Tracked(Arc::clone(&drops))).ok().unwrap();
        rx.poll();

        // The first value now sits in the retired queue, not yet dropped
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(tx.collect(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_fails_when_mailbox_full() {
        let (mut tx, _rx) = link::<u32>();
        for i in 0..DELIVER_CAPACITY as u32 {
            tx.send(i).unwrap();
        }
        assert_eq!(tx.send(99), Err(99));
        assert!(!tx.has_room());
    }

    #[test]
    fn test_full_retired_queue_keeps_deliveries_pending() {
        let drops = Arc::new(AtomicUsize::new(0));
        let (mut tx, mut rx) = link();

        // Fill the retired queue without the sender collecting in between
        for _ in 0..=RETIRED_CAPACITY {
            tx.deliver.push(Tracked(Arc::clone(&drops))).ok().unwrap();
            rx.poll();
        }
        assert_eq!(rx.retired.slots(), 0);

        tx.deliver.push(Tracked(Arc::clone(&drops))).ok().unwrap();
        rx.poll();
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(rx.deliver.slots(), 1);

        // Once collected, the pending value is adopted
        assert_eq!(tx.collect(), RETIRED_CAPACITY);
        rx.poll();
        assert_eq!(rx.deliver.slots(), 0);
        assert_eq!(tx.collect(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), RETIRED_CAPACITY + 1);
    }
}
