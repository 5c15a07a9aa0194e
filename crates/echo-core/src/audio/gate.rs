//! Synchronous start/stop for device callbacks
//!
//! Pausing a device stream is asynchronous on most hosts: one more callback
//! may already be running when `pause()` returns. The gate closes that
//! window without putting a lock on the audio thread.
//!
//! The callback raises `busy`, then checks `open`. `close()` lowers `open`,
//! then waits for `busy` to drop. Both sides use `SeqCst`, so at least one of
//! them sees the other's store: either the callback sees the gate closed and
//! skips its work, or `close()` sees it busy and waits it out. Only the
//! control thread ever waits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Open/closed flag plus an in-callback marker for one device stream
#[derive(Debug, Default)]
pub struct CallbackGate {
    open: AtomicBool,
    busy: AtomicBool,
    /// Callbacks that passed the gate
    passes: AtomicU64,
}

impl CallbackGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let callbacks through
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    /// Stop callbacks; returns once no callback is inside the gate
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        while self.busy.load(Ordering::SeqCst) {
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Number of callbacks that did work since creation
    #[inline]
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Enter from the audio callback (never blocks)
    ///
    /// Returns a guard while the gate is open; the callback must do its work
    /// only while holding it.
    #[inline]
    pub fn enter(&self) -> Option<GatePass<'_>> {
        self.busy.store(true, Ordering::SeqCst);
        if self.open.load(Ordering::SeqCst) {
            self.passes.fetch_add(1, Ordering::Relaxed);
            Some(GatePass { busy: &self.busy })
        } else {
            self.busy.store(false, Ordering::SeqCst);
            None
        }
    }
}

/// Proof that a callback is inside an open gate
pub struct GatePass<'a> {
    busy: &'a AtomicBool,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_closed_gate_rejects() {
        let gate = CallbackGate::new();
        assert!(gate.enter().is_none());
        gate.open();
        assert!(gate.enter().is_some());
        gate.close();
        assert!(gate.enter().is_none());
        assert_eq!(gate.passes(), 1);
    }

    #[test]
    fn test_no_work_after_close_returns() {
        let gate = Arc::new(CallbackGate::new());
        let work_after_close = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        gate.open();

        let worker = {
            let gate = Arc::clone(&gate);
            let closed = Arc::clone(&closed);
            let work_after_close = Arc::clone(&work_after_close);
            std::thread::spawn(move || {
                for _ in 0..200_000 {
                    if let Some(_pass) = gate.enter() {
                        if closed.load(Ordering::SeqCst) {
                            work_after_close.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            })
        };

        std::thread::yield_now();
        gate.close();
        closed.store(true, Ordering::SeqCst);
        worker.join().unwrap();

        assert_eq!(work_after_close.load(Ordering::SeqCst), 0);
    }
}
