//! Adaptive in-flight request gate.
//!
//! The gate admits up to `max_active` concurrent requests. A 429 from
//! upstream shrinks the window to ⌈0.9 × max⌉ with a floor of 1; the window
//! never grows back within a run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::utils::constants::SLOT_POLL_MS;

pub struct SlotGate {
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl SlotGate {
    #[must_use]
    pub fn new(max_active: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(max_active.max(1)),
        }
    }

    /// Block until a slot is free, then claim it.
    ///
    /// Polls rather than parking on a notifier so that a shrunken window is
    /// picked up by waiting claimants without extra bookkeeping.
    pub async fn claim(&self) -> SlotGuard<'_> {
        loop {
            let admitted = self
                .active
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                    if active < self.max_active.load(Ordering::Acquire) {
                        Some(active + 1)
                    } else {
                        None
                    }
                })
                .is_ok();
            if admitted {
                return SlotGuard { gate: self };
            }
            tokio::time::sleep(Duration::from_millis(SLOT_POLL_MS)).await;
        }
    }

    /// React to an upstream 429: `max_active ← max(1, ⌈0.9 × max_active⌉)`.
    pub fn shrink_on_throttle(&self) {
        let previous = self
            .max_active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |max| {
                Some(((max * 9).div_ceil(10)).max(1))
            })
            .unwrap_or(1);
        log::warn!(
            "throttled by upstream: reducing request window {} -> {}",
            previous,
            ((previous * 9).div_ceil(10)).max(1)
        );
    }

    #[must_use]
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the claimed slot on drop.
pub struct SlotGuard<'a> {
    gate: &'a SlotGate,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.gate.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_and_release_track_active() {
        let gate = SlotGate::new(2);
        let a = gate.claim().await;
        let b = gate.claim().await;
        assert_eq!(gate.active(), 2);
        drop(a);
        assert_eq!(gate.active(), 1);
        drop(b);
        assert_eq!(gate.active(), 0);
    }

    #[test]
    fn shrink_never_goes_below_one() {
        let gate = SlotGate::new(30);
        gate.shrink_on_throttle();
        assert_eq!(gate.max_active(), 27);

        let gate = SlotGate::new(1);
        for _ in 0..5 {
            gate.shrink_on_throttle();
        }
        assert_eq!(gate.max_active(), 1);
    }

    #[test]
    fn shrink_is_ceiling_of_ninety_percent() {
        let gate = SlotGate::new(10);
        gate.shrink_on_throttle();
        assert_eq!(gate.max_active(), 9);
        let gate = SlotGate::new(11);
        gate.shrink_on_throttle();
        // ⌈9.9⌉ = 10
        assert_eq!(gate.max_active(), 10);
    }

    #[tokio::test]
    async fn claim_waits_for_a_free_slot() {
        use std::sync::Arc;
        let gate = Arc::new(SlotGate::new(1));
        let guard = gate.claim().await;

        let gate2 = Arc::clone(&gate);
        let waiter = tokio::spawn(async move {
            let _g = gate2.claim().await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }
}
