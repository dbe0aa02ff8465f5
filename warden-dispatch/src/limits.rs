//! Publish limit tracking for streaming dispatches
//!
//! A streaming traversal may have many concurrent producers racing to
//! publish results, but the caller asked for at most `limit` of them. The
//! tracker couples the remaining count with a cancellation signal: the
//! moment the last slot is consumed, the derived token fires so producers
//! stop walking the graph instead of computing results nobody will receive.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Admission to publish exactly one result.
///
/// `commit` is the reserved hook for a future reservation/commit split; it
/// currently does nothing, but every admitted path must still call it.
#[must_use = "an admitted publish must be committed"]
#[derive(Debug)]
pub struct PublishTicket(());

impl PublishTicket {
    /// Commit the published result.
    pub fn commit(self) {}
}

#[derive(Debug)]
struct LimitInner {
    remaining: Mutex<u32>,
    cancel: CancellationToken,
}

/// Shared countdown of how many results a streaming traversal may still
/// publish.
///
/// Cloning is cheap and shares the countdown, so every producer of one
/// traversal holds the same tracker. All operations are linearizable: the
/// number of admissions never exceeds the original limit and the derived
/// cancellation fires exactly once, on the transition to zero.
#[derive(Debug, Clone)]
pub struct LimitTracker {
    inner: Arc<LimitInner>,
}

impl LimitTracker {
    /// Create a tracker for `limit` publishes under the given parent
    /// cancellation, returning the tracker and the derived token producers
    /// should watch. A zero limit returns an already-cancelled token.
    pub fn new(parent: &CancellationToken, limit: u32) -> (Self, CancellationToken) {
        let child = parent.child_token();
        if limit == 0 {
            child.cancel();
        }
        let tracker = Self {
            inner: Arc::new(LimitInner {
                remaining: Mutex::new(limit),
                cancel: child.clone(),
            }),
        };
        (tracker, child)
    }

    /// Reserve one publish slot.
    ///
    /// Returns `None` when no slots remain. On admission the remaining count
    /// is decremented atomically, and when that decrement consumes the last
    /// slot the derived cancellation fires before this method returns.
    pub fn prepare_for_publishing(&self) -> Option<PublishTicket> {
        let mut remaining = self.inner.remaining.lock();
        if *remaining == 0 {
            return None;
        }

        *remaining -= 1;
        if *remaining == 0 {
            self.inner.cancel.cancel();
        }
        Some(PublishTicket(()))
    }

    /// Account for `count` results that were already published upstream
    /// without passing through [`prepare_for_publishing`], returning the new
    /// remaining count. Saturates: a count larger than the remainder zeroes
    /// it and fires the cancellation.
    ///
    /// # Panics
    ///
    /// Panics when called after the remaining count has already reached
    /// zero. The saturating over-mark is a benign race between a producer
    /// and a terminal cancellation; marking *again* past zero means the
    /// caller's accounting is broken, which is a bug rather than a runtime
    /// condition.
    ///
    /// [`prepare_for_publishing`]: LimitTracker::prepare_for_publishing
    pub fn mark_already_published(&self, count: u32) -> u32 {
        let mut remaining = self.inner.remaining.lock();
        if count == 0 {
            return *remaining;
        }

        assert!(
            *remaining > 0,
            "marked {count} results as published after the publish limit was exhausted"
        );

        if count >= *remaining {
            *remaining = 0;
            self.inner.cancel.cancel();
        } else {
            *remaining -= count;
        }
        *remaining
    }

    /// The number of publish slots still available.
    pub fn remaining(&self) -> u32 {
        *self.inner.remaining.lock()
    }
}
