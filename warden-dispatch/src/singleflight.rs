//! Single-flight dispatch coalescing
//!
//! Under load the dispatch graph produces many identical sub-queries at the
//! same moment: thousands of concurrent checks against one popular resource
//! fan out into the same `document#view@user:...` sub-dispatches, pinned to
//! the same revision. This module deduplicates them: concurrent callers whose
//! requests share a fingerprint ride on a single delegate evaluation and all
//! receive its result.
//!
//! Only the unary operations (`check`, `expand`) are coalesced. The
//! streaming operations pass through untouched: their items are observed
//! incrementally and consumer-specifically, and sharing them safely would
//! require per-subscriber buffering the dispatch layer does not do.
//!
//! ## Lifetime of a shared computation
//!
//! The first caller for a fingerprint installs an in-flight entry and spawns
//! the delegate call as its own task, instrumented with that caller's span.
//! Later callers subscribe to the entry's watch channel. Every caller holds
//! a waiter guard; when the last guard drops before completion the task is
//! cancelled and the entry removed, so callers with non-overlapping
//! lifetimes never share results. The result is published before the entry
//! is removed, so every subscribed waiter observes it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use warden_protocol::{
    CheckRequest, CheckResponse, ExpandRequest, ExpandResponse, LookupResourcesRequest,
    LookupSubjectsRequest, ReachableResourcesRequest,
};

use crate::dispatcher::{
    Dispatcher, LookupResourcesStream, LookupSubjectsStream, ReachableResourcesStream, ReadyState,
};
use crate::error::{DispatchError, Result};
use crate::keys::KeyHandler;

type SharedResult<R> = Result<R>;

struct Waiters {
    count: AtomicUsize,
    cancel: CancellationToken,
}

/// Decrements the waiter count on drop; the last waiter out cancels the
/// shared computation.
struct WaiterGuard(Arc<Waiters>);

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.cancel.cancel();
        }
    }
}

struct InflightEntry<R> {
    tx: watch::Sender<Option<SharedResult<R>>>,
    waiters: Arc<Waiters>,
}

/// Removes the in-flight entry when the computation task ends, whether it
/// published, was cancelled, or panicked. Without this, waiters of a dead
/// computation would rejoin the stale entry forever.
struct EntryRemovalGuard<R> {
    key: String,
    inflight: Arc<DashMap<String, InflightEntry<R>>>,
}

impl<R> Drop for EntryRemovalGuard<R> {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}

/// A group of in-flight computations keyed by fingerprint.
///
/// Entries exist only while at least one caller is awaiting the result; the
/// entry for a key is installed by its first caller and removed when the
/// computation completes or is abandoned.
pub struct Group<R> {
    inflight: Arc<DashMap<String, InflightEntry<R>>>,
}

impl<R> Default for Group<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Group<R> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

impl<R: Clone + Send + Sync + 'static> Group<R> {
    /// Run `compute` for `key`, unless an identical computation is already
    /// in flight, in which case await and share its result. Returns the
    /// result and whether it was shared (produced by a computation another
    /// caller initiated).
    ///
    /// The computation runs as a spawned task so it survives the caller that
    /// started it; it is cancelled only when every awaiting caller has
    /// dropped. Must be called from within a tokio runtime.
    pub async fn execute<F, Fut>(&self, key: &str, compute: F) -> (SharedResult<R>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SharedResult<R>> + Send + 'static,
    {
        let mut compute = Some(compute);

        loop {
            // Critical section: look up or install the in-flight entry.
            // The computation itself never runs under the shard lock.
            let (mut rx, _waiter, shared) = match self.inflight.entry(key.to_string()) {
                Entry::Occupied(entry) => {
                    let existing = entry.get();
                    existing.waiters.count.fetch_add(1, Ordering::AcqRel);
                    (
                        existing.tx.subscribe(),
                        WaiterGuard(existing.waiters.clone()),
                        true,
                    )
                }
                Entry::Vacant(entry) => {
                    let (tx, rx) = watch::channel(None);
                    let waiters = Arc::new(Waiters {
                        count: AtomicUsize::new(1),
                        cancel: CancellationToken::new(),
                    });
                    entry.insert(InflightEntry {
                        tx: tx.clone(),
                        waiters: waiters.clone(),
                    });

                    let compute = compute.take().expect("in-flight computation started twice");
                    let fut = compute();
                    let cancel = waiters.cancel.clone();
                    let removal = EntryRemovalGuard {
                        key: key.to_string(),
                        inflight: self.inflight.clone(),
                    };
                    tokio::spawn(
                        async move {
                            // Publish before the removal guard drops so
                            // every subscribed waiter observes the result.
                            let _removal = removal;
                            tokio::select! {
                                _ = cancel.cancelled() => {}
                                result = fut => {
                                    let _ = tx.send(Some(result));
                                }
                            }
                        }
                        .in_current_span(),
                    );

                    (rx, WaiterGuard(waiters), false)
                }
            };

            loop {
                let published = rx.borrow().as_ref().cloned();
                if let Some(result) = published {
                    return (result, shared);
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }

            // The computation died without publishing. A joiner raced with
            // abandonment and retries against a fresh entry; the initiator
            // can only get here if its own computation panicked.
            if !shared {
                return (
                    Err(DispatchError::internal(
                        "dispatch computation terminated without a result",
                    )),
                    false,
                );
            }
        }
    }
}

/// Counters for single-flighted dispatches, labelled by method and whether
/// the result was shared. Lock-free; read via [`SingleFlightStats::snapshot`].
#[derive(Debug, Default)]
pub struct SingleFlightStats {
    check_initiated: AtomicU64,
    check_shared: AtomicU64,
    expand_initiated: AtomicU64,
    expand_shared: AtomicU64,
}

impl SingleFlightStats {
    fn record_check(&self, shared: bool) {
        if shared {
            self.check_shared.fetch_add(1, Ordering::Relaxed);
        } else {
            self.check_initiated.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_expand(&self, shared: bool) {
        if shared {
            self.expand_shared.fetch_add(1, Ordering::Relaxed);
        } else {
            self.expand_initiated.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a point-in-time copy of the counters.
    pub fn snapshot(&self) -> SingleFlightSnapshot {
        SingleFlightSnapshot {
            check_initiated: self.check_initiated.load(Ordering::Relaxed),
            check_shared: self.check_shared.load(Ordering::Relaxed),
            expand_initiated: self.expand_initiated.load(Ordering::Relaxed),
            expand_shared: self.expand_shared.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the single-flight counters.
///
/// `*_initiated` counts calls that drove the delegate computation
/// (`shared = false`); `*_shared` counts calls that joined one
/// (`shared = true`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SingleFlightSnapshot {
    pub check_initiated: u64,
    pub check_shared: u64,
    pub expand_initiated: u64,
    pub expand_shared: u64,
}

/// A dispatcher decorator that coalesces concurrent identical `check` and
/// `expand` requests into a single delegate evaluation.
///
/// Identity is decided by the injected [`KeyHandler`]; see that module for
/// the purity requirements. Streaming operations, `close`, and `ready_state`
/// pass through to the delegate unchanged.
pub struct SingleFlightDispatcher {
    delegate: Arc<dyn Dispatcher>,
    key_handler: Arc<dyn KeyHandler>,
    check_group: Group<CheckResponse>,
    expand_group: Group<ExpandResponse>,
    stats: SingleFlightStats,
}

impl SingleFlightDispatcher {
    /// Wrap a delegate dispatcher with single-flight coalescing.
    pub fn new(delegate: Arc<dyn Dispatcher>, key_handler: Arc<dyn KeyHandler>) -> Self {
        Self {
            delegate,
            key_handler,
            check_group: Group::new(),
            expand_group: Group::new(),
            stats: SingleFlightStats::default(),
        }
    }

    /// Current single-flight counters.
    pub fn stats(&self) -> SingleFlightSnapshot {
        self.stats.snapshot()
    }

    fn key_error(err: DispatchError) -> DispatchError {
        match err {
            err @ DispatchError::KeyDerivation(_) => err,
            other => DispatchError::KeyDerivation(other.to_string()),
        }
    }
}

#[async_trait]
impl Dispatcher for SingleFlightDispatcher {
    async fn check(&self, req: CheckRequest) -> Result<CheckResponse> {
        let key = self
            .key_handler
            .check_dispatch_key(&req)
            .map_err(Self::key_error)?;
        let key = hex::encode(key);

        let delegate = Arc::clone(&self.delegate);
        let (result, shared) = self
            .check_group
            .execute(&key, move || async move { delegate.check(req).await })
            .await;

        self.stats.record_check(shared);
        tracing::debug!(method = "check", key = %key, shared, ok = result.is_ok(), "dispatched");
        result
    }

    async fn expand(&self, req: ExpandRequest) -> Result<ExpandResponse> {
        let key = self
            .key_handler
            .expand_dispatch_key(&req)
            .map_err(Self::key_error)?;
        let key = hex::encode(key);

        let delegate = Arc::clone(&self.delegate);
        let (result, shared) = self
            .expand_group
            .execute(&key, move || async move { delegate.expand(req).await })
            .await;

        self.stats.record_expand(shared);
        tracing::debug!(method = "expand", key = %key, shared, ok = result.is_ok(), "dispatched");
        result
    }

    async fn reachable_resources(
        &self,
        req: ReachableResourcesRequest,
    ) -> Result<ReachableResourcesStream> {
        self.delegate.reachable_resources(req).await
    }

    async fn lookup_resources(
        &self,
        req: LookupResourcesRequest,
    ) -> Result<LookupResourcesStream> {
        self.delegate.lookup_resources(req).await
    }

    async fn lookup_subjects(&self, req: LookupSubjectsRequest) -> Result<LookupSubjectsStream> {
        self.delegate.lookup_subjects(req).await
    }

    async fn close(&self) -> Result<()> {
        self.delegate.close().await
    }

    fn ready_state(&self) -> ReadyState {
        self.delegate.ready_state()
    }
}
