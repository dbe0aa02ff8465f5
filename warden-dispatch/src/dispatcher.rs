//! The dispatcher seam
//!
//! A `Dispatcher` answers the five dispatch operations, either by evaluating
//! locally against the relationship graph or by forwarding to a peer.
//! Decorators (the single-flight layer here; caching and remoting layers in
//! the surrounding program) wrap a delegate and expose the same trait, so a
//! dispatch chain composes transparently.
//!
//! The two unary operations return a single envelope. The three lookup
//! operations return a stream that yields zero or more envelopes and then
//! terminates; items are produced incrementally and are consumer-specific,
//! which is why decorators treat them as pass-through.

use async_trait::async_trait;
use futures::stream::BoxStream;

use warden_protocol::{
    CheckRequest, CheckResponse, ExpandRequest, ExpandResponse, LookupResourcesRequest,
    LookupResourcesResponse, LookupSubjectsRequest, LookupSubjectsResponse,
    ReachableResourcesRequest, ReachableResourcesResponse,
};

use crate::error::Result;

/// A stream of dispatch response envelopes.
pub type DispatchStream<T> = BoxStream<'static, Result<T>>;

/// Stream alias for the reachable-resources operation.
pub type ReachableResourcesStream = DispatchStream<ReachableResourcesResponse>;

/// Stream alias for the lookup-resources operation.
pub type LookupResourcesStream = DispatchStream<LookupResourcesResponse>;

/// Stream alias for the lookup-subjects operation.
pub type LookupSubjectsStream = DispatchStream<LookupSubjectsResponse>;

/// Readiness of a dispatcher to serve requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyState {
    pub ready: bool,
    pub message: Option<String>,
}

impl ReadyState {
    /// A dispatcher that is ready to serve.
    pub fn ready() -> Self {
        Self {
            ready: true,
            message: None,
        }
    }

    /// A dispatcher that is not (yet) ready, with a reason.
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self {
            ready: false,
            message: Some(message.into()),
        }
    }
}

/// The dispatch contract.
///
/// Implementations must be safe to share across tasks: any number of
/// callers may dispatch concurrently against one instance.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Resolve membership for a batch of candidate resources.
    async fn check(&self, req: CheckRequest) -> Result<CheckResponse>;

    /// Expand the membership tree of one resource and relation.
    async fn expand(&self, req: ExpandRequest) -> Result<ExpandResponse>;

    /// Stream the resources reachable from the given subjects.
    async fn reachable_resources(
        &self,
        req: ReachableResourcesRequest,
    ) -> Result<ReachableResourcesStream>;

    /// Stream the resources the subject holds the permission over.
    async fn lookup_resources(&self, req: LookupResourcesRequest)
        -> Result<LookupResourcesStream>;

    /// Stream the subjects holding the relation over the given resources.
    async fn lookup_subjects(&self, req: LookupSubjectsRequest) -> Result<LookupSubjectsStream>;

    /// Release any resources held by the dispatcher.
    async fn close(&self) -> Result<()>;

    /// Whether the dispatcher is ready to serve requests.
    fn ready_state(&self) -> ReadyState;
}
