//! Dispatch protocol types for the warden authorization engine.
//!
//! This crate defines the contract between dispatchers: the request and
//! response envelopes for the five dispatch operations. These types are used
//! by:
//!
//! - The local graph evaluator (the delegate end of the chain)
//! - Remoting layers that forward dispatches to peer nodes
//! - Decorators such as the single-flight dispatcher
//!
//! # Contract Overview
//!
//! Every request carries [`ResolverMeta`]: the revision the evaluation is
//! pinned to and the remaining dispatch depth. Every response carries
//! [`ResponseMeta`] with the number of dispatches the evaluation performed.
//! The unary operations (`check`, `expand`) return a single envelope; the
//! three lookup operations stream zero or more envelopes then terminate.
//!
//! Request envelopes also carry an optional `request_id` used purely for
//! log correlation. It has no effect on the response and is excluded from
//! dispatch fingerprints.

mod error;
mod meta;
mod request;
mod response;

pub use error::{ProtocolError, Result};
pub use meta::{ResolverMeta, ResponseMeta};
pub use request::{
    CheckRequest, Cursor, ExpandRequest, ExpansionMode, LookupResourcesRequest,
    LookupSubjectsRequest, ReachableResourcesRequest, ResultSetting,
};
pub use response::{
    CheckResponse, ExpandResponse, ExpandTreeNode, FoundSubject, LookupResourcesResponse,
    LookupSubjectsResponse, Permissionship, ReachableResource, ReachableResourcesResponse,
    ReachabilityStatus, SubjectSet,
};

/// Default dispatch depth for top-level requests.
///
/// Each recursive dispatch decrements the remaining depth; hitting zero means
/// the schema contains a reference cycle deeper than the engine is willing to
/// walk.
pub const DEFAULT_DEPTH_REMAINING: u32 = 50;

/// Version tag carried in dispatch cursors.
///
/// Cursors are only resumable against the same dispatch algorithm; a version
/// bump invalidates outstanding cursors.
pub const DISPATCH_CURSOR_VERSION: u32 = 1;
