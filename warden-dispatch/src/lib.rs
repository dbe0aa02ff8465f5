//! # Warden Dispatch
//!
//! The dispatch layer of the warden authorization engine.
//!
//! This crate provides:
//! - The [`Dispatcher`] trait: the seam along which check/expand/lookup
//!   evaluations are delegated, locally or to peers
//! - Request fingerprinting ([`KeyHandler`], [`DirectKeyHandler`])
//! - The single-flight decorator ([`SingleFlightDispatcher`]) that coalesces
//!   concurrent identical unary dispatches
//! - The publish [`LimitTracker`] bounding streaming traversals
//!
//! ## Composing a dispatch chain
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_dispatch::{DirectKeyHandler, Dispatcher, SingleFlightDispatcher};
//!
//! let delegate: Arc<dyn Dispatcher> = make_local_dispatcher();
//! let dispatcher = SingleFlightDispatcher::new(delegate, Arc::new(DirectKeyHandler::new()));
//! let response = dispatcher.check(request).await?;
//! ```

pub mod dispatcher;
pub mod error;
pub mod keys;
pub mod limits;
pub mod singleflight;

// Re-export main types
pub use dispatcher::{
    DispatchStream, Dispatcher, LookupResourcesStream, LookupSubjectsStream,
    ReachableResourcesStream, ReadyState,
};
pub use error::{DispatchError, Result};
pub use keys::{DirectKeyHandler, KeyHandler};
pub use limits::{LimitTracker, PublishTicket};
pub use singleflight::{
    Group, SingleFlightDispatcher, SingleFlightSnapshot, SingleFlightStats,
};
