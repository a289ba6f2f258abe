//! # Negotiation
//!
//! Reconciles the capability declarations of every registered CV module and
//! the caller's restriction into one configuration accepted by a device.
//!
//! Layers, leaves first:
//! - [`enumerate`] turns an indexed [`contracts::CapabilitySource`] into a list
//! - [`Supersets`] merges one candidate per group, in preference order
//! - [`find_satisfying_config`] picks a module's config under a superset
//! - [`NegotiationEngine`] drives the search, acquires the device and applies
//!   the result with rollback
//!
//! ## Usage
//!
//! ```ignore
//! let engine = NegotiationEngine::new();
//! let negotiated = engine.negotiate(context.as_ref(), &modules, &restriction, callback)?;
//! ```

mod engine;
mod enumerator;
mod error;
mod matcher;
mod superset;

pub use engine::{Negotiated, NegotiationEngine};
pub use enumerator::{enumerate, enumerate_with_limit, MAX_ENUMERATED_CONFIGS};
pub use error::{NegotiationError, Result};
pub use matcher::{find_satisfying_config, first_satisfying, satisfies};
pub use superset::{merge, merge_all, Supersets};
