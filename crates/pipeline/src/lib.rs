//! # Pipeline
//!
//! Lifecycle of a camera pipeline.
//!
//! Responsibilities:
//! - CV module registration
//! - Configuration negotiation and atomic commit
//! - Start / stop / reset under one state lock
//! - Ordered teardown: consumers, then modules, then the device
//!
//! ## States
//!
//! ```text
//! unconfigured --set_config--> configured --start--> streaming
//!      ^                          ^                     |
//!      |                          +--------stop---------+
//!      +-----------------reset (any state)--------------+
//! ```

mod consumers;
pub mod error;
pub mod pipeline;
mod teardown;

pub use consumers::APP_CONSUMER;
pub use contracts::{ContextMode, ModuleHandle, PipelineCallbacks, PipelineState};
pub use error::{PipelineError, Result};
pub use pipeline::Pipeline;
