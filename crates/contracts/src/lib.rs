//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the pipeline.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Model
//! - Capabilities are declared as [`SupportedModuleConfig`] and realized as
//!   [`ActualModuleConfig`] once a device has been acquired
//! - Samples travel as `Arc<CorrelatedSampleSet>`, shared by every consumer
//! - Devices, device managers and CV modules are reached through traits only

mod device;
mod error;
mod module;
mod module_config;
mod profile;
mod sample;
mod state;
mod stream;

pub use device::*;
pub use error::*;
pub use module::*;
pub use module_config::*;
pub use profile::*;
pub use sample::*;
pub use state::PipelineState;
pub use stream::{MotionType, StreamType};
