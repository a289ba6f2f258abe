//! # Device
//!
//! Concrete collaborators behind the `contracts` device traits.
//!
//! Responsibilities:
//! - Simulated live devices producing correlated sample sets on a capture thread
//! - Playback of JSON-lines recordings
//! - Recording a simulated session to a JSON-lines file
//! - Mock CV module for tests and the CLI
//!
//! ## Context modes
//!
//! [`open_context`] builds the context selected by a [`contracts::ContextMode`].

mod capture;
pub mod factory;
pub mod mock_module;
pub mod playback;
pub mod record;
pub mod recording;
pub mod simulated;

pub use contracts::{ContextMode, DeviceDescriptor};
pub use factory::open_context;
pub use mock_module::{MockCvModule, ModuleCall};
pub use playback::PlaybackContext;
pub use record::RecordContext;
pub use simulated::{SimulatedContext, SimulatedDevice, SimulationOptions};
