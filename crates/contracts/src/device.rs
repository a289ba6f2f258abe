//! Device and context contracts
//!
//! The physical device abstraction is an external collaborator. The pipeline
//! only sees it through these traits:
//!
//! - [`Context`] enumerates devices and opens device managers
//! - [`Device`] is a handle to one enumerated device
//! - [`DeviceManager`] drives one opened device and produces sample sets

use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    ActualModuleConfig, CapabilitySource, ContractError, CorrelatedSampleSet,
    SupportedModuleConfig,
};

/// Sample set callback type
///
/// Invoked on the device's capture thread for every correlated sample set.
pub type SampleSetCallback = Arc<dyn Fn(Arc<CorrelatedSampleSet>) + Send + Sync>;

/// Enumerated device handle
pub trait Device: CapabilitySource + Send + Sync {
    /// Device name (matched against config device filters)
    fn name(&self) -> &str;

    /// Device serial number
    fn serial(&self) -> &str;
}

/// Opened device bound to one superset configuration
pub trait DeviceManager: Send {
    /// Start streaming
    ///
    /// # Errors
    /// Returns [`ContractError::DeviceStreaming`] if the device cannot start.
    fn start(&mut self) -> Result<(), ContractError>;

    /// Stop streaming
    ///
    /// Blocks until the capture thread has delivered its last sample set.
    /// Idempotent.
    fn stop(&mut self);

    /// Whether the capture thread is still producing
    ///
    /// False after `stop` and after a bounded capture has run out.
    fn is_streaming(&self) -> bool;

    /// Currently applied device configuration
    fn current_config(&self) -> ActualModuleConfig;

    /// Realize a supported config against the opened device
    fn create_actual_config(&self, config: &SupportedModuleConfig) -> ActualModuleConfig;

    /// Underlying device handle
    fn device(&self) -> Arc<dyn Device>;
}

/// Device enumeration and acquisition
pub trait Context: Send + Sync {
    /// Number of enumerated devices
    fn device_count(&self) -> usize;

    /// Device at `index`, `None` when out of range
    fn device(&self, index: usize) -> Option<Arc<dyn Device>>;

    /// Open a device manager for `device` configured with `config`
    ///
    /// # Errors
    /// Returns [`ContractError::DeviceOpen`] when the device rejects the config.
    fn create_device_manager(
        &self,
        device: Arc<dyn Device>,
        config: &SupportedModuleConfig,
        callback: SampleSetCallback,
    ) -> Result<Box<dyn DeviceManager>, ContractError>;
}

/// Context construction mode, selected once at pipeline creation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContextMode {
    /// Live devices
    #[default]
    Live,
    /// Replay a recording file
    Playback(PathBuf),
    /// Stream live devices and record them to a file
    Record(PathBuf),
}

impl ContextMode {
    /// Short name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextMode::Live => "live",
            ContextMode::Playback(_) => "playback",
            ContextMode::Record(_) => "record",
        }
    }
}
