//! CV module and application callback contracts

use std::fmt;

use crate::{
    ActualModuleConfig, ContractError, CorrelatedSampleSet, SupportedModuleConfig, TimeSyncMode,
};

/// CV module identifier
pub type ModuleUid = u32;

/// Source of indexed capability declarations
///
/// Devices and CV modules both expose their supported configurations through
/// this "query configuration at index N" protocol. The order of the
/// declarations encodes the source's preference.
pub trait CapabilitySource {
    /// Get the supported configuration at `index`
    ///
    /// Returns `None` once `index` is past the last declared configuration.
    fn supported_config(&self, index: usize) -> Option<SupportedModuleConfig>;
}

/// Capability-polymorphic processing module
///
/// The pipeline never owns a module's lifetime: it only holds shared
/// references handed over at registration.
pub trait CvModule: CapabilitySource + Send + Sync {
    /// Unique module identifier
    fn module_uid(&self) -> ModuleUid;

    /// Apply the negotiated configuration
    ///
    /// # Errors
    /// Returns [`ContractError::ModuleConfig`] when the module rejects it.
    fn set_module_config(&self, config: &ActualModuleConfig) -> Result<(), ContractError>;

    /// Drop the applied configuration
    fn reset_config(&self);

    /// Release every resource that references device memory
    fn flush_resources(&self);

    /// Process one sample set
    fn process_sample_set(&self, sample_set: &CorrelatedSampleSet) -> Result<(), ContractError>;
}

/// Application callback handler
///
/// Every method has a no-op default.
pub trait PipelineCallbacks: Send + Sync {
    /// New sample set available for the application
    fn on_new_sample_set(&self, sample_set: &CorrelatedSampleSet) {
        let _ = sample_set;
    }

    /// A module failed while processing
    fn on_error(&self, error: &ContractError) {
        let _ = error;
    }

    /// A module finished processing a sample set
    fn on_cv_module_process_complete(&self, module_uid: ModuleUid) {
        let _ = module_uid;
    }
}

/// Stable handle returned by module registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    /// Registration slot (registration order)
    pub slot: usize,

    /// Registered module uid
    pub module_uid: ModuleUid,
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}@{}", self.module_uid, self.slot)
    }
}

/// Negotiated configuration of one registration slot
///
/// Replaced as a whole when a negotiation is committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleBinding {
    pub config: ActualModuleConfig,
    pub async_processing: bool,
    pub time_sync_mode: TimeSyncMode,
}
