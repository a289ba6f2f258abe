//! SampleConsumer trait - dispatcher output interface

use std::sync::Arc;

use contracts::{ActualModuleConfig, ContractError, CorrelatedSampleSet, TimeSyncMode};

use crate::metrics::ConsumerMetrics;

/// Handler invoked for each relevant sample set
pub type SampleHandler =
    Box<dyn Fn(&CorrelatedSampleSet) -> Result<(), ContractError> + Send + Sync>;

/// Sample set consumer
///
/// All implementations must be callable from the device capture thread.
pub trait SampleConsumer: Send + Sync {
    /// Consumer name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Hand over a sample set
    ///
    /// Must not block on the consumer's own processing.
    fn notify(&self, sample_set: Arc<CorrelatedSampleSet>);

    /// Release resources
    ///
    /// Returns once no delivery is in flight. Later notifications are ignored.
    fn shutdown(&self);

    /// Consumer metrics
    fn metrics(&self) -> &Arc<ConsumerMetrics>;
}

/// Relevance filter bound to a consumer's negotiated config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleFilter {
    pub config: ActualModuleConfig,
    pub time_sync_mode: TimeSyncMode,
}

impl SampleFilter {
    pub fn new(config: ActualModuleConfig, time_sync_mode: TimeSyncMode) -> Self {
        Self {
            config,
            time_sync_mode,
        }
    }

    pub fn accepts(&self, sample_set: &CorrelatedSampleSet) -> bool {
        sample_set.is_relevant_to(&self.config, self.time_sync_mode)
    }
}
