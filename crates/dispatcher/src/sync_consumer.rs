//! SyncConsumer - inline delivery on the producer's thread

use std::sync::{Arc, PoisonError, RwLock};

use contracts::CorrelatedSampleSet;
use tracing::{debug, error, instrument};

use crate::consumer::{SampleConsumer, SampleFilter, SampleHandler};
use crate::metrics::ConsumerMetrics;

/// Consumer invoking its handler inline
///
/// The gate is read-locked for the duration of a delivery; shutdown takes it
/// for writing, so it returns only after the in-flight delivery completes.
pub struct SyncConsumer {
    name: String,
    filter: Option<SampleFilter>,
    handler: SampleHandler,
    /// true while accepting deliveries
    gate: RwLock<bool>,
    metrics: Arc<ConsumerMetrics>,
}

impl SyncConsumer {
    /// `filter = None` accepts every sample set
    pub fn new(
        name: impl Into<String>,
        filter: Option<SampleFilter>,
        handler: SampleHandler,
    ) -> Self {
        Self {
            name: name.into(),
            filter,
            handler,
            gate: RwLock::new(true),
            metrics: Arc::new(ConsumerMetrics::new()),
        }
    }
}

impl SampleConsumer for SyncConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, sample_set: Arc<CorrelatedSampleSet>) {
        let open = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            return;
        }

        if let Some(filter) = &self.filter {
            if !filter.accepts(&sample_set) {
                self.metrics.inc_filtered_count();
                return;
            }
        }

        match (self.handler)(&sample_set) {
            Ok(()) => self.metrics.record_delivery(&self.name, true),
            Err(e) => {
                self.metrics.record_delivery(&self.name, false);
                error!(
                    consumer = %self.name,
                    sequence = sample_set.sequence,
                    error = %e,
                    "Handler failed"
                );
            }
        }
    }

    #[instrument(name = "sync_consumer_shutdown", skip(self), fields(consumer = %self.name))]
    fn shutdown(&self) {
        *self.gate.write().unwrap_or_else(PoisonError::into_inner) = false;
        debug!("SyncConsumer shutdown complete");
    }

    fn metrics(&self) -> &Arc<ConsumerMetrics> {
        &self.metrics
    }
}
