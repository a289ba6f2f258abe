//! SampleDispatcher - fan-out of sample sets to registered consumers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use contracts::CorrelatedSampleSet;
use tracing::{debug, info, instrument, trace};

use crate::consumer::SampleConsumer;
use crate::metrics::MetricsSnapshot;

/// Fan-out point between the device capture thread and consumers
///
/// `dispatch` copies the consumer list under a read lock and notifies outside
/// it, so a slow consumer never holds the lock that `replace`/`clear` need.
#[derive(Default)]
pub struct SampleDispatcher {
    consumers: RwLock<Vec<Arc<dyn SampleConsumer>>>,
    dispatched: AtomicU64,
}

impl SampleDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one sample set to every consumer
    pub fn dispatch(&self, sample_set: Arc<CorrelatedSampleSet>) {
        let consumers = self
            .consumers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if consumers.is_empty() {
            trace!(sequence = sample_set.sequence, "No consumers, sample set ignored");
            return;
        }

        for consumer in &consumers {
            consumer.notify(Arc::clone(&sample_set));
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        observability::record_sample_set_dispatched(consumers.len());
    }

    /// Install a new consumer list, shutting down the previous one
    #[instrument(
        name = "dispatcher_replace",
        skip(self, consumers),
        fields(count = consumers.len())
    )]
    pub fn replace(&self, consumers: Vec<Arc<dyn SampleConsumer>>) {
        let previous = std::mem::replace(
            &mut *self.consumers.write().unwrap_or_else(PoisonError::into_inner),
            consumers,
        );
        shutdown_all(previous);
        debug!("Consumer list replaced");
    }

    /// Remove and shut down every consumer, in registration order
    ///
    /// On return no delivery is in flight and later dispatches are no-ops.
    #[instrument(name = "dispatcher_clear", skip(self))]
    pub fn clear(&self) {
        let previous =
            std::mem::take(&mut *self.consumers.write().unwrap_or_else(PoisonError::into_inner));
        let count = previous.len();
        shutdown_all(previous);
        if count > 0 {
            info!(count, "Consumers shut down");
        }
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sample sets delivered to at least one consumer
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Per-consumer metric snapshots
    pub fn snapshots(&self) -> Vec<(String, MetricsSnapshot)> {
        self.consumers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| (c.name().to_string(), c.metrics().snapshot()))
            .collect()
    }
}

fn shutdown_all(consumers: Vec<Arc<dyn SampleConsumer>>) {
    for consumer in consumers {
        consumer.shutdown();
    }
}
