//! AsyncConsumer - queue drained by a dedicated worker thread
//!
//! The queue is unbounded by default so every sample set reaches the
//! worker in producer order. A bounded queue is opt-in and drops the sets
//! that arrive while it is full.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use async_channel::{Receiver, Sender, TrySendError};
use contracts::CorrelatedSampleSet;
use tracing::{debug, error, instrument, trace, warn};

use crate::consumer::{SampleConsumer, SampleFilter, SampleHandler};
use crate::error::DispatcherError;
use crate::metrics::ConsumerMetrics;

type SampleQueue = (Sender<Arc<CorrelatedSampleSet>>, Receiver<Arc<CorrelatedSampleSet>>);

/// Consumer with an isolated queue and worker thread
pub struct AsyncConsumer {
    name: String,
    filter: Option<SampleFilter>,
    tx: Sender<Arc<CorrelatedSampleSet>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<ConsumerMetrics>,
}

impl AsyncConsumer {
    /// Create a lossless consumer and spawn its worker
    ///
    /// # Errors
    /// Returns [`DispatcherError::WorkerSpawn`] if the thread cannot start.
    pub fn spawn(
        name: impl Into<String>,
        filter: Option<SampleFilter>,
        handler: SampleHandler,
    ) -> Result<Self, DispatcherError> {
        Self::start(name.into(), filter, handler, async_channel::unbounded())
    }

    /// Create a consumer whose queue holds at most `queue_capacity` sets
    ///
    /// Sets arriving while the queue is full are dropped and counted.
    ///
    /// # Errors
    /// Returns [`DispatcherError::WorkerSpawn`] if the thread cannot start.
    pub fn spawn_bounded(
        name: impl Into<String>,
        filter: Option<SampleFilter>,
        handler: SampleHandler,
        queue_capacity: usize,
    ) -> Result<Self, DispatcherError> {
        Self::start(
            name.into(),
            filter,
            handler,
            async_channel::bounded(queue_capacity.max(1)),
        )
    }

    fn start(
        name: String,
        filter: Option<SampleFilter>,
        handler: SampleHandler,
        (tx, rx): SampleQueue,
    ) -> Result<Self, DispatcherError> {
        let metrics = Arc::new(ConsumerMetrics::new());
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let metrics = Arc::clone(&metrics);
            let running = Arc::clone(&running);
            let worker_name = name.clone();
            thread::Builder::new()
                .name(format!("consumer-{name}"))
                .spawn(move || consumer_worker(rx, handler, metrics, running, worker_name))
                .map_err(|e| DispatcherError::worker_spawn(&name, e))?
        };

        Ok(Self {
            name,
            filter,
            tx,
            running,
            worker: Mutex::new(Some(worker)),
            metrics,
        })
    }

    /// Enqueue without blocking
    ///
    /// # Errors
    /// - [`DispatcherError::QueueFull`] when a bounded queue is at capacity
    /// - [`DispatcherError::Closed`] after shutdown
    pub fn try_enqueue(&self, sample_set: Arc<CorrelatedSampleSet>) -> Result<(), DispatcherError> {
        match self.tx.try_send(sample_set) {
            Ok(()) => {
                self.metrics.set_queue_len(self.tx.len());
                Ok(())
            }
            Err(TrySendError::Full(set)) => Err(DispatcherError::QueueFull {
                consumer: self.name.clone(),
                sequence: set.sequence,
            }),
            Err(TrySendError::Closed(_)) => Err(DispatcherError::Closed(self.name.clone())),
        }
    }
}

impl SampleConsumer for AsyncConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, sample_set: Arc<CorrelatedSampleSet>) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        if let Some(filter) = &self.filter {
            if !filter.accepts(&sample_set) {
                self.metrics.inc_filtered_count();
                return;
            }
        }

        match self.try_enqueue(sample_set) {
            Ok(()) => {}
            Err(e @ DispatcherError::QueueFull { .. }) => {
                self.metrics.inc_dropped_count();
                observability::record_consumer_dropped(&self.name);
                trace!(error = %e, "Sample set dropped");
            }
            Err(e) => warn!(error = %e, "Notify after shutdown"),
        }
    }

    #[instrument(name = "async_consumer_shutdown", skip(self), fields(consumer = %self.name))]
    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.tx.close();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!(consumer = %self.name, "Worker thread panicked");
            }
        }
        self.metrics.set_queue_len(0);
        debug!("AsyncConsumer shutdown complete");
    }

    fn metrics(&self) -> &Arc<ConsumerMetrics> {
        &self.metrics
    }
}

impl Drop for AsyncConsumer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker loop; queued sets are discarded once shutdown begins
fn consumer_worker(
    rx: Receiver<Arc<CorrelatedSampleSet>>,
    handler: SampleHandler,
    metrics: Arc<ConsumerMetrics>,
    running: Arc<AtomicBool>,
    name: String,
) {
    debug!(consumer = %name, "Consumer worker started");

    while let Ok(sample_set) = rx.recv_blocking() {
        if !running.load(Ordering::Acquire) {
            break;
        }
        metrics.set_queue_len(rx.len());

        match handler(&sample_set) {
            Ok(()) => metrics.record_delivery(&name, true),
            Err(e) => {
                metrics.record_delivery(&name, false);
                error!(
                    consumer = %name,
                    sequence = sample_set.sequence,
                    error = %e,
                    "Handler failed"
                );
            }
        }
    }

    debug!(consumer = %name, "Consumer worker stopped");
}
