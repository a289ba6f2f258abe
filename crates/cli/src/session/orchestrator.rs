//! Session orchestrator - builds the pipeline from settings and drives one run.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use config_loader::{ModuleSettings, PipelineSettings};
use contracts::{ContextMode, ContractError, CorrelatedSampleSet, ModuleUid, PipelineCallbacks};
use device::{MockCvModule, SimulationOptions};
use observability::DispatchStatsAggregator;
use pipeline::Pipeline;
use tokio::sync::watch;
use tracing::{info, trace, warn};

use super::stats::{ModuleReport, SessionStats};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub settings: PipelineSettings,

    /// Context the pipeline is created over
    pub mode: ContextMode,

    /// Stop after this many sample sets (None = until timeout)
    pub max_sample_sets: Option<u64>,

    pub timeout: Duration,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Application callbacks collecting run statistics
struct AppCallbacks {
    dispatch: Mutex<DispatchStatsAggregator>,
    received: watch::Sender<u64>,
    errors: AtomicU64,
    completions: AtomicU64,
}

impl AppCallbacks {
    fn new(received: watch::Sender<u64>) -> Self {
        Self {
            dispatch: Mutex::new(DispatchStatsAggregator::new()),
            received,
            errors: AtomicU64::new(0),
            completions: AtomicU64::new(0),
        }
    }
}

impl PipelineCallbacks for AppCallbacks {
    fn on_new_sample_set(&self, sample_set: &CorrelatedSampleSet) {
        self.dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(sample_set);
        self.received.send_modify(|count| *count += 1);
        trace!(sequence = sample_set.sequence, "Sample set received");
    }

    fn on_error(&self, error: &ContractError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, "Module processing failed");
    }

    fn on_cv_module_process_complete(&self, module_uid: ModuleUid) {
        self.completions.fetch_add(1, Ordering::Relaxed);
        trace!(module_uid, "Module processing complete");
    }
}

/// One pipeline run
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run until the sample set limit, the timeout or `shutdown`
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<SessionStats> {
        let start_time = Instant::now();
        let settings = &self.config.settings;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let options = SimulationOptions {
            fail_open: settings.fail_open_devices(),
            fail_start: settings.fail_start_devices(),
            max_sample_sets: None,
            realtime: settings.context.realtime,
        };
        let pipeline = Arc::new(
            Pipeline::with_mode(&self.config.mode, settings.device_descriptors(), options)
                .with_context(|| {
                    format!("Failed to create {} context", self.config.mode.as_str())
                })?,
        );

        let modules = build_modules(&settings.modules);
        for module in &modules {
            pipeline
                .register_module(module.clone())
                .with_context(|| format!("Failed to register module {}", module_uid(module)))?;
        }
        info!(modules = modules.len(), "Modules registered");

        if let Some(restriction) = &settings.restriction {
            pipeline
                .set_config(restriction)
                .context("Configuration negotiation failed")?;
        }

        let (received_tx, mut received_rx) = watch::channel(0u64);
        let callbacks = Arc::new(AppCallbacks::new(received_tx));
        pipeline
            .start(Some(callbacks.clone()))
            .context("Failed to start pipeline")?;

        let current = pipeline
            .query_current_config()
            .context("Failed to query current config")?;
        info!(
            device = %current.device_name,
            streams = ?current.enabled_streams().collect::<Vec<_>>(),
            motions = ?current.enabled_motions().collect::<Vec<_>>(),
            max_sample_sets = ?self.config.max_sample_sets,
            "Pipeline streaming"
        );

        let max_sample_sets = self.config.max_sample_sets;
        let limit_reached = async move {
            match max_sample_sets {
                Some(max) => {
                    if received_rx.wait_for(|count| *count >= max).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = limit_reached => info!("Reached sample set limit"),
            _ = tokio::time::sleep(self.config.timeout) => {
                info!(timeout_secs = self.config.timeout.as_secs(), "Run timeout elapsed");
            }
            _ = shutdown => warn!("Received shutdown signal, stopping pipeline..."),
        }

        // consumers are gone after stop
        let consumers = pipeline.dispatcher().snapshots();
        let sample_sets_dispatched = pipeline.dispatcher().dispatched_count();

        info!("Stopping pipeline...");
        let stopper = Arc::clone(&pipeline);
        tokio::task::spawn_blocking(move || stopper.stop())
            .await
            .context("Stop task panicked")?
            .context("Failed to stop pipeline")?;

        let stats = SessionStats {
            device: current.device_name,
            sample_sets_received: *callbacks.received.borrow(),
            sample_sets_dispatched,
            module_errors: callbacks.errors.load(Ordering::Relaxed),
            module_completions: callbacks.completions.load(Ordering::Relaxed),
            duration: start_time.elapsed(),
            consumers,
            modules: modules
                .iter()
                .map(|module| ModuleReport {
                    uid: module_uid(module),
                    processed: module.processed_sequences().len(),
                    flushes: module.flush_count(),
                })
                .collect(),
            dispatch: callbacks
                .dispatch
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            rate = format!("{:.2}", stats.rate()),
            "Session complete"
        );
        Ok(stats)
    }
}

/// Mock modules declared in the settings, in registration order
fn build_modules(settings: &[ModuleSettings]) -> Vec<Arc<MockCvModule>> {
    settings
        .iter()
        .map(|module| {
            let mut mock = MockCvModule::new(module.uid, module.declared_configs());
            if module.reject_configs {
                mock = mock.rejecting_configs();
            }
            if module.fail_processing {
                mock = mock.failing_processing();
            }
            if module.processing_delay_ms > 0 {
                let delay = Duration::from_millis(module.processing_delay_ms);
                mock = mock.with_processing_delay(delay);
            }
            Arc::new(mock)
        })
        .collect()
}

fn module_uid(module: &MockCvModule) -> ModuleUid {
    contracts::CvModule::module_uid(module)
}
