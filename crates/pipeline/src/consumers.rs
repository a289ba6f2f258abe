//! Consumer set built on start
//!
//! The app consumer comes first, then one consumer per module in
//! registration order.

use std::sync::Arc;

use contracts::{ActualModuleConfig, CvModule, ModuleBinding, PipelineCallbacks, TimeSyncMode};
use dispatcher::{AsyncConsumer, SampleConsumer, SampleFilter, SampleHandler, SyncConsumer};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Name of the application consumer
pub const APP_CONSUMER: &str = "app";

/// Build the consumers for a committed configuration
///
/// `modules` and `bindings` are parallel, in registration order. No app
/// consumer is created without callbacks.
pub(crate) fn build_consumers(
    callbacks: Option<&Arc<dyn PipelineCallbacks>>,
    pipeline_config: &ActualModuleConfig,
    requested_time_sync: TimeSyncMode,
    modules: &[Arc<dyn CvModule>],
    bindings: &[ModuleBinding],
) -> Result<Vec<Arc<dyn SampleConsumer>>> {
    let mut consumers: Vec<Arc<dyn SampleConsumer>> = Vec::with_capacity(modules.len() + 1);

    if let Some(callbacks) = callbacks {
        let app = Arc::clone(callbacks);
        consumers.push(Arc::new(SyncConsumer::new(
            APP_CONSUMER,
            Some(SampleFilter::new(pipeline_config.clone(), requested_time_sync)),
            Box::new(move |sample_set| {
                app.on_new_sample_set(sample_set);
                Ok(())
            }),
        )));
    }

    for (module, binding) in modules.iter().zip(bindings) {
        let uid = module.module_uid();
        let name = format!("module-{uid}");
        let filter = Some(SampleFilter::new(binding.config.clone(), binding.time_sync_mode));
        let handler = module_handler(Arc::clone(module), callbacks.cloned());

        let consumer: Arc<dyn SampleConsumer> = if binding.async_processing {
            Arc::new(AsyncConsumer::spawn(name, filter, handler).map_err(|e| {
                PipelineError::ModuleFailure {
                    module_uid: uid,
                    message: e.to_string(),
                }
            })?)
        } else {
            Arc::new(SyncConsumer::new(name, filter, handler))
        };
        debug!(
            module_uid = uid,
            async_processing = binding.async_processing,
            "Module consumer created"
        );
        consumers.push(consumer);
    }

    Ok(consumers)
}

/// Push to the module, reporting the outcome to the app
///
/// A module error is handed to `on_error` and returned so the consumer
/// counts it as a failed delivery.
fn module_handler(
    module: Arc<dyn CvModule>,
    callbacks: Option<Arc<dyn PipelineCallbacks>>,
) -> SampleHandler {
    Box::new(move |sample_set| match module.process_sample_set(sample_set) {
        Ok(()) => {
            if let Some(callbacks) = &callbacks {
                callbacks.on_cv_module_process_complete(module.module_uid());
            }
            Ok(())
        }
        Err(e) => {
            if let Some(callbacks) = &callbacks {
                callbacks.on_error(&e);
            }
            Err(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use contracts::{
        ContractError, CorrelatedSampleSet, ModuleUid, StreamType, SupportedModuleConfig,
    };
    use device::MockCvModule;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineCallbacks for Recorder {
        fn on_new_sample_set(&self, sample_set: &CorrelatedSampleSet) {
            self.events.lock().unwrap().push(format!("app:{}", sample_set.sequence));
        }

        fn on_error(&self, error: &ContractError) {
            self.events.lock().unwrap().push(format!("error:{error}"));
        }

        fn on_cv_module_process_complete(&self, module_uid: ModuleUid) {
            self.events.lock().unwrap().push(format!("done:{module_uid}"));
        }
    }

    fn module(uid: ModuleUid) -> Arc<MockCvModule> {
        Arc::new(MockCvModule::new(
            uid,
            vec![SupportedModuleConfig::new().with_stream(StreamType::Color, 640, 480, 30)],
        ))
    }

    fn binding(async_processing: bool) -> ModuleBinding {
        ModuleBinding {
            async_processing,
            ..Default::default()
        }
    }

    #[test]
    fn test_app_consumer_first_then_modules() {
        let callbacks: Arc<dyn PipelineCallbacks> = Arc::new(Recorder::default());
        let modules: Vec<Arc<dyn CvModule>> = vec![module(1), module(2)];
        let consumers = build_consumers(
            Some(&callbacks),
            &ActualModuleConfig::default(),
            TimeSyncMode::SyncNotRequired,
            &modules,
            &[binding(false), binding(true)],
        )
        .unwrap();

        let names: Vec<_> = consumers.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["app", "module-1", "module-2"]);
        for consumer in consumers {
            consumer.shutdown();
        }
    }

    #[test]
    fn test_no_app_consumer_without_callbacks() {
        let modules: Vec<Arc<dyn CvModule>> = vec![module(7)];
        let consumers = build_consumers(
            None,
            &ActualModuleConfig::default(),
            TimeSyncMode::SyncNotRequired,
            &modules,
            &[binding(false)],
        )
        .unwrap();

        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].name(), "module-7");
    }

    #[test]
    fn test_module_handler_reports_outcome() {
        let recorder = Arc::new(Recorder::default());
        let callbacks: Arc<dyn PipelineCallbacks> = recorder.clone();
        let set = CorrelatedSampleSet::new(1, 0.0);

        let ok = module_handler(module(3), Some(callbacks.clone()));
        assert!(ok(&set).is_ok());

        let failing_module = Arc::new(MockCvModule::new(4, vec![]).failing_processing());
        let failing = module_handler(failing_module, Some(callbacks));
        assert!(failing(&set).is_err());

        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0], "done:3");
        assert!(events[1].starts_with("error:"));
    }
}
