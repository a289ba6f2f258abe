//! Pipeline lifecycle state machine
//!
//! Every entry point holds the state lock for its whole duration. Sample
//! delivery never touches it: the device's capture thread only sees the
//! dispatcher.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    ActualModuleConfig, Context, ContextMode, CvModule, Device, DeviceDescriptor, DeviceManager,
    ModuleBinding, ModuleHandle, PipelineCallbacks, PipelineState, SampleSetCallback,
    SupportedModuleConfig, TimeSyncMode,
};
use device::SimulationOptions;
use dispatcher::SampleDispatcher;
use negotiation::NegotiationEngine;
use tracing::{debug, error, info, instrument, warn};

use crate::consumers::build_consumers;
use crate::error::{PipelineError, Result};
use crate::teardown::ordered_teardown;

/// State guarded by the lifecycle lock
///
/// `device_manager` is `Some` and `bindings` is parallel to `modules`
/// exactly when `state` is configured or streaming.
#[derive(Default)]
struct Inner {
    state: PipelineState,
    modules: Vec<Arc<dyn CvModule>>,
    bindings: Vec<ModuleBinding>,
    device_manager: Option<Box<dyn DeviceManager>>,
    requested_time_sync: TimeSyncMode,
}

impl Inner {
    fn transition(&mut self, to: PipelineState) {
        if self.state != to {
            debug!(from = %self.state, to = %to, "State transition");
            observability::record_state_transition(self.state, to);
            self.state = to;
        }
    }

    fn teardown(&mut self, dispatcher: &SampleDispatcher) {
        ordered_teardown(dispatcher, &self.modules, self.device_manager.as_deref_mut());
    }
}

/// Camera pipeline
///
/// Negotiates a configuration between the device and the registered CV
/// modules, then streams sample sets to them and to the application.
pub struct Pipeline {
    context: Box<dyn Context>,
    inner: Mutex<Inner>,
    dispatcher: Arc<SampleDispatcher>,
    engine: NegotiationEngine,
}

impl Pipeline {
    /// Create a pipeline over an existing context
    pub fn new(context: Box<dyn Context>) -> Self {
        Self {
            context,
            inner: Mutex::new(Inner::default()),
            dispatcher: Arc::new(SampleDispatcher::new()),
            engine: NegotiationEngine::new(),
        }
    }

    /// Create a pipeline over the context selected by `mode`
    ///
    /// # Errors
    /// [`PipelineError::ContextCreation`] when a file-backed context cannot
    /// open its file.
    pub fn with_mode(
        mode: &ContextMode,
        devices: Vec<DeviceDescriptor>,
        options: SimulationOptions,
    ) -> Result<Self> {
        let context =
            device::open_context(mode, devices, options).map_err(PipelineError::ContextCreation)?;
        Ok(Self::new(context))
    }

    /// Replace the negotiation engine (enumeration bound)
    pub fn with_engine(mut self, engine: NegotiationEngine) -> Self {
        self.engine = engine;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sample_callback(&self) -> SampleSetCallback {
        let dispatcher = Arc::clone(&self.dispatcher);
        Arc::new(move |sample_set| dispatcher.dispatch(sample_set))
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Register a CV module
    ///
    /// # Errors
    /// - [`PipelineError::InvalidState`] unless unconfigured
    /// - [`PipelineError::Duplicate`] for the same instance or uid
    #[instrument(
        name = "pipeline_register_module",
        skip(self, module),
        fields(uid = module.module_uid())
    )]
    pub fn register_module(&self, module: Arc<dyn CvModule>) -> Result<ModuleHandle> {
        let mut inner = self.lock();
        if inner.state != PipelineState::Unconfigured {
            return Err(PipelineError::invalid_state("register_module", inner.state));
        }

        let module_uid = module.module_uid();
        let duplicate = inner.modules.iter().any(|registered| {
            std::ptr::addr_eq(Arc::as_ptr(registered), Arc::as_ptr(&module))
                || registered.module_uid() == module_uid
        });
        if duplicate {
            return Err(PipelineError::Duplicate { module_uid });
        }

        let handle = ModuleHandle {
            slot: inner.modules.len(),
            module_uid,
        };
        inner.modules.push(module);
        info!(%handle, "Module registered");
        Ok(handle)
    }

    /// Registered module at `index` (registration order)
    pub fn query_cv_module(&self, index: usize) -> Result<Arc<dyn CvModule>> {
        self.lock()
            .modules
            .get(index)
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("module index {index}")))
    }

    pub fn module_count(&self) -> usize {
        self.lock().modules.len()
    }

    /// Committed binding of the module registered under `handle`
    pub fn module_binding(&self, handle: ModuleHandle) -> Result<ModuleBinding> {
        let inner = self.lock();
        inner
            .modules
            .get(handle.slot)
            .filter(|module| module.module_uid() == handle.module_uid)
            .and_then(|_| inner.bindings.get(handle.slot))
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("binding for {handle}")))
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Default configuration at `index`; only index 0 exists
    pub fn query_default_config(&self, index: usize) -> Result<SupportedModuleConfig> {
        if index == 0 {
            Ok(SupportedModuleConfig::hardcoded_default())
        } else {
            Err(PipelineError::not_found(format!("default config index {index}")))
        }
    }

    /// Negotiate and commit a configuration
    ///
    /// A failed renegotiation from configured leaves the pipeline
    /// unconfigured.
    ///
    /// # Errors
    /// - [`PipelineError::InvalidState`] while streaming
    /// - [`PipelineError::InvalidArgument`] for an empty config without modules
    /// - [`PipelineError::NoMatch`] when nothing can be applied
    #[instrument(
        name = "pipeline_set_config",
        skip(self, config),
        fields(device = %config.device_name)
    )]
    pub fn set_config(&self, config: &SupportedModuleConfig) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == PipelineState::Streaming {
            return Err(PipelineError::invalid_state("set_config", inner.state));
        }
        self.configure(&mut inner, config)
    }

    fn configure(&self, inner: &mut Inner, restriction: &SupportedModuleConfig) -> Result<()> {
        if restriction.is_empty() && inner.modules.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "empty configuration and no registered modules".into(),
            ));
        }

        // the previous device must be released before another one is opened
        if inner.device_manager.take().is_some() {
            debug!("Previous device manager released");
        }
        inner.bindings.clear();
        inner.transition(PipelineState::Unconfigured);

        let negotiated = self.engine.negotiate(
            self.context.as_ref(),
            &inner.modules,
            restriction,
            self.sample_callback(),
        )?;

        info!(
            device = %negotiated.device_manager.device().name(),
            attempts = negotiated.attempts,
            "Configuration committed"
        );
        inner.device_manager = Some(negotiated.device_manager);
        inner.bindings = negotiated.bindings;
        inner.requested_time_sync = negotiated.requested_time_sync;
        inner.transition(PipelineState::Configured);
        Ok(())
    }

    /// Configuration the device is running with
    ///
    /// # Errors
    /// - [`PipelineError::InvalidState`] when unconfigured
    /// - [`PipelineError::NotFound`] without a device manager
    pub fn query_current_config(&self) -> Result<ActualModuleConfig> {
        let inner = self.lock();
        if inner.state == PipelineState::Unconfigured {
            return Err(PipelineError::invalid_state("query_current_config", inner.state));
        }
        inner
            .device_manager
            .as_ref()
            .map(|dm| dm.current_config())
            .ok_or_else(|| PipelineError::not_found("device manager"))
    }

    // ========================================================================
    // Streaming
    // ========================================================================

    /// Start streaming, configuring first if needed
    ///
    /// Without registered modules an unconfigured pipeline falls back to the
    /// default configuration.
    ///
    /// # Errors
    /// - [`PipelineError::InvalidState`] while streaming
    /// - configuration errors from [`Pipeline::set_config`]
    /// - [`PipelineError::DeviceFailure`] when the device does not start; the
    ///   pipeline stays configured
    #[instrument(
        name = "pipeline_start",
        skip(self, callbacks),
        fields(has_callbacks = callbacks.is_some())
    )]
    pub fn start(&self, callbacks: Option<Arc<dyn PipelineCallbacks>>) -> Result<()> {
        let mut inner = self.lock();

        match inner.state {
            PipelineState::Streaming => {
                return Err(PipelineError::invalid_state("start", inner.state));
            }
            PipelineState::Unconfigured => {
                let restriction = if inner.modules.is_empty() {
                    SupportedModuleConfig::hardcoded_default()
                } else {
                    SupportedModuleConfig::new()
                };
                if let Err(e) = self.configure(&mut inner, &restriction) {
                    error!(error = %e, "Auto configuration failed");
                    return Err(e);
                }
            }
            PipelineState::Configured => {}
        }

        let inner = &mut *inner;
        let Some(device_manager) = inner.device_manager.as_mut() else {
            return Err(PipelineError::not_found("device manager"));
        };

        let consumers = build_consumers(
            callbacks.as_ref(),
            &device_manager.current_config(),
            inner.requested_time_sync,
            &inner.modules,
            &inner.bindings,
        )?;
        let consumer_count = consumers.len();
        self.dispatcher.replace(consumers);

        if let Err(e) = device_manager.start() {
            error!(error = %e, "Device failed to start");
            self.dispatcher.clear();
            return Err(PipelineError::DeviceFailure(e));
        }

        inner.transition(PipelineState::Streaming);
        info!(consumers = consumer_count, "Streaming started");
        Ok(())
    }

    /// Stop streaming, keeping the configuration
    ///
    /// # Errors
    /// [`PipelineError::InvalidState`] unless streaming
    #[instrument(name = "pipeline_stop", skip(self))]
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state != PipelineState::Streaming {
            return Err(PipelineError::invalid_state("stop", inner.state));
        }

        inner.teardown(&self.dispatcher);
        inner.transition(PipelineState::Configured);
        info!("Streaming stopped");
        Ok(())
    }

    /// Release everything and forget the registered modules
    #[instrument(name = "pipeline_reset", skip(self))]
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.teardown(&self.dispatcher);
        inner.device_manager = None;
        inner.modules.clear();
        inner.bindings.clear();
        inner.requested_time_sync = TimeSyncMode::default();
        inner.transition(PipelineState::Unconfigured);
        info!("Pipeline reset");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Device of the committed device manager
    pub fn device(&self) -> Option<Arc<dyn Device>> {
        self.lock().device_manager.as_ref().map(|dm| dm.device())
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    /// Sample dispatcher (consumer metrics, dispatched count)
    pub fn dispatcher(&self) -> &Arc<SampleDispatcher> {
        &self.dispatcher
    }

    pub fn context(&self) -> &dyn Context {
        self.context.as_ref()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if inner.state == PipelineState::Streaming {
            warn!("Pipeline dropped while streaming");
        }
        inner.teardown(&self.dispatcher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use contracts::{MotionType, StreamType};
    use device::{MockCvModule, ModuleCall, SimulatedContext};

    fn fast() -> SimulationOptions {
        SimulationOptions {
            realtime: false,
            ..Default::default()
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Box::new(SimulatedContext::with_options(
            vec![DeviceDescriptor::with_default_profiles("sim-cam", "0001")],
            fast(),
        )))
    }

    fn color_module(uid: u32) -> Arc<MockCvModule> {
        Arc::new(MockCvModule::new(
            uid,
            vec![SupportedModuleConfig::new().with_stream(StreamType::Color, 640, 480, 0)],
        ))
    }

    fn wait_for(predicate: impl Fn() -> bool) {
        for _ in 0..200 {
            if predicate() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_without_modules_uses_default() {
        let pipeline = pipeline();
        pipeline.start(None).unwrap();

        assert_eq!(pipeline.state(), PipelineState::Streaming);
        let current = pipeline.query_current_config().unwrap();
        assert_eq!(current.device_name, "sim-cam");
        assert_eq!(current.enabled_streams().count(), StreamType::COUNT);
        assert_eq!(current.motion(MotionType::Accel).sample_rate, 250);

        pipeline.stop().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Configured);
    }

    #[test]
    fn test_register_rules() {
        let pipeline = pipeline();
        let module = color_module(1);

        let handle = pipeline.register_module(module.clone()).unwrap();
        assert_eq!(handle, ModuleHandle { slot: 0, module_uid: 1 });

        assert!(matches!(
            pipeline.register_module(module.clone()),
            Err(PipelineError::Duplicate { module_uid: 1 })
        ));
        assert!(matches!(
            pipeline.register_module(color_module(1)),
            Err(PipelineError::Duplicate { .. })
        ));

        pipeline.set_config(&SupportedModuleConfig::new()).unwrap();
        assert!(matches!(
            pipeline.register_module(color_module(2)),
            Err(PipelineError::InvalidState { state: PipelineState::Configured, .. })
        ));
        assert_eq!(pipeline.module_count(), 1);
        assert!(pipeline.query_cv_module(1).is_err());
    }

    #[test]
    fn test_set_config_commits_bindings() {
        let pipeline = pipeline();
        let module = color_module(5);
        let handle = pipeline.register_module(module.clone()).unwrap();

        pipeline.set_config(&SupportedModuleConfig::new()).unwrap();

        let binding = pipeline.module_binding(handle).unwrap();
        assert!(binding.config.stream(StreamType::Color).enabled);
        assert_eq!(binding.config.stream(StreamType::Color).frame_rate, 30);
        assert_eq!(module.applied_config(), Some(binding.config));
        assert_eq!(pipeline.device().unwrap().name(), "sim-cam");
    }

    #[test]
    fn test_empty_config_without_modules() {
        let pipeline = pipeline();
        assert!(matches!(
            pipeline.set_config(&SupportedModuleConfig::new()),
            Err(PipelineError::InvalidArgument(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::Unconfigured);
    }

    #[test]
    fn test_failed_renegotiation_unconfigures() {
        let pipeline = pipeline();
        pipeline
            .set_config(&SupportedModuleConfig::hardcoded_default())
            .unwrap();

        let err = pipeline
            .set_config(&SupportedModuleConfig::hardcoded_default().with_device_name("missing"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoMatch { .. }));
        assert_eq!(pipeline.state(), PipelineState::Unconfigured);
        assert!(pipeline.device().is_none());
    }

    #[test]
    fn test_state_errors() {
        let pipeline = pipeline();
        assert!(matches!(
            pipeline.query_current_config(),
            Err(PipelineError::InvalidState { .. })
        ));
        assert!(matches!(pipeline.stop(), Err(PipelineError::InvalidState { .. })));
        assert!(pipeline.query_default_config(0).is_ok());
        assert!(matches!(
            pipeline.query_default_config(1),
            Err(PipelineError::NotFound(_))
        ));

        pipeline.start(None).unwrap();
        assert!(matches!(pipeline.start(None), Err(PipelineError::InvalidState { .. })));
        assert!(matches!(
            pipeline.set_config(&SupportedModuleConfig::hardcoded_default()),
            Err(PipelineError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_device_start_failure_stays_configured() {
        let pipeline = Pipeline::new(Box::new(SimulatedContext::with_options(
            vec![DeviceDescriptor::with_default_profiles("flaky", "0")],
            SimulationOptions {
                fail_start: vec!["flaky".into()],
                ..fast()
            },
        )));

        let err = pipeline.start(None).unwrap_err();
        assert!(matches!(err, PipelineError::DeviceFailure(_)));
        assert_eq!(pipeline.state(), PipelineState::Configured);
        assert_eq!(pipeline.dispatcher().consumer_count(), 0);
    }

    #[test]
    fn test_stop_then_reset() {
        let pipeline = pipeline();
        let module = color_module(3);
        pipeline.register_module(module.clone()).unwrap();
        pipeline.start(None).unwrap();
        wait_for(|| !module.processed_sequences().is_empty());

        pipeline.stop().unwrap();
        assert!(pipeline.query_current_config().is_ok());
        assert_eq!(module.calls().last(), Some(&ModuleCall::FlushResources));

        pipeline.reset();
        assert_eq!(pipeline.state(), PipelineState::Unconfigured);
        assert_eq!(pipeline.module_count(), 0);
        assert!(matches!(
            pipeline.query_current_config(),
            Err(PipelineError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_drop_flushes_modules() {
        let module = color_module(9);
        {
            let pipeline = pipeline();
            pipeline.register_module(module.clone()).unwrap();
            pipeline.start(None).unwrap();
        }
        assert_eq!(module.calls().last(), Some(&ModuleCall::FlushResources));
    }
}
