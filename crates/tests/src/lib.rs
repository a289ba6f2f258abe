//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 协商引擎与模拟设备的端到端测试
//! - 生命周期状态机的不变量
//! - 分发顺序与有序拆除
//! - 录制 / 回放往返

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use contracts::{
        CorrelatedSampleSet, DeviceDescriptor, PipelineCallbacks, StreamProfile, StreamType,
        SupportedModuleConfig,
    };
    use device::{MockCvModule, SimulatedContext, SimulationOptions};
    use pipeline::Pipeline;

    pub fn fast(max_sample_sets: Option<u64>) -> SimulationOptions {
        SimulationOptions {
            max_sample_sets,
            realtime: false,
            ..Default::default()
        }
    }

    pub fn camera() -> DeviceDescriptor {
        DeviceDescriptor::with_default_profiles("sim-cam", "0001")
    }

    /// Device with a single small color mode
    pub fn tiny_camera(name: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            name: name.to_string(),
            serial: "tiny".to_string(),
            streams: vec![StreamProfile {
                stream: StreamType::Color,
                width: 64,
                height: 48,
                frame_rate: 30,
            }],
            motions: Vec::new(),
        }
    }

    pub fn pipeline_with(devices: Vec<DeviceDescriptor>, options: SimulationOptions) -> Pipeline {
        Pipeline::new(Box::new(SimulatedContext::with_options(devices, options)))
    }

    pub fn color(width: u32, height: u32, fps: u32) -> SupportedModuleConfig {
        SupportedModuleConfig::new().with_stream(StreamType::Color, width, height, fps)
    }

    pub fn module(uid: u32, configs: Vec<SupportedModuleConfig>) -> Arc<MockCvModule> {
        Arc::new(MockCvModule::new(uid, configs))
    }

    pub fn wait_for(predicate: impl Fn() -> bool) -> bool {
        for _ in 0..400 {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        predicate()
    }

    /// Application callbacks recording every sequence number
    #[derive(Default)]
    pub struct Recorder {
        pub sequences: Mutex<Vec<u64>>,
    }

    impl Recorder {
        pub fn seen(&self) -> Vec<u64> {
            self.sequences.lock().unwrap().clone()
        }
    }

    impl PipelineCallbacks for Recorder {
        fn on_new_sample_set(&self, sample_set: &CorrelatedSampleSet) {
            self.sequences.lock().unwrap().push(sample_set.sequence);
        }
    }
}

#[cfg(test)]
mod negotiation_tests {
    use std::sync::Arc;

    use contracts::{CvModule, SampleSetCallback, StreamType, SupportedModuleConfig};
    use device::SimulatedContext;
    use negotiation::{NegotiationEngine, NegotiationError};

    use super::support::*;

    fn noop() -> SampleSetCallback {
        Arc::new(|_| {})
    }

    /// 第一个成功的超集被提交，之后的不再尝试
    #[test]
    fn test_first_succeeding_superset_committed() {
        let context = SimulatedContext::with_options(vec![camera()], fast(None));
        // the device does not offer 1280x720
        let first = module(1, vec![color(1280, 720, 0), color(640, 480, 0), color(640, 480, 30)]);
        let modules: Vec<Arc<dyn CvModule>> = vec![first.clone()];

        let negotiated = NegotiationEngine::new()
            .negotiate(&context, &modules, &SupportedModuleConfig::new(), noop())
            .unwrap();

        assert_eq!(negotiated.attempts, 2);
        let applied = first.applied_config().unwrap();
        assert_eq!(applied.stream(StreamType::Color).width, 640);
        assert_eq!(applied.stream(StreamType::Color).frame_rate, 30);
        assert_eq!(first.calls().len(), 1);
    }

    /// 匹配器优先选择最早声明的配置
    #[test]
    fn test_matcher_prefers_earliest_declared() {
        let context = SimulatedContext::with_options(vec![camera()], fast(None));
        let depth_first = module(
            1,
            vec![
                SupportedModuleConfig::new().with_stream(StreamType::Depth, 640, 480, 0),
                color(640, 480, 0),
            ],
        );
        // the restriction enables both, so both declarations are satisfied
        let restriction = SupportedModuleConfig::new()
            .with_stream(StreamType::Depth, 640, 480, 30)
            .with_stream(StreamType::Color, 640, 480, 30);
        let modules: Vec<Arc<dyn CvModule>> = vec![depth_first.clone()];

        let negotiated = NegotiationEngine::new()
            .negotiate(&context, &modules, &restriction, noop())
            .unwrap();

        assert_eq!(negotiated.attempts, 1);
        let binding = &negotiated.bindings[0].config;
        assert!(binding.stream(StreamType::Depth).enabled);
        assert!(!binding.stream(StreamType::Color).enabled);
    }

    #[test]
    fn test_rejecting_module_rolls_back_earlier_modules() {
        let context = SimulatedContext::with_options(vec![camera()], fast(None));
        let accepting = module(1, vec![color(640, 480, 0)]);
        let rejecting =
            Arc::new(device::MockCvModule::new(2, vec![color(640, 480, 0)]).rejecting_configs());
        let modules: Vec<Arc<dyn CvModule>> = vec![accepting.clone(), rejecting];

        let err = NegotiationEngine::new()
            .negotiate(&context, &modules, &SupportedModuleConfig::new(), noop())
            .unwrap_err();

        assert!(matches!(err, NegotiationError::NoMatch { .. }));
        assert!(accepting.reset_count() >= 1);
        assert!(accepting.applied_config().is_none());
    }

    #[test]
    fn test_enumeration_limit_bounds_search() {
        let context = SimulatedContext::with_options(vec![camera()], fast(None));
        let picky = module(1, vec![color(1280, 720, 0), color(640, 480, 0)]);
        let modules: Vec<Arc<dyn CvModule>> = vec![picky];

        let err = NegotiationEngine::new()
            .with_enumeration_limit(1)
            .negotiate(&context, &modules, &SupportedModuleConfig::new(), noop())
            .unwrap_err();
        assert_eq!(err, NegotiationError::NoMatch { attempts: 1 });
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use std::sync::Arc;

    use contracts::{MotionType, PipelineState, StreamType, SupportedModuleConfig};
    use device::{MockCvModule, ModuleCall};
    use pipeline::PipelineError;

    use super::support::*;

    #[test]
    fn test_start_without_modules_uses_default_config() {
        let pipeline = pipeline_with(vec![camera()], fast(None));
        pipeline.start(None).unwrap();

        let current = pipeline.query_current_config().unwrap();
        let default = pipeline.query_default_config(0).unwrap();
        assert_eq!(current.enabled_streams().count(), default.enabled_streams().count());
        assert!(current.motion(MotionType::Gyro).enabled);
        assert!(matches!(
            pipeline.query_default_config(1),
            Err(PipelineError::NotFound(_))
        ));

        pipeline.stop().unwrap();
    }

    #[test]
    fn test_register_outside_unconfigured_rejected() {
        let pipeline = pipeline_with(vec![camera()], fast(None));
        pipeline.register_module(module(1, vec![color(640, 480, 0)])).unwrap();
        pipeline.set_config(&SupportedModuleConfig::new()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Configured);

        let err = pipeline
            .register_module(module(2, vec![color(640, 480, 0)]))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidState {
                state: PipelineState::Configured,
                ..
            }
        ));
        assert_eq!(pipeline.module_count(), 1);

        pipeline.start(None).unwrap();
        let err = pipeline
            .register_module(module(3, vec![color(640, 480, 0)]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState { .. }));
        assert_eq!(pipeline.module_count(), 1);
        pipeline.stop().unwrap();
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let pipeline = pipeline_with(vec![camera()], fast(None));
        let first = module(7, vec![color(640, 480, 0)]);
        let handle = pipeline.register_module(first.clone()).unwrap();
        assert_eq!(handle.module_uid, 7);

        assert!(matches!(
            pipeline.register_module(first.clone()),
            Err(PipelineError::Duplicate { module_uid: 7 })
        ));
        assert!(matches!(
            pipeline.register_module(module(7, vec![color(640, 480, 0)])),
            Err(PipelineError::Duplicate { module_uid: 7 })
        ));
        assert_eq!(pipeline.module_count(), 1);
        assert_eq!(pipeline.query_cv_module(0).unwrap().module_uid(), 7);
    }

    #[test]
    fn test_stop_keeps_config_reset_clears() {
        let pipeline = pipeline_with(vec![camera()], fast(None));
        let handle = pipeline
            .register_module(module(1, vec![color(640, 480, 0)]))
            .unwrap();
        pipeline.start(None).unwrap();
        let before = pipeline.query_current_config().unwrap();

        pipeline.stop().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Configured);
        assert_eq!(pipeline.query_current_config().unwrap(), before);
        assert!(pipeline.module_binding(handle).is_ok());

        // restart without renegotiating
        pipeline.start(None).unwrap();
        assert_eq!(pipeline.query_current_config().unwrap(), before);
        pipeline.stop().unwrap();

        pipeline.reset();
        assert_eq!(pipeline.state(), PipelineState::Unconfigured);
        assert_eq!(pipeline.module_count(), 0);
        assert!(matches!(
            pipeline.query_current_config(),
            Err(PipelineError::InvalidState { .. })
        ));
        assert!(pipeline.device().is_none());
    }

    #[test]
    fn test_unknown_device_no_match() {
        let pipeline = pipeline_with(vec![camera()], fast(None));
        pipeline
            .register_module(module(1, vec![color(640, 480, 0)]))
            .unwrap();

        let restriction = SupportedModuleConfig::new().with_device_name("ghost");
        assert!(matches!(
            pipeline.set_config(&restriction),
            Err(PipelineError::NoMatch { .. })
        ));
        assert_eq!(pipeline.state(), PipelineState::Unconfigured);
        assert_eq!(pipeline.module_count(), 1);
    }

    #[test]
    fn test_failed_renegotiation_leaves_unconfigured() {
        let pipeline = pipeline_with(vec![camera()], fast(None));
        pipeline
            .register_module(module(1, vec![color(640, 480, 0)]))
            .unwrap();
        pipeline.set_config(&SupportedModuleConfig::new()).unwrap();

        let impossible = SupportedModuleConfig::new().with_stream(StreamType::Color, 1920, 1080, 0);
        assert!(pipeline.set_config(&impossible).is_err());
        assert_eq!(pipeline.state(), PipelineState::Unconfigured);
        assert!(pipeline.device().is_none());
    }

    #[test]
    fn test_device_start_failure_stays_configured() {
        let mut options = fast(None);
        options.fail_start = vec!["sim-cam".into()];
        let pipeline = pipeline_with(vec![camera()], options);

        assert!(matches!(
            pipeline.start(None),
            Err(PipelineError::DeviceFailure(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::Configured);
        assert_eq!(pipeline.dispatcher().consumer_count(), 0);
    }

    #[test]
    fn test_device_open_failure_falls_through_to_named_device() {
        let mut options = fast(None);
        options.fail_open = vec!["broken".into()];
        let pipeline = pipeline_with(
            vec![
                contracts::DeviceDescriptor::with_default_profiles("broken", "1"),
                camera(),
            ],
            options,
        );
        pipeline
            .register_module(module(1, vec![color(640, 480, 0)]))
            .unwrap();

        // an unnamed request lands on the first device, which cannot open
        assert!(matches!(
            pipeline.set_config(&SupportedModuleConfig::new()),
            Err(PipelineError::NoMatch { attempts: 1 })
        ));
        assert_eq!(pipeline.state(), PipelineState::Unconfigured);

        pipeline
            .set_config(&SupportedModuleConfig::new().with_device_name("sim-cam"))
            .unwrap();
        assert_eq!(pipeline.device().unwrap().name(), "sim-cam");
    }

    /// 设备停止后模块不再被调用：刷新之后不应再出现处理调用
    #[test]
    fn test_teardown_never_invokes_module_after_device_stop() {
        let pipeline = pipeline_with(vec![camera()], fast(None));
        let sync_module = module(1, vec![color(640, 480, 0)]);
        let async_module = Arc::new(
            MockCvModule::new(2, vec![color(640, 480, 0).with_async_processing(true)])
                .with_processing_delay(std::time::Duration::from_millis(1)),
        );
        pipeline.register_module(sync_module.clone()).unwrap();
        pipeline.register_module(async_module.clone()).unwrap();

        pipeline.start(None).unwrap();
        assert!(wait_for(|| async_module.processed_sequences().len() >= 5));
        pipeline.stop().unwrap();

        for module in [&sync_module, &async_module] {
            let calls = module.calls();
            let flush = calls
                .iter()
                .position(|c| *c == ModuleCall::FlushResources)
                .expect("flush recorded");
            assert!(calls[flush..]
                .iter()
                .all(|c| !matches!(c, ModuleCall::Process(_))));
        }

        // nothing arrives once stopped
        let processed = sync_module.processed_sequences().len();
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(sync_module.processed_sequences().len(), processed);
    }
}

#[cfg(test)]
mod dispatch_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::CorrelatedSampleSet;
    use dispatcher::{AsyncConsumer, SampleConsumer, SampleDispatcher, SyncConsumer};

    use super::support::*;

    fn recording_handler(log: &Arc<Mutex<Vec<u64>>>) -> dispatcher::SampleHandler {
        let log = log.clone();
        Box::new(move |set: &CorrelatedSampleSet| {
            log.lock().unwrap().push(set.sequence);
            Ok(())
        })
    }

    /// N 个消费者各自按生产顺序恰好观察到每个样本集一次
    #[test]
    fn test_every_consumer_sees_every_set_once_in_order() {
        let dispatcher = SampleDispatcher::new();
        let logs: Vec<Arc<Mutex<Vec<u64>>>> = (0..4).map(|_| Arc::default()).collect();

        let mut consumers: Vec<Arc<dyn SampleConsumer>> = Vec::new();
        for (i, log) in logs.iter().enumerate() {
            if i % 2 == 0 {
                consumers.push(Arc::new(SyncConsumer::new(
                    format!("sync-{i}"),
                    None,
                    recording_handler(log),
                )));
            } else {
                consumers.push(Arc::new(
                    AsyncConsumer::spawn(format!("async-{i}"), None, recording_handler(log))
                        .unwrap(),
                ));
            }
        }
        dispatcher.replace(consumers);

        for sequence in 1..=200u64 {
            dispatcher.dispatch(Arc::new(CorrelatedSampleSet::new(sequence, 0.0)));
        }

        let expected: Vec<u64> = (1..=200).collect();
        assert!(wait_for(|| logs.iter().all(|l| l.lock().unwrap().len() == 200)));
        for log in &logs {
            assert_eq!(*log.lock().unwrap(), expected);
        }
        assert_eq!(dispatcher.dispatched_count(), 200);
        dispatcher.clear();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_consumers_observe_same_order() {
        let pipeline = Arc::new(pipeline_with(vec![camera()], fast(Some(60))));
        let first = module(1, vec![color(640, 480, 0)]);
        let second = Arc::new(device::MockCvModule::new(
            2,
            vec![color(640, 480, 0).with_async_processing(true)],
        ));
        pipeline.register_module(first.clone()).unwrap();
        pipeline.register_module(second.clone()).unwrap();

        let recorder = Arc::new(Recorder::default());
        pipeline.start(Some(recorder.clone())).unwrap();

        let done = tokio::time::timeout(Duration::from_secs(5), async {
            while recorder.seen().len() < 60 || second.processed_sequences().len() < 60 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(done.is_ok(), "sample sets did not arrive in time");

        let stopper = pipeline.clone();
        tokio::task::spawn_blocking(move || stopper.stop())
            .await
            .unwrap()
            .unwrap();

        let expected: Vec<u64> = (1..=60).collect();
        assert_eq!(recorder.seen(), expected);
        assert_eq!(first.processed_sequences(), expected);
        assert_eq!(second.processed_sequences(), expected);
    }

    #[test]
    fn test_failing_module_does_not_block_others() {
        #[derive(Default)]
        struct Errors(Mutex<usize>);
        impl contracts::PipelineCallbacks for Errors {
            fn on_error(&self, _error: &contracts::ContractError) {
                *self.0.lock().unwrap() += 1;
            }
        }

        let pipeline = pipeline_with(vec![camera()], fast(Some(10)));
        let failing = Arc::new(
            device::MockCvModule::new(1, vec![color(640, 480, 0)]).failing_processing(),
        );
        let healthy = module(2, vec![color(640, 480, 0)]);
        pipeline.register_module(failing).unwrap();
        pipeline.register_module(healthy.clone()).unwrap();

        let errors = Arc::new(Errors::default());
        pipeline.start(Some(errors.clone())).unwrap();
        assert!(wait_for(|| healthy.processed_sequences().len() == 10));
        pipeline.stop().unwrap();

        assert_eq!(*errors.0.lock().unwrap(), 10);
    }
}

#[cfg(test)]
mod context_tests {
    use std::sync::Arc;

    use contracts::{ContextMode, PipelineState, StreamType, SupportedModuleConfig};
    use pipeline::{Pipeline, PipelineError};

    use super::support::*;

    fn restriction() -> SupportedModuleConfig {
        SupportedModuleConfig::new().with_stream(StreamType::Color, 64, 48, 30)
    }

    #[test]
    fn test_record_then_playback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");

        {
            let recorder = Arc::new(Recorder::default());
            let pipeline = Pipeline::with_mode(
                &ContextMode::Record(path.clone()),
                vec![tiny_camera("rec-cam")],
                fast(Some(12)),
            )
            .unwrap();
            pipeline.set_config(&restriction()).unwrap();
            pipeline.start(Some(recorder.clone())).unwrap();
            assert!(wait_for(|| recorder.seen().len() == 12));
            pipeline.stop().unwrap();
        }

        let recorder = Arc::new(Recorder::default());
        let playback = Pipeline::with_mode(
            &ContextMode::Playback(path.clone()),
            Vec::new(),
            fast(None),
        )
        .unwrap();
        assert_eq!(playback.context().device_count(), 1);

        let replaying = module(
            1,
            vec![SupportedModuleConfig::new().with_stream(StreamType::Color, 64, 48, 0)],
        );
        playback.register_module(replaying.clone()).unwrap();
        playback.start(Some(recorder.clone())).unwrap();
        assert_eq!(playback.device().unwrap().name(), "rec-cam");

        assert!(wait_for(|| recorder.seen().len() == 12));
        playback.stop().unwrap();
        assert_eq!(recorder.seen(), (1..=12).collect::<Vec<u64>>());
        assert_eq!(replaying.processed_sequences().len(), 12);
        assert_eq!(playback.state(), PipelineState::Configured);
    }

    #[test]
    fn test_missing_playback_file_fails_context_creation() {
        let dir = tempfile::tempdir().unwrap();
        let result = Pipeline::with_mode(
            &ContextMode::Playback(dir.path().join("missing.jsonl")),
            Vec::new(),
            fast(None),
        );
        assert!(matches!(result, Err(PipelineError::ContextCreation(_))));
    }
}

#[cfg(test)]
mod config_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContextMode, PipelineState, StreamType};
    use device::MockCvModule;
    use pipeline::Pipeline;

    use super::support::*;

    const SETTINGS: &str = r#"
[context]
realtime = false

[[devices]]
name = "cam-a"

[[devices]]
name = "cam-b"

[restriction]
device_name = "cam-b"

[[modules]]
uid = 10
[[modules.configs]]
[modules.configs.image_streams.depth]
enabled = true
width = 640
height = 480
"#;

    /// 配置文件驱动的完整流程：加载、构建、协商、启动、停止
    #[test]
    fn test_settings_drive_pipeline() {
        let settings = ConfigLoader::load_from_str(SETTINGS, ConfigFormat::Toml).unwrap();
        let mode = settings.context.context_mode().unwrap();
        assert_eq!(mode, ContextMode::Live);

        let pipeline =
            Pipeline::with_mode(&mode, settings.device_descriptors(), fast(Some(5))).unwrap();
        for module in &settings.modules {
            pipeline
                .register_module(Arc::new(MockCvModule::new(module.uid, module.declared_configs())))
                .unwrap();
        }
        pipeline
            .set_config(settings.restriction.as_ref().unwrap())
            .unwrap();

        let current = pipeline.query_current_config().unwrap();
        assert_eq!(current.device_name, "cam-b");
        assert!(current.stream(StreamType::Depth).enabled);

        pipeline.start(None).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Streaming);
        pipeline.stop().unwrap();
    }
}
