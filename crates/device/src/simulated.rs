//! Simulated live devices
//!
//! Each opened device runs a capture thread that emits a correlated sample set
//! per tick of its fastest enabled stream. Slower streams join every n-th set
//! and motion sensors ride along with every set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    ActualModuleConfig, CapabilitySource, Context, ContractError, CorrelatedSampleSet, Device,
    DeviceDescriptor, DeviceManager, ImageSample, MotionSample, MotionType, SampleSetCallback,
    StreamType, SupportedModuleConfig, DEFAULT_FRAME_RATE,
};
use tracing::{debug, info, instrument};

use crate::capture::{realize, CaptureThread};

/// Simulation knobs, including failure injection
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Device names whose open must fail
    pub fail_open: Vec<String>,
    /// Device names whose start must fail
    pub fail_start: Vec<String>,
    /// Stop producing after this many sample sets
    pub max_sample_sets: Option<u64>,
    /// Pace sample sets at the configured rate instead of back to back
    pub realtime: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            fail_open: Vec::new(),
            fail_start: Vec::new(),
            max_sample_sets: None,
            realtime: true,
        }
    }
}

/// Simulated device handle
#[derive(Debug)]
pub struct SimulatedDevice {
    descriptor: DeviceDescriptor,
}

impl SimulatedDevice {
    pub fn new(descriptor: DeviceDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }
}

impl CapabilitySource for SimulatedDevice {
    fn supported_config(&self, index: usize) -> Option<SupportedModuleConfig> {
        self.descriptor.supported_config(index)
    }
}

impl Device for SimulatedDevice {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn serial(&self) -> &str {
        &self.descriptor.serial
    }
}

/// Simulated live context
pub struct SimulatedContext {
    devices: Vec<Arc<SimulatedDevice>>,
    options: SimulationOptions,
}

impl SimulatedContext {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self::with_options(devices, SimulationOptions::default())
    }

    pub fn with_options(devices: Vec<DeviceDescriptor>, options: SimulationOptions) -> Self {
        Self {
            devices: devices
                .into_iter()
                .map(|d| Arc::new(SimulatedDevice::new(d)))
                .collect(),
            options,
        }
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    fn lookup(&self, name: &str) -> Result<&Arc<SimulatedDevice>, ContractError> {
        self.devices
            .iter()
            .find(|d| d.name() == name)
            .ok_or_else(|| ContractError::DeviceNotFound {
                filter: name.to_string(),
            })
    }
}

impl Context for SimulatedContext {
    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn device(&self, index: usize) -> Option<Arc<dyn Device>> {
        self.devices
            .get(index)
            .map(|d| d.clone() as Arc<dyn Device>)
    }

    #[instrument(
        name = "simulated_create_device_manager",
        skip(self, device, config, callback),
        fields(device = %device.name())
    )]
    fn create_device_manager(
        &self,
        device: Arc<dyn Device>,
        config: &SupportedModuleConfig,
        callback: SampleSetCallback,
    ) -> Result<Box<dyn DeviceManager>, ContractError> {
        let device = self.lookup(device.name())?.clone();

        if self.options.fail_open.iter().any(|n| n == device.name()) {
            return Err(ContractError::device_open(device.name(), "mock failure"));
        }

        let current = device
            .descriptor
            .resolve(config)
            .map_err(|message| ContractError::device_open(device.name(), message))?;

        debug!(
            streams = current.enabled_streams().count(),
            motions = current.enabled_motions().count(),
            "Device opened"
        );

        Ok(Box::new(SimulatedDeviceManager {
            device,
            current,
            callback,
            options: self.options.clone(),
            capture: None,
        }))
    }
}

/// Opened simulated device
pub struct SimulatedDeviceManager {
    device: Arc<SimulatedDevice>,
    current: ActualModuleConfig,
    callback: SampleSetCallback,
    options: SimulationOptions,
    capture: Option<CaptureThread>,
}

impl DeviceManager for SimulatedDeviceManager {
    fn start(&mut self) -> Result<(), ContractError> {
        if self.is_streaming() {
            return Ok(());
        }

        if self.options.fail_start.iter().any(|n| n == self.device.name()) {
            return Err(ContractError::device_streaming(
                self.device.name(),
                "mock failure",
            ));
        }

        let config = self.current.clone();
        let callback = self.callback.clone();
        let max_sample_sets = self.options.max_sample_sets;
        let realtime = self.options.realtime;

        let thread_name = format!("capture-{}", self.device.name());
        let capture = CaptureThread::spawn(thread_name, move |running| {
            run_capture(&config, &callback, &running, max_sample_sets, realtime)
        })
        .map_err(|e| ContractError::device_streaming(self.device.name(), e.to_string()))?;

        info!(device = %self.device.name(), "Simulated device streaming");
        self.capture = Some(capture);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
            info!(device = %self.device.name(), "Simulated device stopped");
        }
    }

    fn is_streaming(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureThread::is_running)
    }

    fn current_config(&self) -> ActualModuleConfig {
        self.current.clone()
    }

    fn create_actual_config(&self, config: &SupportedModuleConfig) -> ActualModuleConfig {
        realize(&self.current, config)
    }

    fn device(&self) -> Arc<dyn Device> {
        self.device.clone()
    }
}

impl Drop for SimulatedDeviceManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture(
    config: &ActualModuleConfig,
    callback: &SampleSetCallback,
    running: &AtomicBool,
    max_sample_sets: Option<u64>,
    realtime: bool,
) {
    let base_rate = config
        .enabled_streams()
        .map(|s| config.stream(s).frame_rate)
        .max()
        .filter(|rate| *rate > 0)
        .unwrap_or(DEFAULT_FRAME_RATE);
    let interval = Duration::from_secs_f64(1.0 / f64::from(base_rate));

    // One zeroed frame per stream, shared by every sample
    let frames: Vec<(StreamType, u64, Bytes)> = config
        .enabled_streams()
        .map(|stream| {
            let s = config.stream(stream);
            let divider = u64::from((base_rate / s.frame_rate.max(1)).max(1));
            let size = (s.width as usize) * (s.height as usize);
            (stream, divider, Bytes::from(vec![0u8; size]))
        })
        .collect();

    let mut frame_numbers = [0u64; StreamType::COUNT];
    let started = Instant::now();
    let mut tick: u64 = 0;

    while running.load(Ordering::Relaxed) {
        if max_sample_sets.is_some_and(|max| tick >= max) {
            debug!(sample_sets = tick, "Sample set limit reached");
            break;
        }

        let timestamp_ms = tick as f64 * interval.as_secs_f64() * 1000.0;
        let mut set = CorrelatedSampleSet::new(tick + 1, timestamp_ms);

        for (stream, divider, data) in &frames {
            if tick % divider != 0 {
                continue;
            }
            let s = config.stream(*stream);
            frame_numbers[stream.index()] += 1;
            set.set_image(
                *stream,
                ImageSample {
                    width: s.width,
                    height: s.height,
                    frame_number: frame_numbers[stream.index()],
                    timestamp_ms,
                    data: data.clone(),
                },
            );
        }

        let phase = timestamp_ms / 1000.0;
        for motion in config.enabled_motions() {
            let values = match motion {
                MotionType::Accel => [0.0, 0.0, 9.81],
                MotionType::Gyro => [(phase.sin() * 0.1) as f32, 0.0, 0.0],
            };
            set.set_motion(
                motion,
                MotionSample {
                    timestamp_ms,
                    values,
                },
            );
        }

        callback(Arc::new(set));
        tick += 1;

        if realtime {
            let due = started + interval.mul_f64(tick as f64);
            if let Some(wait) = due.checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
        }
    }
}
