//! Playback context
//!
//! Replays a JSON-lines recording through the regular device manager
//! contract. Recorded sample sets are trimmed to the streams the device was
//! opened with; sets left empty are skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use contracts::{
    ActualModuleConfig, CapabilitySource, Context, ContractError, CorrelatedSampleSet, Device,
    DeviceDescriptor, DeviceManager, SampleSetCallback, SupportedModuleConfig,
};
use tracing::{debug, info, instrument};

use crate::capture::{realize, CaptureThread};
use crate::recording::{RecordedSampleSet, RecordingHeader};

/// Recorded device
#[derive(Debug)]
pub struct PlaybackDevice {
    descriptor: DeviceDescriptor,
    sample_sets: Arc<Vec<CorrelatedSampleSet>>,
}

impl PlaybackDevice {
    /// Number of recorded sample sets
    pub fn recorded_sample_sets(&self) -> usize {
        self.sample_sets.len()
    }
}

impl CapabilitySource for PlaybackDevice {
    fn supported_config(&self, index: usize) -> Option<SupportedModuleConfig> {
        self.descriptor.supported_config(index)
    }
}

impl Device for PlaybackDevice {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn serial(&self) -> &str {
        &self.descriptor.serial
    }
}

/// File-backed context
pub struct PlaybackContext {
    devices: Vec<Arc<PlaybackDevice>>,
    path: PathBuf,
    realtime: bool,
}

impl PlaybackContext {
    /// Load a recording
    ///
    /// # Errors
    /// Returns [`ContractError::ContextCreation`] when the file is missing, has
    /// no header or contains a malformed line.
    #[instrument(name = "playback_open", skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path, realtime: bool) -> Result<Self, ContractError> {
        let file = File::open(path).map_err(|e| {
            ContractError::context_creation(format!("cannot open '{}'", path.display()), e)
        })?;
        let mut lines = BufReader::new(file).lines();

        let header_line = lines
            .next()
            .transpose()
            .map_err(|e| ContractError::context_creation("cannot read recording header", e))?
            .ok_or_else(|| ContractError::ContextCreation {
                message: format!("'{}' is empty", path.display()),
                source: None,
            })?;
        let header: RecordingHeader = serde_json::from_str(&header_line)
            .map_err(|e| ContractError::context_creation("malformed recording header", e))?;

        let mut recorded: HashMap<String, Vec<CorrelatedSampleSet>> = HashMap::new();
        for (index, line) in lines.enumerate() {
            let line =
                line.map_err(|e| ContractError::context_creation("cannot read recording", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: RecordedSampleSet = serde_json::from_str(&line).map_err(|e| {
                let message = format!("malformed sample set at line {}", index + 2);
                ContractError::context_creation(message, e)
            })?;
            recorded.entry(record.device).or_default().push(record.sample_set);
        }

        let devices: Vec<Arc<PlaybackDevice>> = header
            .devices
            .into_iter()
            .map(|descriptor| {
                let sample_sets = recorded.remove(&descriptor.name).unwrap_or_default();
                Arc::new(PlaybackDevice {
                    descriptor,
                    sample_sets: Arc::new(sample_sets),
                })
            })
            .collect();

        info!(
            devices = devices.len(),
            sample_sets = devices.iter().map(|d| d.recorded_sample_sets()).sum::<usize>(),
            "Recording loaded"
        );

        Ok(Self {
            devices,
            path: path.to_path_buf(),
            realtime,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Context for PlaybackContext {
    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn device(&self, index: usize) -> Option<Arc<dyn Device>> {
        self.devices
            .get(index)
            .map(|d| d.clone() as Arc<dyn Device>)
    }

    fn create_device_manager(
        &self,
        device: Arc<dyn Device>,
        config: &SupportedModuleConfig,
        callback: SampleSetCallback,
    ) -> Result<Box<dyn DeviceManager>, ContractError> {
        let device = self
            .devices
            .iter()
            .find(|d| d.name() == device.name())
            .cloned()
            .ok_or_else(|| ContractError::DeviceNotFound {
                filter: device.name().to_string(),
            })?;

        let current = device
            .descriptor
            .resolve(config)
            .map_err(|message| ContractError::device_open(device.name(), message))?;

        Ok(Box::new(PlaybackDeviceManager {
            device,
            current,
            callback,
            realtime: self.realtime,
            capture: None,
        }))
    }
}

/// Opened recorded device
pub struct PlaybackDeviceManager {
    device: Arc<PlaybackDevice>,
    current: ActualModuleConfig,
    callback: SampleSetCallback,
    realtime: bool,
    capture: Option<CaptureThread>,
}

impl DeviceManager for PlaybackDeviceManager {
    fn start(&mut self) -> Result<(), ContractError> {
        if self.is_streaming() {
            return Ok(());
        }

        let sample_sets = self.device.sample_sets.clone();
        let config = self.current.clone();
        let callback = self.callback.clone();
        let realtime = self.realtime;

        let thread_name = format!("playback-{}", self.device.name());
        let capture = CaptureThread::spawn(thread_name, move |running| {
            replay(&sample_sets, &config, &callback, &running, realtime)
        })
        .map_err(|e| ContractError::device_streaming(self.device.name(), e.to_string()))?;

        self.capture = Some(capture);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
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

impl Drop for PlaybackDeviceManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn replay(
    sample_sets: &[CorrelatedSampleSet],
    config: &ActualModuleConfig,
    callback: &SampleSetCallback,
    running: &AtomicBool,
    realtime: bool,
) {
    let started = Instant::now();
    let first_timestamp = sample_sets.first().map(|s| s.timestamp_ms).unwrap_or_default();
    let mut replayed = 0usize;

    for recorded in sample_sets {
        if !running.load(Ordering::Relaxed) {
            debug!(replayed, "Playback stopped");
            return;
        }

        let Some(set) = trim_to_config(recorded, config) else {
            continue;
        };

        if realtime {
            let elapsed_secs = (set.timestamp_ms - first_timestamp) / 1000.0;
            let offset = Duration::from_secs_f64(elapsed_secs.max(0.0));
            if let Some(wait) = (started + offset).checked_duration_since(Instant::now()) {
                thread::sleep(wait);
            }
        }

        callback(Arc::new(set));
        replayed += 1;
    }

    info!(replayed, "Playback completed");
}

/// Drop the samples of streams the device was not opened with
fn trim_to_config(
    recorded: &CorrelatedSampleSet,
    config: &ActualModuleConfig,
) -> Option<CorrelatedSampleSet> {
    let mut set = CorrelatedSampleSet::new(recorded.sequence, recorded.timestamp_ms);

    for stream in config.enabled_streams() {
        if let Some(image) = recorded.image(stream) {
            set.set_image(stream, image.clone());
        }
    }
    for motion in config.enabled_motions() {
        if let Some(sample) = recorded.motion(motion) {
            set.set_motion(motion, *sample);
        }
    }

    (set.sample_count() > 0).then_some(set)
}
