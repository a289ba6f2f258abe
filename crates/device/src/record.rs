//! Record context
//!
//! Streams simulated devices and appends every sample set to a JSON-lines
//! file readable by [`crate::PlaybackContext`].

use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{
    Context, ContractError, Device, DeviceDescriptor, DeviceManager, SampleSetCallback,
    SupportedModuleConfig,
};
use tracing::{info, warn};

use crate::recording::{RecordedSampleSetRef, RecordingHeader, RECORDING_VERSION};
use crate::simulated::{SimulatedContext, SimulationOptions};

type SharedWriter = Arc<Mutex<LineWriter<File>>>;

/// Recording wrapper around a [`SimulatedContext`]
pub struct RecordContext {
    inner: SimulatedContext,
    writer: SharedWriter,
    path: PathBuf,
}

impl RecordContext {
    /// Create the recording file and write its header
    ///
    /// # Errors
    /// Returns [`ContractError::ContextCreation`] if the file cannot be written.
    pub fn create(
        path: &Path,
        devices: Vec<DeviceDescriptor>,
        options: SimulationOptions,
    ) -> Result<Self, ContractError> {
        let file = File::create(path).map_err(|e| {
            ContractError::context_creation(format!("cannot create '{}'", path.display()), e)
        })?;
        let mut writer = LineWriter::new(file);

        let header = RecordingHeader {
            version: RECORDING_VERSION,
            devices: devices.clone(),
        };
        let line = serde_json::to_string(&header)
            .map_err(|e| ContractError::context_creation("cannot encode recording header", e))?;
        writeln!(writer, "{line}").map_err(|e| {
            ContractError::context_creation(format!("cannot write '{}'", path.display()), e)
        })?;

        info!(path = %path.display(), devices = devices.len(), "Recording context created");

        Ok(Self {
            inner: SimulatedContext::with_options(devices, options),
            writer: Arc::new(Mutex::new(writer)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Context for RecordContext {
    fn device_count(&self) -> usize {
        self.inner.device_count()
    }

    fn device(&self, index: usize) -> Option<Arc<dyn Device>> {
        self.inner.device(index)
    }

    fn create_device_manager(
        &self,
        device: Arc<dyn Device>,
        config: &SupportedModuleConfig,
        callback: SampleSetCallback,
    ) -> Result<Box<dyn DeviceManager>, ContractError> {
        let writer = self.writer.clone();
        let device_name = device.name().to_string();

        let recording: SampleSetCallback = Arc::new(move |sample_set| {
            let line = RecordedSampleSetRef {
                device: &device_name,
                sample_set: &sample_set,
            };
            match serde_json::to_string(&line) {
                Ok(json) => {
                    let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Err(e) = writeln!(writer, "{json}") {
                        warn!(error = %e, "Failed to append sample set to recording");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode sample set"),
            }
            callback(sample_set);
        });

        self.inner.create_device_manager(device, config, recording)
    }
}
