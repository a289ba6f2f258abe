//! Pipeline settings file model

use std::path::PathBuf;

use contracts::{
    ContextMode, DeviceDescriptor, ModuleUid, MotionProfile, StreamProfile, SupportedModuleConfig,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Context kind selected in `[context]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    #[default]
    Live,
    Playback,
    Record,
}

/// `[context]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ContextSettings {
    #[serde(default)]
    pub mode: ContextKind,

    /// Recording file, required by playback and record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Pace simulated and replayed sample sets in real time
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            mode: ContextKind::default(),
            path: None,
            realtime: default_realtime(),
        }
    }
}

impl ContextSettings {
    /// Context mode, `None` when a file-backed mode has no path
    pub fn context_mode(&self) -> Option<ContextMode> {
        match (self.mode, &self.path) {
            (ContextKind::Live, _) => Some(ContextMode::Live),
            (ContextKind::Playback, Some(path)) => Some(ContextMode::Playback(path.clone())),
            (ContextKind::Record, Some(path)) => Some(ContextMode::Record(path.clone())),
            _ => None,
        }
    }
}

/// `[[devices]]` simulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DeviceSettings {
    #[validate(length(min = 1, message = "device name cannot be empty"))]
    pub name: String,

    #[serde(default)]
    pub serial: String,

    /// Empty stream and motion lists mean the default profiles
    #[serde(default)]
    pub streams: Vec<StreamProfile>,

    #[serde(default)]
    pub motions: Vec<MotionProfile>,

    /// Refuse to open
    #[serde(default)]
    pub fail_open: bool,

    /// Open but refuse to stream
    #[serde(default)]
    pub fail_start: bool,
}

impl DeviceSettings {
    pub fn to_descriptor(&self) -> DeviceDescriptor {
        if self.streams.is_empty() && self.motions.is_empty() {
            return DeviceDescriptor::with_default_profiles(&self.name, &self.serial);
        }
        DeviceDescriptor {
            name: self.name.clone(),
            serial: self.serial.clone(),
            streams: self.streams.clone(),
            motions: self.motions.clone(),
        }
    }
}

/// `[[modules]]` mock CV module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ModuleSettings {
    pub uid: ModuleUid,

    /// Declared configs in preference order
    #[validate(length(min = 1, message = "a module must declare at least one config"))]
    pub configs: Vec<SupportedModuleConfig>,

    /// Overrides `async_processing` of every declared config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_processing: Option<bool>,

    /// Reject every applied config
    #[serde(default)]
    pub reject_configs: bool,

    /// Fail every processed sample set
    #[serde(default)]
    pub fail_processing: bool,

    /// Simulated processing time per sample set
    #[serde(default)]
    #[validate(range(max = 10_000, message = "processing_delay_ms must be <= 10000"))]
    pub processing_delay_ms: u64,
}

impl ModuleSettings {
    /// Declared configs with the async override applied
    pub fn declared_configs(&self) -> Vec<SupportedModuleConfig> {
        self.configs
            .iter()
            .cloned()
            .map(|config| match self.async_processing {
                Some(async_processing) => config.with_async_processing(async_processing),
                None => config,
            })
            .collect()
    }
}

/// `[run]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RunSettings {
    /// Stop after this many sample sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "max_sample_sets must be >= 1"))]
    pub max_sample_sets: Option<u64>,

    /// Stop after this many seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 86_400, message = "timeout_secs must be in 1..=86400"))]
    pub timeout_secs: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_sample_sets: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Root of a settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PipelineSettings {
    #[serde(default)]
    #[validate(nested)]
    pub context: ContextSettings,

    #[serde(default)]
    #[validate(nested)]
    pub devices: Vec<DeviceSettings>,

    /// Caller restriction passed to `set_config`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction: Option<SupportedModuleConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub modules: Vec<ModuleSettings>,

    #[serde(default)]
    #[validate(nested)]
    pub run: RunSettings,
}

impl PipelineSettings {
    pub fn device_descriptors(&self) -> Vec<DeviceDescriptor> {
        self.devices.iter().map(DeviceSettings::to_descriptor).collect()
    }

    /// Names of devices with `fail_open` set
    pub fn fail_open_devices(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|d| d.fail_open)
            .map(|d| d.name.clone())
            .collect()
    }

    /// Names of devices with `fail_start` set
    pub fn fail_start_devices(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|d| d.fail_start)
            .map(|d| d.name.clone())
            .collect()
    }
}

fn default_realtime() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults_to_realtime_live() {
        let context = ContextSettings::default();
        assert_eq!(context.mode, ContextKind::Live);
        assert!(context.realtime);
        assert_eq!(context.context_mode(), Some(ContextMode::Live));

        assert!(PipelineSettings::default().context.realtime);
    }

    #[test]
    fn test_context_table_without_realtime_key() {
        let settings: PipelineSettings = toml::from_str("[context]\nmode = \"live\"\n").unwrap();
        assert!(settings.context.realtime);
    }
}
