//! Device descriptors
//!
//! Static description of what a device can stream. Shared by the simulated
//! and file-backed contexts and by the configuration loader.

use serde::{Deserialize, Serialize};

use crate::{
    ActualModuleConfig, ActualMotionConfig, ActualStreamConfig, MotionType, StreamType,
    SupportedModuleConfig, SupportedMotionConfig, SupportedStreamConfig, DEFAULT_ACCEL_SAMPLE_RATE,
    DEFAULT_FRAME_RATE, DEFAULT_GYRO_SAMPLE_RATE, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};

/// One streamable image mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProfile {
    pub stream: StreamType,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

/// One motion sensor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionProfile {
    pub motion: MotionType,
    pub sample_rate: u32,
}

/// Device description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,

    #[serde(default)]
    pub serial: String,

    /// Stream modes in preference order
    #[serde(default)]
    pub streams: Vec<StreamProfile>,

    #[serde(default)]
    pub motions: Vec<MotionProfile>,
}

impl DeviceDescriptor {
    /// Descriptor carrying only the profiles needed by the fallback configuration
    pub fn with_default_profiles(name: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serial: serial.into(),
            streams: StreamType::ALL
                .into_iter()
                .map(|stream| StreamProfile {
                    stream,
                    width: DEFAULT_WIDTH,
                    height: DEFAULT_HEIGHT,
                    frame_rate: DEFAULT_FRAME_RATE,
                })
                .collect(),
            motions: vec![
                MotionProfile {
                    motion: MotionType::Accel,
                    sample_rate: DEFAULT_ACCEL_SAMPLE_RATE,
                },
                MotionProfile {
                    motion: MotionType::Gyro,
                    sample_rate: DEFAULT_GYRO_SAMPLE_RATE,
                },
            ],
        }
    }

    /// Capability declaration at `index`
    ///
    /// Stream profiles come first, one per index, followed by the motion
    /// profiles.
    pub fn supported_config(&self, index: usize) -> Option<SupportedModuleConfig> {
        let mut config = SupportedModuleConfig::new().with_device_name(self.name.clone());
        if let Some(profile) = self.streams.get(index) {
            *config.stream_mut(profile.stream) =
                SupportedStreamConfig::new(profile.width, profile.height, profile.frame_rate);
            return Some(config);
        }
        let profile = self.motions.get(index - self.streams.len())?;
        *config.motion_mut(profile.motion) = SupportedMotionConfig {
            enabled: true,
            sample_rate: profile.sample_rate,
        };
        Some(config)
    }

    /// Resolve `config` against the device profiles
    ///
    /// Every enabled stream must map onto a profile with the same resolution
    /// and a compatible frame rate; wildcard rates take the first matching
    /// profile's rate.
    ///
    /// # Errors
    /// Returns a description of the first unsupported stream or sensor.
    pub fn resolve(&self, config: &SupportedModuleConfig) -> Result<ActualModuleConfig, String> {
        let mut actual = ActualModuleConfig {
            device_name: self.name.clone(),
            ..Default::default()
        };

        for stream in config.enabled_streams() {
            let requested = config.stream(stream);
            let profile = self
                .streams
                .iter()
                .find(|p| {
                    p.stream == stream
                        && p.width == requested.width
                        && p.height == requested.height
                        && (requested.frame_rate == 0 || p.frame_rate == requested.frame_rate)
                })
                .ok_or_else(|| {
                    format!(
                        "{} {}x{}@{} is not supported",
                        stream, requested.width, requested.height, requested.frame_rate
                    )
                })?;

            actual.image_streams[stream.index()] = ActualStreamConfig {
                enabled: true,
                width: profile.width,
                height: profile.height,
                frame_rate: profile.frame_rate,
            };
        }

        for motion in config.enabled_motions() {
            let requested = config.motion(motion);
            let profile = self
                .motions
                .iter()
                .find(|p| {
                    p.motion == motion
                        && (requested.sample_rate == 0 || p.sample_rate == requested.sample_rate)
                })
                .ok_or_else(|| format!("{}@{}Hz is not supported", motion, requested.sample_rate))?;

            actual.motion_sensors[motion.index()] = ActualMotionConfig {
                enabled: true,
                sample_rate: profile.sample_rate,
            };
        }

        Ok(actual)
    }
}
