//! Module configurations
//!
//! [`SupportedModuleConfig`] is the declarative capability descriptor produced by
//! devices and CV modules. [`ActualModuleConfig`] is its concrete, device-bound
//! realization, created by a device manager once a device has been acquired.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{MotionType, StreamType};

/// Default resolution used by the fallback configuration
pub const DEFAULT_WIDTH: u32 = 640;
/// Default resolution used by the fallback configuration
pub const DEFAULT_HEIGHT: u32 = 480;
/// Default image frame rate used by the fallback configuration
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// Default accelerometer sample rate (Hz)
pub const DEFAULT_ACCEL_SAMPLE_RATE: u32 = 250;
/// Default gyroscope sample rate (Hz)
pub const DEFAULT_GYRO_SAMPLE_RATE: u32 = 200;

/// Time synchronization requirement of a consumer
///
/// Variants are ordered by strictness.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeSyncMode {
    /// Samples are delivered as they arrive
    #[default]
    SyncNotRequired,
    /// Any subset of the enabled streams forms a sample set
    SyncAny,
    /// Every enabled image stream must be present in a sample set
    SyncAll,
}

/// Supported image stream entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportedStreamConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    /// Frames per second, 0 accepts any rate
    pub frame_rate: u32,
}

impl SupportedStreamConfig {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            enabled: true,
            width,
            height,
            frame_rate,
        }
    }
}

/// Supported motion sensor entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportedMotionConfig {
    pub enabled: bool,
    /// Samples per second, 0 accepts any rate
    pub sample_rate: u32,
}

/// Capability descriptor
///
/// An empty `device_name` accepts any device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportedModuleConfig {
    pub device_name: String,

    #[serde(with = "kind_map")]
    pub image_streams: [SupportedStreamConfig; StreamType::COUNT],

    #[serde(with = "kind_map")]
    pub motion_sensors: [SupportedMotionConfig; MotionType::COUNT],

    pub time_sync_mode: TimeSyncMode,

    pub async_processing: bool,
}

impl SupportedModuleConfig {
    /// Create an empty config (no device filter, nothing enabled)
    pub fn new() -> Self {
        Self::default()
    }

    /// The fallback configuration used when nothing else constrains the device
    ///
    /// depth/color/infrared/infrared2/fisheye at 640x480@30, accel@250Hz,
    /// gyro@200Hz, no forced time sync.
    pub fn hardcoded_default() -> Self {
        let mut config = Self::new();
        for stream in StreamType::ALL {
            config.image_streams[stream.index()] =
                SupportedStreamConfig::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_FRAME_RATE);
        }
        config.motion_sensors[MotionType::Accel.index()] = SupportedMotionConfig {
            enabled: true,
            sample_rate: DEFAULT_ACCEL_SAMPLE_RATE,
        };
        config.motion_sensors[MotionType::Gyro.index()] = SupportedMotionConfig {
            enabled: true,
            sample_rate: DEFAULT_GYRO_SAMPLE_RATE,
        };
        config
    }

    /// True when the config carries no device filter and enables nothing
    pub fn is_empty(&self) -> bool {
        self.device_name.is_empty() && !self.has_enabled_sensors()
    }

    /// True when at least one stream or motion sensor is enabled
    pub fn has_enabled_sensors(&self) -> bool {
        self.image_streams.iter().any(|s| s.enabled)
            || self.motion_sensors.iter().any(|m| m.enabled)
    }

    pub fn stream(&self, stream: StreamType) -> &SupportedStreamConfig {
        &self.image_streams[stream.index()]
    }

    pub fn stream_mut(&mut self, stream: StreamType) -> &mut SupportedStreamConfig {
        &mut self.image_streams[stream.index()]
    }

    pub fn motion(&self, motion: MotionType) -> &SupportedMotionConfig {
        &self.motion_sensors[motion.index()]
    }

    pub fn motion_mut(&mut self, motion: MotionType) -> &mut SupportedMotionConfig {
        &mut self.motion_sensors[motion.index()]
    }

    /// Enabled stream kinds, in index order
    pub fn enabled_streams(&self) -> impl Iterator<Item = StreamType> + '_ {
        StreamType::ALL
            .into_iter()
            .filter(move |s| self.stream(*s).enabled)
    }

    /// Enabled motion sensor kinds, in index order
    pub fn enabled_motions(&self) -> impl Iterator<Item = MotionType> + '_ {
        MotionType::ALL
            .into_iter()
            .filter(move |m| self.motion(*m).enabled)
    }

    // ===== Builders =====

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_stream(mut self, stream: StreamType, width: u32, height: u32, fps: u32) -> Self {
        *self.stream_mut(stream) = SupportedStreamConfig::new(width, height, fps);
        self
    }

    pub fn with_motion(mut self, motion: MotionType, sample_rate: u32) -> Self {
        *self.motion_mut(motion) = SupportedMotionConfig {
            enabled: true,
            sample_rate,
        };
        self
    }

    pub fn with_time_sync(mut self, mode: TimeSyncMode) -> Self {
        self.time_sync_mode = mode;
        self
    }

    pub fn with_async_processing(mut self, async_processing: bool) -> Self {
        self.async_processing = async_processing;
        self
    }
}

/// Concrete image stream parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActualStreamConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

/// Concrete motion sensor parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActualMotionConfig {
    pub enabled: bool,
    pub sample_rate: u32,
}

/// Device-bound configuration without wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActualModuleConfig {
    pub device_name: String,

    #[serde(with = "kind_map")]
    pub image_streams: [ActualStreamConfig; StreamType::COUNT],

    #[serde(with = "kind_map")]
    pub motion_sensors: [ActualMotionConfig; MotionType::COUNT],
}

impl ActualModuleConfig {
    pub fn stream(&self, stream: StreamType) -> &ActualStreamConfig {
        &self.image_streams[stream.index()]
    }

    pub fn motion(&self, motion: MotionType) -> &ActualMotionConfig {
        &self.motion_sensors[motion.index()]
    }

    pub fn enabled_streams(&self) -> impl Iterator<Item = StreamType> + '_ {
        StreamType::ALL
            .into_iter()
            .filter(move |s| self.stream(*s).enabled)
    }

    pub fn enabled_motions(&self) -> impl Iterator<Item = MotionType> + '_ {
        MotionType::ALL
            .into_iter()
            .filter(move |m| self.motion(*m).enabled)
    }
}

// ===== Serde helpers =====

/// Kinds that index a fixed-size array
pub trait IndexedKind: Copy + Ord + Serialize + DeserializeOwned + 'static {
    const ALL_KINDS: &'static [Self];
    fn kind_index(self) -> usize;
}

impl IndexedKind for StreamType {
    const ALL_KINDS: &'static [Self] = &StreamType::ALL;
    fn kind_index(self) -> usize {
        self.index()
    }
}

impl IndexedKind for MotionType {
    const ALL_KINDS: &'static [Self] = &MotionType::ALL;
    fn kind_index(self) -> usize {
        self.index()
    }
}

/// Per-kind entries of a config array
pub trait KindEntry: Copy + Default + PartialEq + Serialize + DeserializeOwned {
    type Kind: IndexedKind;
}

impl KindEntry for SupportedStreamConfig {
    type Kind = StreamType;
}

impl KindEntry for SupportedMotionConfig {
    type Kind = MotionType;
}

impl KindEntry for ActualStreamConfig {
    type Kind = StreamType;
}

impl KindEntry for ActualMotionConfig {
    type Kind = MotionType;
}

/// Serializes `[Entry; N]` as a `kind -> entry` map, omitting default entries
mod kind_map {
    use std::collections::BTreeMap;

    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{IndexedKind, KindEntry};

    pub fn serialize<V, const N: usize, S>(
        entries: &[V; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        V: KindEntry,
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for kind in V::Kind::ALL_KINDS {
            if let Some(entry) = entries.get(kind.kind_index()) {
                if *entry != V::default() {
                    map.serialize_entry(kind, entry)?;
                }
            }
        }
        map.end()
    }

    pub fn deserialize<'de, V, const N: usize, D>(deserializer: D) -> Result<[V; N], D::Error>
    where
        V: KindEntry,
        D: Deserializer<'de>,
    {
        let map: BTreeMap<V::Kind, V> = BTreeMap::deserialize(deserializer)?;
        let mut entries = [V::default(); N];
        for (kind, entry) in map {
            if let Some(slot) = entries.get_mut(kind.kind_index()) {
                *slot = entry;
            }
        }
        Ok(entries)
    }
}
