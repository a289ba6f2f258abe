//! CorrelatedSampleSet - Device output
//!
//! A time-aligned bundle of per-stream samples delivered as one unit.
//! Sample sets are immutable once produced and shared through `Arc`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ActualModuleConfig, MotionType, StreamType, TimeSyncMode};

/// Single image sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    pub width: u32,
    pub height: u32,

    /// Frame number reported by the device for this stream
    pub frame_number: u64,

    /// Capture timestamp (milliseconds)
    pub timestamp_ms: f64,

    /// Pixel data (zero-copy)
    #[serde(skip)]
    pub data: Bytes,
}

/// Single motion sensor sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotionSample {
    /// Capture timestamp (milliseconds)
    pub timestamp_ms: f64,

    /// x, y, z
    pub values: [f32; 3],
}

/// Correlated sample set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelatedSampleSet {
    /// Sequence number assigned by the producer (monotonically increasing)
    pub sequence: u64,

    /// Reference timestamp of the set (milliseconds)
    pub timestamp_ms: f64,

    pub images: [Option<ImageSample>; StreamType::COUNT],

    pub motions: [Option<MotionSample>; MotionType::COUNT],
}

impl CorrelatedSampleSet {
    pub fn new(sequence: u64, timestamp_ms: f64) -> Self {
        Self {
            sequence,
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn image(&self, stream: StreamType) -> Option<&ImageSample> {
        self.images[stream.index()].as_ref()
    }

    pub fn motion(&self, motion: MotionType) -> Option<&MotionSample> {
        self.motions[motion.index()].as_ref()
    }

    pub fn set_image(&mut self, stream: StreamType, sample: ImageSample) {
        self.images[stream.index()] = Some(sample);
    }

    pub fn set_motion(&mut self, motion: MotionType, sample: MotionSample) {
        self.motions[motion.index()] = Some(sample);
    }

    /// Number of samples carried by the set
    pub fn sample_count(&self) -> usize {
        self.images.iter().flatten().count() + self.motions.iter().flatten().count()
    }

    /// Whether a consumer bound to `config` wants this set
    ///
    /// The set must carry at least one sample of an enabled stream or motion
    /// sensor. Under [`TimeSyncMode::SyncAll`] every enabled image stream must
    /// be present.
    pub fn is_relevant_to(&self, config: &ActualModuleConfig, mode: TimeSyncMode) -> bool {
        let has_any = config.enabled_streams().any(|s| self.image(s).is_some())
            || config.enabled_motions().any(|m| self.motion(m).is_some());

        if !has_any {
            return false;
        }

        match mode {
            TimeSyncMode::SyncAll => config.enabled_streams().all(|s| self.image(s).is_some()),
            TimeSyncMode::SyncAny | TimeSyncMode::SyncNotRequired => true,
        }
    }
}
