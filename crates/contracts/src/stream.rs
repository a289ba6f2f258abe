//! Stream and motion sensor kinds
//!
//! Both sets are fixed and enumerable so that per-kind configuration can live
//! in plain arrays indexed by the kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image stream kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Depth,
    Color,
    Infrared,
    Infrared2,
    Fisheye,
}

impl StreamType {
    /// Number of stream kinds
    pub const COUNT: usize = 5;

    /// All stream kinds, in index order
    pub const ALL: [StreamType; Self::COUNT] = [
        StreamType::Depth,
        StreamType::Color,
        StreamType::Infrared,
        StreamType::Infrared2,
        StreamType::Fisheye,
    ];

    /// Array index of this kind
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable lowercase name (used in logs and metrics labels)
    pub fn as_str(self) -> &'static str {
        match self {
            StreamType::Depth => "depth",
            StreamType::Color => "color",
            StreamType::Infrared => "infrared",
            StreamType::Infrared2 => "infrared2",
            StreamType::Fisheye => "fisheye",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Motion sensor kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionType {
    Accel,
    Gyro,
}

impl MotionType {
    /// Number of motion sensor kinds
    pub const COUNT: usize = 2;

    /// All motion sensor kinds, in index order
    pub const ALL: [MotionType; Self::COUNT] = [MotionType::Accel, MotionType::Gyro];

    /// Array index of this kind
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MotionType::Accel => "accel",
            MotionType::Gyro => "gyro",
        }
    }
}

impl fmt::Display for MotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
