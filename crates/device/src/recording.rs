//! JSON-lines recording format
//!
//! ```text
//! {"version":1,"devices":[{"name":"cam","serial":"0001","streams":[...],"motions":[...]}]}
//! {"device":"cam","sample_set":{"sequence":1,"timestamp_ms":0.0,"images":[...],"motions":[...]}}
//! ...
//! ```
//!
//! The first line is the header, every following line is one sample set.
//! Pixel data is not recorded.

use contracts::{CorrelatedSampleSet, DeviceDescriptor};
use serde::{Deserialize, Serialize};

/// Current format version
pub const RECORDING_VERSION: u32 = 1;

/// First line of a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingHeader {
    pub version: u32,
    pub devices: Vec<DeviceDescriptor>,
}

/// One recorded sample set
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedSampleSet {
    pub device: String,
    pub sample_set: CorrelatedSampleSet,
}

/// Borrowed form written by the recorder
#[derive(Debug, Serialize)]
pub(crate) struct RecordedSampleSetRef<'a> {
    pub device: &'a str,
    pub sample_set: &'a CorrelatedSampleSet,
}
