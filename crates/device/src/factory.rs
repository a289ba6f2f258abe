//! Context factory
//!
//! Builds the context selected by a [`ContextMode`].

use contracts::{Context, ContextMode, ContractError, DeviceDescriptor};
use tracing::{info, instrument};

use crate::playback::PlaybackContext;
use crate::record::RecordContext;
use crate::simulated::{SimulatedContext, SimulationOptions};

/// Open the context for `mode`
///
/// `devices` describe the live (simulated) devices; playback takes its
/// devices from the recording instead.
///
/// # Errors
/// File-backed modes fail with [`ContractError::ContextCreation`] when their
/// file cannot be opened or created.
#[instrument(
    name = "device_open_context",
    skip(mode, devices, options),
    fields(mode = mode.as_str(), devices = devices.len())
)]
pub fn open_context(
    mode: &ContextMode,
    devices: Vec<DeviceDescriptor>,
    options: SimulationOptions,
) -> Result<Box<dyn Context>, ContractError> {
    let context: Box<dyn Context> = match mode {
        ContextMode::Live => Box::new(SimulatedContext::with_options(devices, options)),
        ContextMode::Playback(path) => Box::new(PlaybackContext::open(path, options.realtime)?),
        ContextMode::Record(path) => Box::new(RecordContext::create(path, devices, options)?),
    };

    info!(device_count = context.device_count(), "Context ready");
    Ok(context)
}
