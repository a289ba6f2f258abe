//! Ordered resource teardown
//!
//! Consumers hold sample sets backed by device memory and modules may still
//! reference it, so release order is fixed: consumers, then modules, then
//! the device.

use std::sync::Arc;

use contracts::{CvModule, DeviceManager};
use dispatcher::SampleDispatcher;
use tracing::{debug, instrument};

#[instrument(
    name = "pipeline_ordered_teardown",
    skip_all,
    fields(modules = modules.len(), has_device = device_manager.is_some())
)]
pub(crate) fn ordered_teardown(
    dispatcher: &SampleDispatcher,
    modules: &[Arc<dyn CvModule>],
    device_manager: Option<&mut (dyn DeviceManager + 'static)>,
) {
    // 1. no delivery in flight after this
    dispatcher.clear();

    // 2.
    for module in modules {
        module.flush_resources();
    }

    // 3.
    if let Some(device_manager) = device_manager {
        device_manager.stop();
    }

    debug!("Teardown complete");
}
