//! Capture thread shared by the device managers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use contracts::{ActualModuleConfig, ActualMotionConfig, ActualStreamConfig, SupportedModuleConfig};
use tracing::{debug, warn};

/// Background producer with a cooperative stop flag
pub(crate) struct CaptureThread {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureThread {
    /// Spawn `body`; it must return once the flag it receives turns false
    pub(crate) fn spawn<F>(name: String, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = thread::Builder::new().name(name).spawn(move || body(flag))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Producer still running; false once `body` has returned on its own
    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the producer and wait for its last callback to return
    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked");
            }
            debug!("Capture thread joined");
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Realize `supported` against the config a device was opened with
///
/// Wildcard rates take the rate the device is running at.
pub(crate) fn realize(
    current: &ActualModuleConfig,
    supported: &SupportedModuleConfig,
) -> ActualModuleConfig {
    let mut actual = ActualModuleConfig {
        device_name: current.device_name.clone(),
        ..Default::default()
    };

    for stream in supported.enabled_streams() {
        let wanted = supported.stream(stream);
        let frame_rate = match wanted.frame_rate {
            0 => current.stream(stream).frame_rate,
            rate => rate,
        };
        actual.image_streams[stream.index()] = ActualStreamConfig {
            enabled: true,
            width: wanted.width,
            height: wanted.height,
            frame_rate,
        };
    }

    for motion in supported.enabled_motions() {
        let sample_rate = match supported.motion(motion).sample_rate {
            0 => current.motion(motion).sample_rate,
            rate => rate,
        };
        actual.motion_sensors[motion.index()] = ActualMotionConfig {
            enabled: true,
            sample_rate,
        };
    }

    actual
}
