//! Negotiation engine
//!
//! Walks the supersets in preference order. For each one it acquires a
//! device, matches every module, realizes and applies the module configs.
//! Any rejection rolls the attempt back and moves on to the next superset.

use std::sync::Arc;

use contracts::{
    Context, ContractError, CvModule, Device, DeviceManager, ModuleBinding, ModuleUid,
    SampleSetCallback, SupportedModuleConfig, TimeSyncMode,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::enumerator::enumerate_with_limit;
use crate::error::{NegotiationError, Result};
use crate::matcher::first_satisfying;
use crate::superset::Supersets;
use crate::MAX_ENUMERATED_CONFIGS;

/// Outcome of a successful negotiation
///
/// Nothing is committed yet: the lifecycle layer swaps it in atomically.
pub struct Negotiated {
    /// Opened, not yet streaming
    pub device_manager: Box<dyn DeviceManager>,

    /// One binding per module, in registration order
    pub bindings: Vec<ModuleBinding>,

    /// Time sync mode requested by the caller's restriction
    pub requested_time_sync: TimeSyncMode,

    /// Number of supersets tried, the committed one included
    pub attempts: usize,
}

impl std::fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiated")
            .field("device", &self.device_manager.device().name())
            .field("bindings", &self.bindings)
            .field("requested_time_sync", &self.requested_time_sync)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Why a superset was rejected
#[derive(Debug, Error)]
enum Rejection {
    #[error("no device named '{0}'")]
    NoDevice(String),

    #[error("device open failed: {0}")]
    DeviceOpen(#[source] ContractError),

    #[error("module {0} has no satisfying config")]
    NoSatisfyingConfig(ModuleUid),

    #[error("module rejected its config: {0}")]
    ModuleRejected(#[source] ContractError),
}

/// Configuration search driver
#[derive(Debug, Clone)]
pub struct NegotiationEngine {
    enumeration_limit: usize,
}

impl Default for NegotiationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NegotiationEngine {
    pub fn new() -> Self {
        Self {
            enumeration_limit: MAX_ENUMERATED_CONFIGS,
        }
    }

    /// Override the per-source declaration bound
    pub fn with_enumeration_limit(mut self, limit: usize) -> Self {
        self.enumeration_limit = limit;
        self
    }

    /// Find, acquire and apply a configuration
    ///
    /// `modules` is in registration order. `restriction` is the caller's
    /// config and may be empty when modules are present.
    ///
    /// # Errors
    /// - [`NegotiationError::InvalidArgument`] when there is nothing to negotiate
    /// - [`NegotiationError::NoMatch`] when every superset was rejected
    #[instrument(
        name = "negotiation_negotiate",
        skip_all,
        fields(modules = modules.len(), devices = context.device_count())
    )]
    pub fn negotiate(
        &self,
        context: &dyn Context,
        modules: &[Arc<dyn CvModule>],
        restriction: &SupportedModuleConfig,
        sample_callback: SampleSetCallback,
    ) -> Result<Negotiated> {
        if restriction.is_empty() && modules.is_empty() {
            return Err(NegotiationError::InvalidArgument(
                "empty configuration and no registered modules".into(),
            ));
        }

        let mut groups: Vec<Vec<SupportedModuleConfig>> = modules
            .iter()
            .map(|module| enumerate_with_limit(module.as_ref(), self.enumeration_limit))
            .collect();
        groups.push(vec![restriction.clone()]);

        debug!(
            group_sizes = ?groups.iter().map(Vec::len).collect::<Vec<_>>(),
            "Capability groups enumerated"
        );

        let mut attempts = 0;
        for superset in Supersets::new(&groups) {
            attempts += 1;

            match self.try_superset(context, modules, &groups, superset, &sample_callback) {
                Ok((device_manager, bindings)) => {
                    info!(
                        attempts,
                        device = %device_manager.device().name(),
                        "Negotiation succeeded"
                    );
                    observability::record_negotiation(true, attempts);
                    return Ok(Negotiated {
                        device_manager,
                        bindings,
                        requested_time_sync: restriction.time_sync_mode,
                        attempts,
                    });
                }
                Err(rejection) => {
                    debug!(attempt = attempts, reason = %rejection, "Superset rejected");
                }
            }
        }

        warn!(attempts, "No superset could be applied");
        observability::record_negotiation(false, attempts);
        Err(NegotiationError::NoMatch { attempts })
    }

    fn try_superset(
        &self,
        context: &dyn Context,
        modules: &[Arc<dyn CvModule>],
        groups: &[Vec<SupportedModuleConfig>],
        mut superset: SupportedModuleConfig,
        sample_callback: &SampleSetCallback,
    ) -> std::result::Result<(Box<dyn DeviceManager>, Vec<ModuleBinding>), Rejection> {
        let device = find_device(context, &superset.device_name)
            .ok_or_else(|| Rejection::NoDevice(superset.device_name.clone()))?;
        superset.device_name = device.name().to_string();

        let device_config = if superset.has_enabled_sensors() {
            superset.clone()
        } else {
            SupportedModuleConfig::hardcoded_default()
                .with_device_name(superset.device_name.clone())
        };

        let device_manager = context
            .create_device_manager(device, &device_config, sample_callback.clone())
            .map_err(Rejection::DeviceOpen)?;

        let mut bindings = Vec::with_capacity(modules.len());
        for (module, group) in modules.iter().zip(groups) {
            let chosen = first_satisfying(group, &superset)
                .ok_or_else(|| Rejection::NoSatisfyingConfig(module.module_uid()))?;

            bindings.push(ModuleBinding {
                config: device_manager.create_actual_config(chosen),
                async_processing: chosen.async_processing,
                time_sync_mode: chosen.time_sync_mode,
            });
        }

        for (applied, (module, binding)) in modules.iter().zip(&bindings).enumerate() {
            if let Err(e) = module.set_module_config(&binding.config) {
                for touched in &modules[..=applied] {
                    touched.reset_config();
                }
                return Err(Rejection::ModuleRejected(e));
            }
        }

        Ok((device_manager, bindings))
    }
}

/// First device in enumeration order matching `name`, any device when empty
fn find_device(context: &dyn Context, name: &str) -> Option<Arc<dyn Device>> {
    (0..context.device_count())
        .filter_map(|index| context.device(index))
        .find(|device| name.is_empty() || device.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DeviceDescriptor, StreamType};
    use device::{MockCvModule, SimulatedContext, SimulationOptions};

    fn noop_callback() -> SampleSetCallback {
        Arc::new(|_| {})
    }

    fn context(names: &[&str]) -> SimulatedContext {
        SimulatedContext::new(
            names
                .iter()
                .map(|name| DeviceDescriptor::with_default_profiles(*name, "0000"))
                .collect(),
        )
    }

    fn as_modules(modules: &[Arc<MockCvModule>]) -> Vec<Arc<dyn CvModule>> {
        modules
            .iter()
            .map(|m| m.clone() as Arc<dyn CvModule>)
            .collect()
    }

    fn depth(fps: u32) -> SupportedModuleConfig {
        SupportedModuleConfig::new().with_stream(StreamType::Depth, 640, 480, fps)
    }

    #[test]
    fn test_empty_request_is_invalid() {
        let err = NegotiationEngine::new()
            .negotiate(&context(&["cam"]), &[], &SupportedModuleConfig::new(), noop_callback())
            .unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidArgument(_)));
    }

    #[test]
    fn test_restriction_only() {
        let restriction = depth(30).with_time_sync(contracts::TimeSyncMode::SyncAll);
        let negotiated = NegotiationEngine::new()
            .negotiate(&context(&["cam"]), &[], &restriction, noop_callback())
            .unwrap();

        assert!(negotiated.bindings.is_empty());
        assert_eq!(negotiated.attempts, 1);
        assert_eq!(negotiated.requested_time_sync, contracts::TimeSyncMode::SyncAll);
        let current = negotiated.device_manager.current_config();
        assert!(current.stream(StreamType::Depth).enabled);
        assert!(!current.stream(StreamType::Color).enabled);
    }

    #[test]
    fn test_first_working_superset_is_committed() {
        // 1280x720 is not supported by the device, so the first superset fails to open
        let module = Arc::new(MockCvModule::new(
            7,
            vec![
                SupportedModuleConfig::new().with_stream(StreamType::Depth, 1280, 720, 30),
                depth(30),
                depth(60),
            ],
        ));

        let negotiated = NegotiationEngine::new()
            .negotiate(
                &context(&["cam"]),
                &as_modules(&[module.clone()]),
                &SupportedModuleConfig::new(),
                noop_callback(),
            )
            .unwrap();

        assert_eq!(negotiated.attempts, 2);
        assert_eq!(negotiated.bindings[0].config.stream(StreamType::Depth).width, 640);
        assert_eq!(module.applied_config().unwrap().device_name, "cam");
    }

    #[test]
    fn test_wildcard_rate_is_realized() {
        let module = Arc::new(MockCvModule::new(1, vec![depth(0)]));
        let negotiated = NegotiationEngine::new()
            .negotiate(
                &context(&["cam"]),
                &as_modules(&[module]),
                &SupportedModuleConfig::new(),
                noop_callback(),
            )
            .unwrap();

        assert_eq!(negotiated.bindings[0].config.stream(StreamType::Depth).frame_rate, 30);
    }

    #[test]
    fn test_rejection_rolls_back_and_continues() {
        let first = Arc::new(MockCvModule::new(1, vec![depth(30)]));
        let second = Arc::new(MockCvModule::new(2, vec![depth(30)]).rejecting_configs());

        let err = NegotiationEngine::new()
            .negotiate(
                &context(&["cam", "cam2"]),
                &as_modules(&[first.clone(), second.clone()]),
                &SupportedModuleConfig::new(),
                noop_callback(),
            )
            .unwrap_err();

        // only one superset exists, so the rejection ends the search
        assert_eq!(err, NegotiationError::NoMatch { attempts: 1 });
        assert_eq!(first.reset_count(), 1);
        assert_eq!(second.reset_count(), 1);
        assert!(first.applied_config().is_none());
    }

    #[test]
    fn test_unknown_device_name() {
        let restriction = depth(30).with_device_name("missing");
        let err = NegotiationEngine::new()
            .negotiate(&context(&["cam"]), &[], &restriction, noop_callback())
            .unwrap_err();
        assert_eq!(err, NegotiationError::NoMatch { attempts: 1 });
    }

    #[test]
    fn test_device_filter_selects_device() {
        let restriction = depth(30).with_device_name("second");
        let negotiated = NegotiationEngine::new()
            .negotiate(&context(&["first", "second"]), &[], &restriction, noop_callback())
            .unwrap();
        assert_eq!(negotiated.device_manager.device().name(), "second");
    }

    #[test]
    fn test_open_failure_skips_superset() {
        let ctx = SimulatedContext::with_options(
            vec![DeviceDescriptor::with_default_profiles("cam", "0000")],
            SimulationOptions {
                fail_open: vec!["cam".into()],
                ..Default::default()
            },
        );

        let err = NegotiationEngine::new()
            .negotiate(&ctx, &[], &depth(30), noop_callback())
            .unwrap_err();
        assert_eq!(err, NegotiationError::NoMatch { attempts: 1 });
    }

    #[test]
    fn test_empty_superset_uses_default_config() {
        let module = Arc::new(MockCvModule::new(3, vec![SupportedModuleConfig::new()]));
        let negotiated = NegotiationEngine::new()
            .negotiate(
                &context(&["cam"]),
                &as_modules(&[module]),
                &SupportedModuleConfig::new(),
                noop_callback(),
            )
            .unwrap();

        let current = negotiated.device_manager.current_config();
        assert_eq!(current.enabled_streams().count(), StreamType::COUNT);
        assert_eq!(current.device_name, "cam");
    }
}
