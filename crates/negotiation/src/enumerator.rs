//! Capability enumeration

use contracts::{CapabilitySource, SupportedModuleConfig};
use tracing::warn;

/// Upper bound on declarations read from a single source
pub const MAX_ENUMERATED_CONFIGS: usize = 1024;

/// Query `source` at 0, 1, 2, ... until it reports no configuration
///
/// The returned order is the source's preference order.
pub fn enumerate<S>(source: &S) -> Vec<SupportedModuleConfig>
where
    S: CapabilitySource + ?Sized,
{
    enumerate_with_limit(source, MAX_ENUMERATED_CONFIGS)
}

/// [`enumerate`] with an explicit bound
pub fn enumerate_with_limit<S>(source: &S, limit: usize) -> Vec<SupportedModuleConfig>
where
    S: CapabilitySource + ?Sized,
{
    let mut configs = Vec::new();
    while configs.len() < limit {
        match source.supported_config(configs.len()) {
            Some(config) => configs.push(config),
            None => return configs,
        }
    }

    warn!(limit, "Capability source did not terminate, truncating");
    configs
}
