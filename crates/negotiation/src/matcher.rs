//! Configuration matching
//!
//! Finds the first declared module config that a superset satisfies.

use contracts::{CapabilitySource, SupportedModuleConfig};

use crate::enumerate;

/// Whether `superset` satisfies `candidate`
///
/// - the candidate device name is empty or equals the superset's
/// - every enabled stream is enabled in the superset with the same resolution
///   and the same rate, unless the candidate rate is the wildcard
/// - every enabled motion sensor is enabled in the superset
pub fn satisfies(candidate: &SupportedModuleConfig, superset: &SupportedModuleConfig) -> bool {
    if !candidate.device_name.is_empty() && candidate.device_name != superset.device_name {
        return false;
    }

    let streams_ok = candidate.enabled_streams().all(|stream| {
        let wanted = candidate.stream(stream);
        let given = superset.stream(stream);
        given.enabled
            && wanted.width == given.width
            && wanted.height == given.height
            && (wanted.frame_rate == 0 || wanted.frame_rate == given.frame_rate)
    });

    streams_ok
        && candidate
            .enabled_motions()
            .all(|motion| superset.motion(motion).enabled)
}

/// First candidate of an already enumerated group satisfied by `superset`
pub fn first_satisfying<'a>(
    candidates: &'a [SupportedModuleConfig],
    superset: &SupportedModuleConfig,
) -> Option<&'a SupportedModuleConfig> {
    candidates.iter().find(|c| satisfies(c, superset))
}

/// First config declared by `source` satisfied by `superset`
pub fn find_satisfying_config<S>(
    source: &S,
    superset: &SupportedModuleConfig,
) -> Option<SupportedModuleConfig>
where
    S: CapabilitySource + ?Sized,
{
    enumerate(source)
        .into_iter()
        .find(|candidate| satisfies(candidate, superset))
}
