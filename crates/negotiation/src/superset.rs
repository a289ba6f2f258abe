//! Superset generation
//!
//! A superset merges one candidate from every group into a single config that
//! satisfies all of them at once. Combinations are visited by increasing total
//! rank (sum of candidate indices), ties broken lexicographically, so a
//! combination of earlier (more preferred) candidates is always tried first.

use contracts::{SupportedModuleConfig, SupportedMotionConfig, SupportedStreamConfig};
use tracing::trace;

/// Merge two configs, `None` on conflict
///
/// - device names merge when either is empty or both are equal
/// - a stream enabled in both needs equal resolution and equal or wildcard rate
/// - a motion sensor enabled in both needs equal or wildcard rate
/// - the stricter time sync mode wins
pub fn merge(
    a: &SupportedModuleConfig,
    b: &SupportedModuleConfig,
) -> Option<SupportedModuleConfig> {
    let device_name = if a.device_name.is_empty() {
        b.device_name.clone()
    } else if b.device_name.is_empty() || a.device_name == b.device_name {
        a.device_name.clone()
    } else {
        return None;
    };

    let mut merged = SupportedModuleConfig::new().with_device_name(device_name);

    for (slot, (x, y)) in merged
        .image_streams
        .iter_mut()
        .zip(a.image_streams.iter().zip(b.image_streams.iter()))
    {
        *slot = merge_stream(x, y)?;
    }

    for (slot, (x, y)) in merged
        .motion_sensors
        .iter_mut()
        .zip(a.motion_sensors.iter().zip(b.motion_sensors.iter()))
    {
        *slot = merge_motion(x, y)?;
    }

    merged.time_sync_mode = a.time_sync_mode.max(b.time_sync_mode);
    Some(merged)
}

/// Merge a whole combination, starting from the empty config
pub fn merge_all<'a, I>(configs: I) -> Option<SupportedModuleConfig>
where
    I: IntoIterator<Item = &'a SupportedModuleConfig>,
{
    configs
        .into_iter()
        .try_fold(SupportedModuleConfig::new(), |acc, config| merge(&acc, config))
}

fn merge_stream(
    x: &SupportedStreamConfig,
    y: &SupportedStreamConfig,
) -> Option<SupportedStreamConfig> {
    match (x.enabled, y.enabled) {
        (true, true) => {
            if x.width != y.width || x.height != y.height {
                return None;
            }
            let frame_rate = merge_rate(x.frame_rate, y.frame_rate)?;
            Some(SupportedStreamConfig::new(x.width, x.height, frame_rate))
        }
        (true, false) => Some(*x),
        (false, true) => Some(*y),
        (false, false) => Some(SupportedStreamConfig::default()),
    }
}

fn merge_motion(
    x: &SupportedMotionConfig,
    y: &SupportedMotionConfig,
) -> Option<SupportedMotionConfig> {
    match (x.enabled, y.enabled) {
        (true, true) => Some(SupportedMotionConfig {
            enabled: true,
            sample_rate: merge_rate(x.sample_rate, y.sample_rate)?,
        }),
        (true, false) => Some(*x),
        (false, true) => Some(*y),
        (false, false) => Some(SupportedMotionConfig::default()),
    }
}

/// 0 is a wildcard; the concrete rate wins
fn merge_rate(x: u32, y: u32) -> Option<u32> {
    match (x, y) {
        (0, rate) | (rate, 0) => Some(rate),
        (x, y) if x == y => Some(x),
        _ => None,
    }
}

/// Lazily produced supersets, in preference order
///
/// Conflicting combinations are skipped. Any empty group yields nothing.
#[derive(Debug)]
pub struct Supersets<'a> {
    groups: &'a [Vec<SupportedModuleConfig>],
    /// Highest candidate index per group
    bounds: Vec<usize>,
    max_rank: usize,
    rank: usize,
    current: Option<Vec<usize>>,
    exhausted: bool,
}

impl<'a> Supersets<'a> {
    pub fn new(groups: &'a [Vec<SupportedModuleConfig>]) -> Self {
        let exhausted = groups.iter().any(|g| g.is_empty());
        let bounds: Vec<usize> = groups.iter().map(|g| g.len().saturating_sub(1)).collect();
        let max_rank = bounds.iter().sum();

        Self {
            groups,
            bounds,
            max_rank,
            rank: 0,
            current: None,
            exhausted,
        }
    }

    fn next_combination(&mut self) -> Option<Vec<usize>> {
        if self.exhausted {
            return None;
        }

        if let Some(current) = &self.current {
            if let Some(next) = next_in_rank(current, &self.bounds, self.rank) {
                self.current = Some(next.clone());
                return Some(next);
            }
            self.rank += 1;
        }

        while self.rank <= self.max_rank {
            let mut combination = vec![0; self.bounds.len()];
            if fill_smallest(&mut combination, &self.bounds, self.rank) {
                self.current = Some(combination.clone());
                return Some(combination);
            }
            self.rank += 1;
        }

        self.exhausted = true;
        None
    }
}

impl Iterator for Supersets<'_> {
    type Item = SupportedModuleConfig;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let combination = self.next_combination()?;
            let candidates = self
                .groups
                .iter()
                .zip(&combination)
                .map(|(group, &index)| &group[index]);

            match merge_all(candidates) {
                Some(superset) => return Some(superset),
                None => trace!(?combination, "Skipping conflicting combination"),
            }
        }
    }
}

/// Lexicographically smallest assignment of `remaining` into `slots`
///
/// Fills from the right so the leading positions stay as small as possible.
/// Returns `false` when `remaining` does not fit under `bounds`.
fn fill_smallest(slots: &mut [usize], bounds: &[usize], mut remaining: usize) -> bool {
    for (slot, &bound) in slots.iter_mut().zip(bounds).rev() {
        *slot = bound.min(remaining);
        remaining -= *slot;
    }
    remaining == 0
}

/// Next combination of the same rank in lexicographic order
fn next_in_rank(current: &[usize], bounds: &[usize], rank: usize) -> Option<Vec<usize>> {
    for i in (0..current.len()).rev() {
        if current[i] >= bounds[i] {
            continue;
        }
        let prefix: usize = current[..i].iter().sum::<usize>() + current[i] + 1;
        if prefix > rank {
            continue;
        }

        let mut next = current.to_vec();
        next[i] += 1;
        if fill_smallest(&mut next[i + 1..], &bounds[i + 1..], rank - prefix) {
            return Some(next);
        }
    }
    None
}
