//! Session statistics.

use std::time::Duration;

use contracts::ModuleUid;
use dispatcher::MetricsSnapshot;
use observability::DispatchStatsAggregator;

/// Per-module processing report
#[derive(Debug, Clone, Default)]
pub struct ModuleReport {
    pub uid: ModuleUid,
    pub processed: usize,
    pub flushes: usize,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Device the configuration was committed on
    pub device: String,

    /// Sample sets delivered to the application
    pub sample_sets_received: u64,

    /// Sample sets fanned out by the dispatcher
    pub sample_sets_dispatched: u64,

    /// Module processing failures reported through `on_error`
    pub module_errors: u64,

    /// Successful module process completions
    pub module_completions: u64,

    pub duration: Duration,

    /// Consumer metrics captured before teardown
    pub consumers: Vec<(String, MetricsSnapshot)>,

    pub modules: Vec<ModuleReport>,

    pub dispatch: DispatchStatsAggregator,
}

impl SessionStats {
    /// Application-side sample sets per second
    pub fn rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.sample_sets_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Device: {}", self.device);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Sample sets received: {}", self.sample_sets_received);
        println!("   ├─ Sample sets dispatched: {}", self.sample_sets_dispatched);
        println!("   ├─ Rate: {:.2}/s", self.rate());
        println!("   ├─ Module completions: {}", self.module_completions);
        println!("   └─ Module errors: {}", self.module_errors);

        if !self.consumers.is_empty() {
            println!("\n📤 Consumers ({})", self.consumers.len());
            for (i, (name, snapshot)) in self.consumers.iter().enumerate() {
                let prefix = if i == self.consumers.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: delivered={} failed={} dropped={} filtered={}",
                    prefix,
                    name,
                    snapshot.delivered_count,
                    snapshot.failure_count,
                    snapshot.dropped_count,
                    snapshot.filtered_count
                );
            }
        }

        if !self.modules.is_empty() {
            println!("\n🧩 Modules ({})", self.modules.len());
            for (i, module) in self.modules.iter().enumerate() {
                let prefix = if i == self.modules.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} module {}: processed={} flushes={}",
                    prefix, module.uid, module.processed, module.flushes
                );
            }
        }

        println!("\n{}", self.dispatch.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate() {
        let stats = SessionStats {
            sample_sets_received: 60,
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.rate() - 30.0).abs() < f64::EPSILON);
        assert_eq!(SessionStats::default().rate(), 0.0);
    }
}
