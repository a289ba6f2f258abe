//! Pipeline 指标收集模块
//!
//! 协商结果、生命周期迁移与样本分发的运行指标。

use std::collections::BTreeMap;

use contracts::{CorrelatedSampleSet, PipelineState};
use metrics::{counter, gauge, histogram};

/// 记录一次协商结果
///
/// `attempts` 为尝试过的超集数量。
pub fn record_negotiation(success: bool, attempts: usize) {
    let status = if success { "success" } else { "failure" };
    counter!("rs_pipeline_negotiations_total", "status" => status).increment(1);
    histogram!("rs_pipeline_negotiation_attempts").record(attempts as f64);
}

/// 记录生命周期状态迁移
pub fn record_state_transition(from: PipelineState, to: PipelineState) {
    counter!(
        "rs_pipeline_state_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("rs_pipeline_streaming").set(if to == PipelineState::Streaming { 1.0 } else { 0.0 });
}

/// 记录一次样本集分发
pub fn record_sample_set_dispatched(consumer_count: usize) {
    counter!("rs_pipeline_sample_sets_dispatched_total").increment(1);
    gauge!("rs_pipeline_consumers").set(consumer_count as f64);
}

/// 记录消费者投递结果
pub fn record_consumer_delivery(consumer: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "rs_pipeline_consumer_deliveries_total",
        "consumer" => consumer.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录队列满导致的丢弃
pub fn record_consumer_dropped(consumer: &str) {
    counter!(
        "rs_pipeline_consumer_dropped_total",
        "consumer" => consumer.to_string()
    )
    .increment(1);
}

/// 样本分发聚合器
///
/// 在内存中聚合指标，便于 CLI 输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DispatchStatsAggregator {
    /// 样本集总数
    pub total_sample_sets: u64,

    /// 序号跳跃总数 (生产端丢失的样本集)
    pub total_skipped: u64,

    /// 各流的样本数
    pub stream_counts: BTreeMap<String, u64>,

    /// 相邻样本集的时间间隔 (毫秒)
    pub interval_stats: RunningStats,

    /// 每个样本集携带的样本数
    pub size_stats: RunningStats,

    last_sequence: Option<u64>,
    last_timestamp_ms: Option<f64>,
}

impl DispatchStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, sample_set: &CorrelatedSampleSet) {
        self.total_sample_sets += 1;

        if let Some(last) = self.last_sequence {
            if sample_set.sequence > last + 1 {
                self.total_skipped += sample_set.sequence - last - 1;
            }
        }
        self.last_sequence = Some(sample_set.sequence);

        if let Some(last) = self.last_timestamp_ms {
            self.interval_stats.push(sample_set.timestamp_ms - last);
        }
        self.last_timestamp_ms = Some(sample_set.timestamp_ms);

        self.size_stats.push(sample_set.sample_count() as f64);

        for stream in contracts::StreamType::ALL {
            if sample_set.image(stream).is_some() {
                *self.stream_counts.entry(stream.to_string()).or_insert(0) += 1;
            }
        }
        for motion in contracts::MotionType::ALL {
            if sample_set.motion(motion).is_some() {
                *self.stream_counts.entry(motion.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DispatchSummary {
        let expected = self.total_sample_sets + self.total_skipped;
        DispatchSummary {
            total_sample_sets: self.total_sample_sets,
            total_skipped: self.total_skipped,
            skip_rate: if expected > 0 {
                self.total_skipped as f64 / expected as f64 * 100.0
            } else {
                0.0
            },
            interval_ms: StatsSummary::from(&self.interval_stats),
            samples_per_set: StatsSummary::from(&self.size_stats),
            stream_counts: self.stream_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 分发摘要
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub total_sample_sets: u64,
    pub total_skipped: u64,
    pub skip_rate: f64,
    pub interval_ms: StatsSummary,
    pub samples_per_set: StatsSummary,
    pub stream_counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Total sample sets: {}", self.total_sample_sets)?;
        writeln!(
            f,
            "Skipped sample sets: {} ({:.2}%)",
            self.total_skipped, self.skip_rate
        )?;
        writeln!(f, "Interval (ms): {}", self.interval_ms)?;
        writeln!(f, "Samples per set: {}", self.samples_per_set)?;

        if !self.stream_counts.is_empty() {
            writeln!(f, "Samples per stream:")?;
            for (stream, count) in &self.stream_counts {
                writeln!(f, "  {}: {}", stream, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
