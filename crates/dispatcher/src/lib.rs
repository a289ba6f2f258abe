//! # Dispatcher
//!
//! 样本集分发模块。
//!
//! 负责：
//! - 接收设备采集线程产生的 `CorrelatedSampleSet`
//! - Fan-out 到多个 consumer（同步 / 异步）
//! - 隔离慢 consumer，不阻塞采集线程
//! - 有序关闭：`clear` 返回时不再有进行中的投递

pub mod async_consumer;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod sync_consumer;

pub use async_consumer::AsyncConsumer;
pub use consumer::{SampleConsumer, SampleFilter, SampleHandler};
pub use contracts::CorrelatedSampleSet;
pub use dispatcher::SampleDispatcher;
pub use error::DispatcherError;
pub use metrics::{ConsumerMetrics, MetricsSnapshot};
pub use sync_consumer::SyncConsumer;
