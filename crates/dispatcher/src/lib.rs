//! # Dispatcher
//!
//! 消息分发模块。
//!
//! 负责：
//! - 通过 [`SinkRegistry`] 从具名配置构建 sinks
//! - 在后台任务中消费入站 `Message` 队列
//! - Fan-out 到所有已注册的 sinks，单个 sink 失败不影响其他

pub mod error;
pub mod handle;
pub mod manager;
pub mod metrics;
pub mod registry;
pub mod sinks;

#[cfg(test)]
mod mock;

pub use contracts::{BoxedSink, Message, Sink, SINK_MAX_FORWARD};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use manager::SinkManager;
pub use crate::metrics::{MetricsSnapshot, SinkMetrics};
pub use registry::{sink_type_of, SinkConstructor, SinkRegistry};
pub use sinks::{FileSink, OutputFormat, PrometheusSink, StdoutSink, UdpSink};
