//! Relay 指标收集模块
//!
//! 通过 `metrics` facade 记录 Prometheus 指标，并在内存中汇总运行统计。

use std::collections::BTreeMap;
use std::fmt;

use contracts::{Message, Variant};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// 向已安装的 recorder 注册 relay 指标的说明文本
pub fn describe_relay_metrics() {
    describe_counter!(
        "telemetry_relay_messages_received_total",
        "Messages taken off the inbound queue"
    );
    describe_counter!(
        "telemetry_relay_messages_dispatched_total",
        "Sink write attempts by sink and status"
    );
    describe_histogram!(
        "telemetry_relay_dispatch_batch_size",
        "Messages forwarded per dispatcher wake-up"
    );
    describe_gauge!("telemetry_relay_active_sinks", "Registered sinks");
    describe_counter!(
        "telemetry_relay_decode_errors_total",
        "Input lines that failed to decode"
    );
    describe_counter!(
        "telemetry_relay_messages_dropped_total",
        "Messages that could not be enqueued"
    );
}

/// 记录从入站队列取出的一条消息
pub fn record_message_received(variant: Variant) {
    counter!(
        "telemetry_relay_messages_received_total",
        "variant" => variant.as_str()
    )
    .increment(1);
}

/// 记录一次 sink 写入
pub fn record_message_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "telemetry_relay_messages_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录单次唤醒转发的消息数
pub fn record_dispatch_batch(size: usize) {
    histogram!("telemetry_relay_dispatch_batch_size").record(size as f64);
}

/// 记录已注册的 sink 数量
pub fn record_active_sinks(count: usize) {
    gauge!("telemetry_relay_active_sinks").set(count as f64);
}

/// 记录解码失败的输入行
pub fn record_decode_error() {
    counter!("telemetry_relay_decode_errors_total").increment(1);
}

/// 记录无法入队的消息
pub fn record_message_dropped() {
    counter!("telemetry_relay_messages_dropped_total").increment(1);
}

/// 单次运行的输入侧统计
#[derive(Debug, Clone, Default)]
pub struct RelayStatsAggregator {
    /// 读取的非空输入行
    pub lines: u64,

    /// 解码并入队的消息
    pub messages: u64,

    /// 解码失败的行
    pub decode_errors: u64,

    /// 队列关闭导致丢弃的消息
    pub dropped: u64,

    /// 各类型消息计数
    pub variants: BTreeMap<&'static str, u64>,

    /// 输入行字节数
    pub line_bytes: RunningStats,
}

impl RelayStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 统计一行长度为 `len` 字节的输入
    pub fn record_line(&mut self, len: usize) {
        self.lines += 1;
        self.line_bytes.push(len as f64);
    }

    /// 统计一条已解码消息
    pub fn record_message(&mut self, msg: &Message) {
        self.messages += 1;
        *self.variants.entry(msg.variant().as_str()).or_insert(0) += 1;
    }

    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
        record_decode_error();
    }

    pub fn record_dropped(&mut self) {
        self.dropped += 1;
        record_message_dropped();
    }

    /// 生成汇总报告
    pub fn summary(&self) -> RelaySummary {
        RelaySummary {
            lines: self.lines,
            messages: self.messages,
            decode_errors: self.decode_errors,
            dropped: self.dropped,
            error_rate: if self.lines > 0 {
                self.decode_errors as f64 / self.lines as f64 * 100.0
            } else {
                0.0
            },
            variants: self.variants.clone(),
            line_bytes: StatsSummary::from(&self.line_bytes),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 运行汇总
#[derive(Debug, Clone, Default)]
pub struct RelaySummary {
    pub lines: u64,
    pub messages: u64,
    pub decode_errors: u64,
    pub dropped: u64,
    pub error_rate: f64,
    pub variants: BTreeMap<&'static str, u64>,
    pub line_bytes: StatsSummary,
}

impl fmt::Display for RelaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Relay Summary ===")?;
        writeln!(f, "Input lines: {}", self.lines)?;
        writeln!(f, "Messages: {}", self.messages)?;
        writeln!(
            f,
            "Decode errors: {} ({:.2}%)",
            self.decode_errors, self.error_rate
        )?;
        writeln!(f, "Dropped: {}", self.dropped)?;
        writeln!(f, "Line size (bytes): {}", self.line_bytes)?;

        if !self.variants.is_empty() {
            writeln!(f, "Messages by variant:")?;
            for (variant, count) in &self.variants {
                writeln!(f, "  {variant}: {count}")?;
            }
        }

        Ok(())
    }
}

/// Summary of a [`RunningStats`]
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

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线均值/方差 (Welford 算法)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
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
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
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
