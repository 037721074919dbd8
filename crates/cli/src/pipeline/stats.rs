//! Relay run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::RelaySummary;

/// Final counters of one sink
#[derive(Debug, Clone)]
pub struct SinkStats {
    pub name: String,
    pub sink_type: String,
    pub counters: MetricsSnapshot,
}

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Input side: lines, decoded messages, decode errors
    pub relay: RelaySummary,

    /// Output side, sorted by sink name
    pub sinks: Vec<SinkStats>,

    /// Whether the run stopped on a signal rather than end of input
    pub interrupted: bool,
}

impl PipelineStats {
    /// Decoded messages per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.relay.messages as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Failed writes across all sinks
    pub fn total_failures(&self) -> u64 {
        self.sinks.iter().map(|s| s.counters.failure_count).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Relay Statistics                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages/s: {:.2}", self.throughput());
        println!(
            "   └─ Stopped by: {}",
            if self.interrupted { "signal" } else { "end of input" }
        );

        println!("\n{}", self.relay);

        if !self.sinks.is_empty() {
            println!("Sinks ({})", self.sinks.len());
            for (i, sink) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {} ({}): {} written, {} failed, {} flush failures",
                    prefix,
                    sink.name,
                    sink.sink_type,
                    sink.counters.write_count,
                    sink.counters.failure_count,
                    sink.counters.flush_failure_count
                );
            }
        }

        println!();
    }
}
