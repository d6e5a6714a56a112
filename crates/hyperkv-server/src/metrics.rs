//! In-process metrics registry, surfaced textually through `INFO` rather
//! than an HTTP exporter.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Command/auth/storage counters. One instance is owned by the server and
/// read back by the `INFO` command handler.
pub struct Metrics {
    registry: Registry,
    pub commands_processed: IntCounterVec,
    pub keys_expired: IntCounter,
    pub evictions: IntCounter,
    pub aof_rewrites: IntCounter,
    pub snapshots_created: IntCounter,
    pub bytes_in: IntCounter,
    pub bytes_out: IntCounter,
    pub auth_attempts: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let commands_processed = IntCounterVec::new(
            Opts::new("hyperkv_commands_processed_total", "commands dispatched, by command name"),
            &["command"],
        )
        .expect("valid metric spec");
        let keys_expired = IntCounter::new("hyperkv_keys_expired_total", "keys removed by TTL sweep").expect("valid metric spec");
        let evictions = IntCounter::new("hyperkv_evictions_total", "keys removed by the eviction engine").expect("valid metric spec");
        let aof_rewrites = IntCounter::new("hyperkv_aof_rewrites_total", "append log compaction rewrites").expect("valid metric spec");
        let snapshots_created = IntCounter::new("hyperkv_snapshots_created_total", "point-in-time snapshots written").expect("valid metric spec");
        let bytes_in = IntCounter::new("hyperkv_bytes_in_total", "bytes read from client sockets").expect("valid metric spec");
        let bytes_out = IntCounter::new("hyperkv_bytes_out_total", "bytes written to client sockets").expect("valid metric spec");
        let auth_attempts = IntCounterVec::new(
            Opts::new("hyperkv_auth_attempts_total", "AUTH attempts, by outcome"),
            &["outcome"],
        )
        .expect("valid metric spec");

        registry.register(Box::new(commands_processed.clone())).expect("register metric");
        registry.register(Box::new(keys_expired.clone())).expect("register metric");
        registry.register(Box::new(evictions.clone())).expect("register metric");
        registry.register(Box::new(aof_rewrites.clone())).expect("register metric");
        registry.register(Box::new(snapshots_created.clone())).expect("register metric");
        registry.register(Box::new(bytes_in.clone())).expect("register metric");
        registry.register(Box::new(bytes_out.clone())).expect("register metric");
        registry.register(Box::new(auth_attempts.clone())).expect("register metric");

        Self {
            registry,
            commands_processed,
            keys_expired,
            evictions,
            aof_rewrites,
            snapshots_created,
            bytes_in,
            bytes_out,
            auth_attempts,
        }
    }

    pub fn record_command(&self, name: &str) {
        self.commands_processed.with_label_values(&[name]).inc();
    }

    pub fn record_auth_attempt(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.auth_attempts.with_label_values(&[outcome]).inc();
    }

    /// Renders every metric as `key:value` lines, the shape `INFO` embeds
    /// under its own `# Metrics` section.
    pub fn render_info(&self) -> String {
        let families = self.registry.gather();
        let mut out = String::new();
        for family in families {
            for metric in family.get_metric() {
                let value = if metric.has_counter() {
                    metric.get_counter().value()
                } else {
                    0.0
                };
                let labels: String = metric
                    .get_label()
                    .iter()
                    .map(|l| format!("{}={}", l.name(), l.value()))
                    .collect::<Vec<_>>()
                    .join(",");
                if labels.is_empty() {
                    out.push_str(&format!("{}:{}\r\n", family.name(), value));
                } else {
                    out.push_str(&format!("{}[{}]:{}\r\n", family.name(), labels, value));
                }
            }
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_commands_by_name() {
        let metrics = Metrics::new();
        metrics.record_command("GET");
        metrics.record_command("GET");
        metrics.record_command("SET");

        let rendered = metrics.render_info();
        assert!(rendered.contains("hyperkv_commands_processed_total"));
    }

    #[test]
    fn records_auth_outcomes() {
        let metrics = Metrics::new();
        metrics.record_auth_attempt(true);
        metrics.record_auth_attempt(false);
        let rendered = metrics.render_info();
        assert!(rendered.contains("outcome=success"));
        assert!(rendered.contains("outcome=failure"));
    }

    #[test]
    fn counters_start_at_zero() {
        let metrics = Metrics::new();
        assert_eq!(metrics.keys_expired.get(), 0);
        assert_eq!(metrics.evictions.get(), 0);
    }
}
