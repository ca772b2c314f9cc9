use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Harness configuration shared by the CLI sub-commands.
///
/// Timeouts are carried as signed milliseconds so that `0` (or any negative
/// value) can mean "wait indefinitely", which batch runners use when the
/// target database is known to be unblocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Data source name, e.g. `sqlite:scratch.db`.
    pub dsn: String,
    /// Upper bound for a single script evaluation; `<= 0` disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i64,
    /// Max synchronous wait for a freshly invoked statement before it is
    /// considered blocked.
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: i64,
    /// Per-pass polling slice for statements that are already running.
    #[serde(default = "default_ping_time_ms")]
    pub ping_time_ms: i64,
}

fn default_timeout_ms() -> i64 {
    60_000
}

fn default_block_time_ms() -> i64 {
    3_000
}

fn default_ping_time_ms() -> i64 {
    200
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            dsn: String::new(),
            timeout_ms: default_timeout_ms(),
            block_time_ms: default_block_time_ms(),
            ping_time_ms: default_ping_time_ms(),
        }
    }
}

impl HarnessConfig {
    pub fn timeout(&self) -> Option<Duration> {
        wait_duration(self.timeout_ms)
    }

    pub fn block_time(&self) -> Option<Duration> {
        wait_duration(self.block_time_ms)
    }

    pub fn ping_time(&self) -> Option<Duration> {
        wait_duration(self.ping_time_ms)
    }
}

/// Map a millisecond knob to a wait bound; zero or negative means "no bound".
pub fn wait_duration(ms: i64) -> Option<Duration> {
    if ms <= 0 {
        None
    } else {
        Some(Duration::from_millis(ms as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = HarnessConfig::default();
        assert_eq!(c.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(c.block_time(), Some(Duration::from_secs(3)));
        assert_eq!(c.ping_time(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_zero_and_negative_mean_unbounded() {
        assert_eq!(wait_duration(0), None);
        assert_eq!(wait_duration(-5), None);
        assert_eq!(wait_duration(1), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_serde_fills_defaults() {
        let c: HarnessConfig = serde_json::from_str(r#"{"dsn":"sqlite:x.db"}"#).unwrap();
        assert_eq!(c.dsn, "sqlite:x.db");
        assert_eq!(c.block_time_ms, 3_000);
        assert_eq!(c.ping_time_ms, 200);
    }
}
