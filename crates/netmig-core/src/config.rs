use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub verbose: u8,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Process-level knobs read once from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub http_timeout: Duration,
    pub keep_proxies: bool,
    pub max_capture_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            keep_proxies: false,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
        }
    }
}

impl Settings {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let http_timeout = snapshot
            .var("NETMIG_HTTP_TIMEOUT")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        let max_capture_bytes = snapshot
            .var("NETMIG_MAX_CAPTURE_BYTES")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_CAPTURE_BYTES);
        Self {
            http_timeout: Duration::from_secs(http_timeout),
            keep_proxies: net::keep_proxies(snapshot),
            max_capture_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_apply_for_missing_or_bad_values() {
        let settings = Settings::from_snapshot(&EnvSnapshot::testing(&[
            ("NETMIG_HTTP_TIMEOUT", "soon"),
            ("NETMIG_MAX_CAPTURE_BYTES", "0"),
        ]));
        assert_eq!(settings.http_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_capture_bytes, DEFAULT_MAX_CAPTURE_BYTES);
        assert!(!settings.keep_proxies);
    }

    #[test]
    fn explicit_values_are_honoured() {
        let settings = Settings::from_snapshot(&EnvSnapshot::testing(&[
            ("NETMIG_HTTP_TIMEOUT", " 5 "),
            ("NETMIG_MAX_CAPTURE_BYTES", "4096"),
            ("NETMIG_KEEP_PROXIES", "yes"),
        ]));
        assert_eq!(settings.http_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_capture_bytes, 4096);
        assert!(settings.keep_proxies);
    }

    #[test]
    #[serial]
    fn capture_reads_the_process_environment() {
        let previous = env::var("NETMIG_HTTP_TIMEOUT").ok();
        env::set_var("NETMIG_HTTP_TIMEOUT", "12");
        let settings = Settings::from_env();
        match previous {
            Some(value) => env::set_var("NETMIG_HTTP_TIMEOUT", value),
            None => env::remove_var("NETMIG_HTTP_TIMEOUT"),
        }
        assert_eq!(settings.http_timeout, Duration::from_secs(12));
    }
}
