use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::config::{EnvSnapshot, Settings};

const USER_AGENT: &str = concat!("netmig/", env!("CARGO_PKG_VERSION"));

const PROXY_KEYS: &[&str] = &[
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
    "NO_PROXY",
    "no_proxy",
];

/// Decide whether registry traffic should honor standard proxy variables.
///
/// - `NETMIG_KEEP_PROXIES=1/true/yes/on` forces proxies on.
/// - `NETMIG_KEEP_PROXIES=0/false/no/off/""` forces proxies off.
/// - If unset, proxies are enabled only when at least one proxy variable is set.
pub(crate) fn keep_proxies(snapshot: &EnvSnapshot) -> bool {
    if snapshot.contains("NETMIG_KEEP_PROXIES") {
        let value = snapshot
            .var("NETMIG_KEEP_PROXIES")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        return !matches!(value.as_str(), "" | "0" | "false" | "no" | "off");
    }
    PROXY_KEYS.iter().any(|key| {
        snapshot
            .var(key)
            .is_some_and(|value| !value.trim().is_empty())
    })
}

pub(crate) fn build_http_client(settings: &Settings) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(settings.http_timeout);
    if !settings.keep_proxies {
        builder = builder.no_proxy();
    }
    builder.build().context("failed to build http client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_proxies_defaults_to_enabled_when_proxy_env_is_set() {
        let snapshot = EnvSnapshot::testing(&[("HTTPS_PROXY", "http://proxy.example")]);
        assert!(keep_proxies(&snapshot));
    }

    #[test]
    fn keep_proxies_defaults_to_disabled_without_proxy_env() {
        let snapshot = EnvSnapshot::testing(&[("no_proxy", "  ")]);
        assert!(!keep_proxies(&snapshot));
    }

    #[test]
    fn keep_proxies_env_var_forces_enabled() {
        let snapshot = EnvSnapshot::testing(&[("NETMIG_KEEP_PROXIES", "on")]);
        assert!(keep_proxies(&snapshot));
    }

    #[test]
    fn keep_proxies_env_var_forces_disabled() {
        let snapshot = EnvSnapshot::testing(&[
            ("NETMIG_KEEP_PROXIES", "0"),
            ("HTTP_PROXY", "http://proxy.example"),
        ]);
        assert!(!keep_proxies(&snapshot));
    }
}
