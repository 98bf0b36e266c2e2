//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::errors::{Result, StudioError};

/// Target network for ledger reads and writes.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// JSON-RPC endpoint (e.g. https://sepolia-rollup.arbitrum.io/rpc)
    pub rpc_url: String,
    /// Numeric chain id the RPC must report
    pub chain_id: u64,
    /// Human-readable network name, stored with each deployment
    pub name: String,
    /// Block explorer base URL, without trailing slash
    pub explorer_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote compile / deploy service
    pub api_url: String,
    /// Bearer key for the remote compile / deploy service
    pub api_key: String,
    pub chain: ChainConfig,
    /// Sender account for state-changing calls (signing is done by the node)
    pub wallet_address: Option<String>,
    /// Upper bound on waiting for a transaction to be included
    pub receipt_timeout_secs: u64,
    /// Trailing-edge debounce window for editor auto-save
    pub autosave_delay_ms: u64,
    /// Backend store (SQLite URL or file path)
    pub database_url: String,
    /// Port for the share API
    pub api_port: u16,
    /// Avatar service base URL
    pub avatar_service_url: Option<String>,
    /// Analytics tracking id, carried for the page shell
    pub ga_tracking_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    StudioError::Config(format!("{key} environment variable is required"))
                })
        };
        let or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            api_url: trim_slash(required("API_URL")?),
            api_key: required("API_KEY")?,
            chain: ChainConfig {
                rpc_url: or_default("RPC_URL", "https://sepolia-rollup.arbitrum.io/rpc"),
                chain_id: parse_num(&or_default("CHAIN_ID", "421614"), "CHAIN_ID")?,
                name: or_default("CHAIN_NAME", "Arbitrum Sepolia"),
                explorer_url: trim_slash(or_default("EXPLORER_URL", "https://sepolia.arbiscan.io")),
            },
            wallet_address: lookup("WALLET_ADDRESS").filter(|v| !v.is_empty()),
            receipt_timeout_secs: parse_num(
                &or_default("RECEIPT_TIMEOUT_SECS", "120"),
                "RECEIPT_TIMEOUT_SECS",
            )?,
            autosave_delay_ms: parse_num(
                &or_default("AUTOSAVE_DELAY_MS", "1000"),
                "AUTOSAVE_DELAY_MS",
            )?,
            database_url: or_default("DATABASE_URL", "sqlite:./studio.db"),
            api_port: parse_num(&or_default("API_PORT", "3002"), "API_PORT")?,
            avatar_service_url: lookup("AVATAR_SERVICE_URL").map(trim_slash),
            ga_tracking_id: lookup("GA_TRACKING_ID").filter(|v| !v.is_empty()),
        })
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.chain.explorer_url)
    }

    pub fn explorer_address_url(&self, address: &str) -> String {
        format!("{}/address/{address}", self.chain.explorer_url)
    }

    /// Avatar image URL for a seed (usually the user's email).
    pub fn avatar_url(&self, seed: &str) -> Option<String> {
        self.avatar_service_url
            .as_ref()
            .map(|base| format!("{base}/{seed}"))
    }
}

fn parse_num<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| StudioError::Config(format!("Invalid {key}")))
}

fn trim_slash(s: String) -> String {
    s.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_URL", "https://api.example.com/"),
            ("API_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(cfg.api_url, "https://api.example.com");
        assert_eq!(cfg.chain.chain_id, 421614);
        assert_eq!(cfg.autosave_delay(), Duration::from_millis(1000));
        assert_eq!(cfg.receipt_timeout_secs, 120);
        assert!(cfg.wallet_address.is_none());
        assert!(cfg.avatar_url("a@b.c").is_none());
    }

    #[test]
    fn missing_api_url_is_config_error() {
        let err = Config::from_lookup(lookup(&[("API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, StudioError::Config(msg) if msg.contains("API_URL")));
    }

    #[test]
    fn malformed_chain_id_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("API_URL", "https://api"),
            ("API_KEY", "k"),
            ("CHAIN_ID", "sepolia"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StudioError::Config(msg) if msg == "Invalid CHAIN_ID"));
    }

    #[test]
    fn explorer_and_avatar_helpers() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_URL", "https://api"),
            ("API_KEY", "k"),
            ("EXPLORER_URL", "https://scan.example/"),
            ("AVATAR_SERVICE_URL", "https://avatars.example"),
        ]))
        .unwrap();

        assert_eq!(cfg.explorer_tx_url("0xabc"), "https://scan.example/tx/0xabc");
        assert_eq!(
            cfg.explorer_address_url("0xdef"),
            "https://scan.example/address/0xdef"
        );
        assert_eq!(
            cfg.avatar_url("dev@example.com").as_deref(),
            Some("https://avatars.example/dev@example.com")
        );
    }
}
