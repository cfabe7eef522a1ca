//! Runtime configuration: gateway priority, recognized manage-data keys, strictness.
//!
//! When values are set (via config file or env), they take precedence over the
//! built-in defaults. Gateway resolution order at fetch time is: configured
//! list, then `ATTESTOR_IPFS_GATEWAYS`, then the public fallbacks.
//!
//! Load from: env `ATTESTOR_CONFIG_PATH`, or `./config/attestor.json`, or
//! `./attestor.json`.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Public gateway fallbacks, least-preferred tier. Order matters: the
/// pinning provider's gateway propagates fastest for freshly pinned docs.
pub const PUBLIC_GATEWAYS: [&str; 2] = [
    "https://gateway.lighthouse.storage/ipfs/",
    "https://ipfs.io/ipfs/",
];

/// Delay before each fetch attempt. Fixed schedule rather than exponential:
/// gateway propagation lag dominates failures, not transient network error.
pub const RETRY_DELAYS_MS: [u64; 4] = [0, 5_000, 15_000, 30_000];

const DEFAULT_ASSET_CODE: &str = "USDC";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

fn default_attestation_keys() -> Vec<String> {
    vec!["custody.attestation.cid".to_string()]
}

fn default_reserve_keys() -> Vec<String> {
    vec!["custody.reserve.cid".to_string()]
}

fn default_asset_code() -> String {
    DEFAULT_ASSET_CODE.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_retry_delays_ms() -> Vec<u64> {
    RETRY_DELAYS_MS.to_vec()
}

/// Reconciliation settings. Leave `gateways` empty to rely on env/public lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttestorConfig {
    /// Preferred gateway base URLs, tried first in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,

    /// Manage-data key names recording an attestation CID (case-insensitive match).
    #[serde(default = "default_attestation_keys")]
    pub attestation_keys: Vec<String>,

    /// Manage-data key names recording a reserve CID (case-insensitive match).
    #[serde(default = "default_reserve_keys")]
    pub reserve_keys: Vec<String>,

    /// Strict join mode: metadata that fetches but fails every join rule is
    /// Invalid instead of Recorded.
    #[serde(default)]
    pub strict: bool,

    /// Settlement asset code used for distribution payouts.
    #[serde(default = "default_asset_code")]
    pub asset_code: String,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Per-attempt delays for metadata fetches, milliseconds.
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,
}

impl Default for AttestorConfig {
    fn default() -> Self {
        Self {
            gateways: Vec::new(),
            attestation_keys: default_attestation_keys(),
            reserve_keys: default_reserve_keys(),
            strict: false,
            asset_code: default_asset_code(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            retry_delays_ms: default_retry_delays_ms(),
        }
    }
}

impl AttestorConfig {
    /// Load config from path. Returns default on error or missing file.
    pub fn load_from_path(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Load config: env ATTESTOR_CONFIG_PATH, then ./config/attestor.json,
    /// then ./attestor.json, then defaults. `ATTESTOR_STRICT=1` and
    /// `ATTESTOR_HTTP_TIMEOUT_SECS` override the loaded values.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        if let Ok(v) = std::env::var("ATTESTOR_STRICT") {
            config.strict = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("ATTESTOR_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = v.trim().parse::<u64>() {
                config.http_timeout_secs = secs;
            }
        }
        config
    }

    fn load_file() -> Self {
        if let Ok(path) = std::env::var("ATTESTOR_CONFIG_PATH") {
            let p = Path::new(&path);
            if p.exists() {
                return Self::load_from_path(p);
            }
        }
        for candidate in [
            Path::new("./config/attestor.json"),
            Path::new("./attestor.json"),
        ] {
            if candidate.exists() {
                return Self::load_from_path(candidate);
            }
        }
        Self::default()
    }

    /// Normalize for comparison: trimmed, lowercase.
    fn norm_key(s: &str) -> String {
        s.trim().to_lowercase()
    }

    /// Check if a manage-data entry name is a recognized attestation CID key.
    pub fn is_attestation_key(&self, name: &str) -> bool {
        let n = Self::norm_key(name);
        self.attestation_keys.iter().any(|k| Self::norm_key(k) == n)
    }

    /// Check if a manage-data entry name is a recognized reserve CID key.
    pub fn is_reserve_key(&self, name: &str) -> bool {
        let n = Self::norm_key(name);
        self.reserve_keys.iter().any(|k| Self::norm_key(k) == n)
    }

    /// Either recognized convention; definitive proof of intentional recording.
    pub fn is_recognized_key(&self, name: &str) -> bool {
        self.is_attestation_key(name) || self.is_reserve_key(name)
    }
}
