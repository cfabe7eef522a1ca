//! Gateway priority list and URL construction.

use crate::config::{AttestorConfig, PUBLIC_GATEWAYS};
use url::Url;

const GATEWAY_ENV: &str = "ATTESTOR_IPFS_GATEWAYS";

/// Gateways in fetch order: configured, then the comma-separated
/// `ATTESTOR_IPFS_GATEWAYS` environment list, then the public fallbacks.
pub fn resolve_gateways(config: &AttestorConfig) -> Vec<String> {
    let env_list = std::env::var(GATEWAY_ENV).ok();
    merge_gateways(&config.gateways, env_list.as_deref())
}

fn merge_gateways(configured: &[String], env_list: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |raw: &str| {
        let base = raw.trim().trim_end_matches('/').to_string();
        if base.is_empty() || out.contains(&base) {
            return;
        }
        if Url::parse(&base).is_err() {
            return;
        }
        out.push(base);
    };
    for gateway in configured {
        push(gateway);
    }
    if let Some(list) = env_list {
        for gateway in list.split(',') {
            push(gateway);
        }
    }
    for gateway in PUBLIC_GATEWAYS {
        push(gateway);
    }
    out
}

/// Resolve an identifier to a retrievable URL. Absolute URLs pass through;
/// leading slashes and an `ipfs/` path prefix are stripped first.
pub fn gateway_url(base: &str, cid: &str) -> String {
    let trimmed = cid.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    let stripped = trimmed.trim_start_matches('/');
    let stripped = stripped
        .strip_prefix("ipfs/")
        .or_else(|| stripped.strip_prefix("IPFS/"))
        .map_or(stripped, |rest| rest.trim_start_matches('/'));
    format!("{}/{}", base.trim_end_matches('/'), stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_and_dedupe() {
        let configured = vec![
            "https://my-gateway.example/ipfs/".to_string(),
            "https://ipfs.io/ipfs/".to_string(),
        ];
        let merged = merge_gateways(&configured, Some("https://env.example/ipfs"));
        assert_eq!(merged[0], "https://my-gateway.example/ipfs");
        assert_eq!(merged[1], "https://ipfs.io/ipfs");
        assert_eq!(merged[2], "https://env.example/ipfs");
        // the public fallback already present is not repeated
        assert_eq!(
            merged.iter().filter(|g| g.contains("ipfs.io")).count(),
            1
        );
    }

    #[test]
    fn invalid_gateway_entries_filtered() {
        let configured = vec!["not a url".to_string(), String::new()];
        let merged = merge_gateways(&configured, None);
        assert_eq!(merged.len(), PUBLIC_GATEWAYS.len());
    }

    #[test]
    fn url_building_strips_path_prefixes() {
        assert_eq!(
            gateway_url("https://ipfs.io/ipfs", "bafyabc"),
            "https://ipfs.io/ipfs/bafyabc"
        );
        assert_eq!(
            gateway_url("https://ipfs.io/ipfs/", "/ipfs/bafyabc"),
            "https://ipfs.io/ipfs/bafyabc"
        );
        assert_eq!(
            gateway_url("https://ipfs.io/ipfs", "https://other.example/ipfs/bafyabc"),
            "https://other.example/ipfs/bafyabc"
        );
    }
}
