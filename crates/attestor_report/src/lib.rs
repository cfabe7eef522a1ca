//! Static HTML report generation from reconciled attestation records.

use attestor::{format_amount, Attestation, ReportData, ReserveProofRecord, Status};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

/// Render a static HTML report to `out_path`. Embeds the full report JSON for verification.
pub fn render_report(data: &ReportData, out_path: impl AsRef<Path>) -> Result<(), ReportError> {
    let html = build_html(data)?;
    let mut f = std::fs::File::create(out_path.as_ref()).map_err(ReportError::Io)?;
    f.write_all(html.as_bytes()).map_err(ReportError::Io)?;
    Ok(())
}

/// Build HTML string from report data (for testing or in-memory use).
pub fn build_html(data: &ReportData) -> Result<String, ReportError> {
    let json_embed = serde_json::to_string(&data).map_err(ReportError::Json)?;
    let json_escaped = escape_json_in_html(&json_embed);
    let hash_escaped = escape_html(&data.reproducibility_hash_sha256);

    let verified = count_status(&data.attestations, Status::Verified);
    let recorded = count_status(&data.attestations, Status::Recorded);
    let invalid = count_status(&data.attestations, Status::Invalid);

    let attestation_rows = attestation_rows(&data.attestations);
    let reserve_section = reserve_section(&data.reserve_proofs);
    let distribution_section = distribution_section(data);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width,initial-scale=1"/>
<title>Custody Attestations</title>
<style>
:root {{ font-family: system-ui, sans-serif; background: #0f1419; color: #e6edf3; }}
body {{ max-width: 880px; margin: 0 auto; padding: 1.5rem; }}
h1 {{ font-size: 1.4rem; margin-bottom: 0.5rem; }}
h2 {{ font-size: 1.1rem; margin-top: 1.5rem; color: #8b949e; }}
.mono {{ font-family: ui-monospace, monospace; font-size: 0.9em; word-break: break-all; }}
.card {{ background: #161b22; border: 1px solid #30363d; border-radius: 6px; padding: 1rem; margin: 0.5rem 0; }}
.grid {{ display: grid; grid-template-columns: auto 1fr; gap: 0.25rem 1rem; }}
.label {{ color: #8b949e; }}
.hash {{ font-size: 0.85em; }}
.footer {{ margin-top: 2rem; font-size: 0.85rem; color: #8b949e; }}
table {{ width: 100%; border-collapse: collapse; font-size: 0.9rem; }}
th, td {{ text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #30363d; }}
th {{ color: #8b949e; font-weight: 500; }}
.badge {{ border-radius: 10px; padding: 0.1rem 0.55rem; font-size: 0.8rem; }}
.badge.ok {{ background: #1d3328; color: #3fb950; }}
.badge.warn {{ background: #342a12; color: #d29922; }}
.badge.bad {{ background: #3a1d20; color: #f85149; }}
.badge.pend {{ background: #21262d; color: #8b949e; }}
</style>
</head>
<body>
<h1>Custody Attestation Report</h1>
<p>Generated: {created}</p>

<h2>At a glance</h2>
<div class="card">
  <div class="grid">
    <span class="label">Attestations</span><span>{total}</span>
    <span class="label">Verified</span><span>{verified}</span>
    <span class="label">Recorded</span><span>{recorded}</span>
    <span class="label">Invalid</span><span>{invalid}</span>
  </div>
</div>

<h2>Reproducibility</h2>
<div class="card">
  <div class="mono hash">SHA-256: {hash}</div>
  <p class="footer">Re-run <code>attestor reconcile</code> over the same ledger window and compare the hash.</p>
</div>

<h2>Attestations</h2>
<div class="card">
<table>
<thead><tr><th>Week</th><th>Status</th><th>Reserve USD</th><th>Document</th><th>Signed by</th><th>When</th></tr></thead>
<tbody>
{attestation_rows}
</tbody>
</table>
</div>
{reserve_section}{distribution_section}
<h2>Records (embedded)</h2>
<div class="card">
  <p class="footer">The full record set is embedded below for verification. Do not edit.</p>
  <script type="application/json" id="attestation-records">{json_embed}</script>
</div>

<div class="footer">
  <p>Read-only reconciliation; verifies signatures, never submits transactions.</p>
</div>
</body>
</html>"#,
        created = escape_html(&data.generated_at),
        total = data.attestations.len(),
        verified = verified,
        recorded = recorded,
        invalid = invalid,
        hash = hash_escaped,
        attestation_rows = attestation_rows,
        reserve_section = reserve_section,
        distribution_section = distribution_section,
        json_embed = json_escaped,
    );
    Ok(html)
}

fn count_status(attestations: &[Attestation], status: Status) -> usize {
    attestations.iter().filter(|a| a.status == status).count()
}

fn status_badge(status: Status) -> String {
    let class = match status {
        Status::Verified => "ok",
        Status::Recorded => "warn",
        Status::Invalid => "bad",
        Status::Pending => "pend",
    };
    format!(r#"<span class="badge {class}">{status}</span>"#)
}

fn attestation_rows(attestations: &[Attestation]) -> String {
    if attestations.is_empty() {
        return r#"<tr><td colspan="6">No attestations in this window.</td></tr>"#.to_string();
    }
    let mut rows = String::new();
    for a in attestations {
        let _ = write!(
            rows,
            "<tr><td>{week}</td><td>{badge}</td><td>{reserve:.2}</td><td class=\"mono\">{cid}</td><td class=\"mono\">{signer}</td><td>{ts}</td></tr>\n",
            week = a.week,
            badge = status_badge(a.status),
            reserve = a.reserve_usd,
            cid = escape_html(&a.metadata_cid),
            signer = escape_html(&a.signed_by),
            ts = escape_html(&a.ts),
        );
    }
    rows
}

fn reserve_section(proofs: &[ReserveProofRecord]) -> String {
    if proofs.is_empty() {
        return String::new();
    }
    let mut rows = String::new();
    for p in proofs {
        let _ = write!(
            rows,
            "<tr><td>{badge}</td><td class=\"mono\">{cid}</td><td class=\"mono\">{tx}</td><td>{ts}</td></tr>\n",
            badge = status_badge(p.status),
            cid = escape_html(&p.cid),
            tx = escape_html(&p.tx_hash),
            ts = escape_html(&p.ts),
        );
    }
    format!(
        r#"
<h2>Reserve proofs</h2>
<div class="card">
<table>
<thead><tr><th>Status</th><th>Document</th><th>Transaction</th><th>When</th></tr></thead>
<tbody>
{rows}
</tbody>
</table>
</div>"#
    )
}

fn distribution_section(data: &ReportData) -> String {
    let Some(dist) = data.distribution.as_ref() else {
        return String::new();
    };
    let mut rows = String::new();
    for p in &dist.payouts {
        let _ = write!(
            rows,
            "<tr><td class=\"mono\">{account}</td><td class=\"mono\">{amount} {asset}</td><td>{share:.4}%</td></tr>\n",
            account = escape_html(&p.account),
            amount = format_amount(p.amount),
            asset = p.asset,
            share = p.share * 100.0,
        );
    }
    format!(
        r#"
<h2>Distribution</h2>
<div class="card">
<table>
<thead><tr><th>Account</th><th>Payout</th><th>Share</th></tr></thead>
<tbody>
{rows}
</tbody>
</table>
  <div class="grid" style="margin-top:0.5rem">
    <span class="label">Total paid</span><span class="mono">{total}</span>
    <span class="label">Dropped (under one stroop)</span><span>{dropped}</span>
  </div>
</div>"#,
        rows = rows,
        total = format_amount(dist.total_paid),
        dropped = dist.under_stroop_dropped,
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_json_in_html(s: &str) -> String {
    escape_html(s)
}

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "io: {}", e),
            ReportError::Json(e) => write!(f, "json: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

#[cfg(test)]
mod tests {
    use super::*;
    use attestor::{calculate_distribution, Asset, IpfsPointer, SpvHolder};

    fn attestation(status: Status) -> Attestation {
        Attestation {
            week: 12,
            reserve_usd: 250000.0,
            ipfs: IpfsPointer {
                hash: "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4".to_string(),
                url: "https://ipfs.io/ipfs/QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4"
                    .to_string(),
                mime: Some("application/json".to_string()),
                size: None,
            },
            metadata_cid: "QmaozNR7DZHQK1ZcU9p7QdrshMvXqWK6gpu5rmrkPdT3L4".to_string(),
            proof_cid: None,
            memo_hash_hex: None,
            signed_by: "GCUSTODIAN".to_string(),
            signature: String::new(),
            signature_type: "ed25519".to_string(),
            nonce: "nonce-12345678".to_string(),
            status,
            ts: "2024-03-08T00:00:00Z".to_string(),
            tx_hash: "tx1".to_string(),
            request_cid: None,
            request_memo_hash_hex: None,
            status_reason: None,
            metadata_fetch_failed: false,
            signature_count: Some(1),
            fee_xlm: Some(0.00001),
            tx_source_account: Some("GSOURCE".to_string()),
        }
    }

    fn report(attestations: Vec<Attestation>) -> ReportData {
        ReportData::assemble(attestations, Vec::new(), None)
    }

    #[test]
    fn build_html_renders_counts_and_badges() {
        let data = report(vec![
            attestation(Status::Verified),
            attestation(Status::Recorded),
        ]);
        let html = build_html(&data).unwrap();
        assert!(html.contains("Custody Attestation Report"));
        assert!(html.contains(r#"<span class="badge ok">Verified</span>"#));
        assert!(html.contains(r#"<span class="badge warn">Recorded</span>"#));
        assert!(html.contains("attestation-records"));
        assert!(html.contains(&data.reproducibility_hash_sha256));
    }

    #[test]
    fn empty_window_still_renders() {
        let html = build_html(&report(Vec::new())).unwrap();
        assert!(html.contains("No attestations in this window."));
        assert!(!html.contains("Reserve proofs"));
        assert!(!html.contains("<h2>Distribution</h2>"));
    }

    #[test]
    fn signer_names_are_escaped() {
        let mut a = attestation(Status::Verified);
        a.signed_by = "<script>alert(1)</script>".to_string();
        let html = build_html(&report(vec![a])).unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn distribution_section_lists_payouts() {
        let holders = vec![
            SpvHolder {
                account: "GA".to_string(),
                balance: 60.0,
            },
            SpvHolder {
                account: "GB".to_string(),
                balance: 40.0,
            },
        ];
        let dist = calculate_distribution(&holders, 100.0, Asset::Usdc).unwrap();
        let data = ReportData::assemble(vec![attestation(Status::Verified)], Vec::new(), Some(dist));
        let html = build_html(&data).unwrap();
        assert!(html.contains("<h2>Distribution</h2>"));
        assert!(html.contains("60.0000000 USDC"));
        assert!(html.contains("Total paid"));
    }
}
