//! Proxy-identity probe: asks a third-party checker whether the candidate
//! terminates TLS for the reference host.

use crate::probes::{REFERENCE_HOST, REFERENCE_PORT};
use crate::types::{Candidate, Outcome, ProbeResult, ProxyHit};
use serde::Deserialize;

/// Response body of the checker service. Location fields are optional on
/// the wire and default to empty.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ProxyReport {
    pub proxyip: bool,
    #[serde(rename = "City")]
    pub city: String,
    pub loc: String,
    pub colo: String,
}

/// Map a 200 report onto an outcome: a truthy proxy flag is the only
/// accepted shape.
pub fn classify_report(identity: &str, report: ProxyReport) -> Outcome {
    if !report.proxyip {
        return Outcome::Ignored;
    }
    Outcome::Accepted(ProbeResult::Proxy(ProxyHit {
        domain: identity.to_string(),
        city: report.city,
        country: report.loc,
        colo: report.colo,
        proxyip: true,
    }))
}

/// Query the checker for one candidate.
///
/// 200 + `proxyip: true` is Accepted; 429 is the one stream-fatal signal
/// (service-side rate limit) and halts further dispatch for this scan kind;
/// the 5s deadline and every other status are Ignored. A 200 body that does
/// not parse matches no expected pattern and is an adapter error.
pub async fn probe(client: &reqwest::Client, cand: &Candidate, checker_url: &str) -> Outcome {
    let identity = cand.identity().to_string();
    let port = REFERENCE_PORT.to_string();
    let resp = match client
        .get(checker_url)
        .query(&[
            ("proxyip", identity.as_str()),
            ("host", REFERENCE_HOST),
            ("port", port.as_str()),
            ("tls", "true"),
        ])
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(_) => return Outcome::Ignored,
    };

    match resp.status().as_u16() {
        429 => Outcome::StreamFatal("checker rate limit (429)".to_string()),
        200 => match resp.json::<ProxyReport>().await {
            Ok(report) => classify_report(&identity, report),
            Err(e) => Outcome::AdapterError(format!("checker body: {e}")),
        },
        _ => Outcome::Ignored,
    }
}
