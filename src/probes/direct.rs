//! Direct reachability probe: plain HTTP GET, classified by the `Server`
//! response header.

use crate::probes::known_cdn;
use crate::types::{Candidate, CdnHit, Outcome, ProbeResult};
use reqwest::header::SERVER;

/// GET `http://{identity}/` and accept iff the Server header prefix-matches
/// one of the recognized CDN providers.
///
/// Every transport failure, including the 3s deadline, is an expected miss:
/// Ignored, never logged. The client carries the deadline and the
/// no-redirect policy (see [`crate::probes::http_client`]).
pub async fn probe(client: &reqwest::Client, cand: &Candidate) -> Outcome {
    let url = format!("http://{}/", cand.identity());
    let resp = match client.get(&url).send().await {
        Ok(resp) => resp,
        Err(_) => return Outcome::Ignored,
    };

    let server = resp
        .headers()
        .get(SERVER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if known_cdn(server).is_none() {
        return Outcome::Ignored;
    }

    Outcome::Accepted(ProbeResult::Cdn(CdnHit {
        domain: cand.identity().to_string(),
        ip: cand.ip.clone(),
        status_code: resp.status().as_u16(),
        server: server.to_string(),
    }))
}
