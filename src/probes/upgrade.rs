//! Protocol-upgrade probe: a WebSocket handshake whose success signal
//! arrives on the error channel.
//!
//! Candidates here are plain-HTTP edges, so the handshake is expected to
//! fail; what matters is the status code embedded in the rejection. A 101
//! means some hop upgraded the connection for the fixed virtual host, which
//! is exactly the property being scanned for.

use crate::probes::UPGRADE_TIMEOUT;
use crate::types::{Candidate, CdnHit, Outcome, ProbeResult};
use tokio::time;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::HOST;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Status code decoded from a handshake failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    Status(u16),
    NoStatus,
}

/// Three-way classification of a failed handshake, before it is mapped onto
/// an [`Outcome`] for a concrete candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The rejection carried 101 Switching Protocols: the accepted case.
    Switching,
    /// An ordinary server rejection (the "unexpected server response"
    /// pattern with any other code). Expected, ignored.
    Rejected,
    /// Anything that matches no expected pattern.
    Opaque,
}

/// Decode a trailing numeric status code from a failure text such as
/// `"Unexpected server response: 403"`.
pub fn decode_status_text(text: &str) -> StatusSignal {
    let last = match text.split_whitespace().last() {
        Some(t) => t.trim_matches(|c: char| !c.is_ascii_digit()),
        None => return StatusSignal::NoStatus,
    };
    match last.parse::<u16>() {
        Ok(code) if (100..=599).contains(&code) => StatusSignal::Status(code),
        _ => StatusSignal::NoStatus,
    }
}

/// Classify a handshake failure by its text alone. The server-rejection
/// pattern is expected whether or not a status code could be decoded; only
/// a decoded 101 outranks it.
pub fn classify_failure_text(text: &str) -> FailureClass {
    match decode_status_text(text) {
        StatusSignal::Status(101) => FailureClass::Switching,
        _ if text.to_ascii_lowercase().contains("unexpected server response") => {
            FailureClass::Rejected
        }
        _ => FailureClass::Opaque,
    }
}

/// Classify a handshake error. The library reports an ordinary server
/// rejection structurally (`Error::Http`), which is its form of the
/// "unexpected server response" pattern; everything else goes through the
/// text decoder.
fn classify_failure(err: &WsError) -> FailureClass {
    match err {
        WsError::Http(resp) => {
            if resp.status().as_u16() == 101 {
                FailureClass::Switching
            } else {
                FailureClass::Rejected
            }
        }
        other => classify_failure_text(&other.to_string()),
    }
}

/// Attempt the upgrade handshake against one candidate.
///
/// Accepted re-emits the candidate's prior-stage fields (the upgrade scan's
/// candidate file is the direct scan's output). A clean handshake completion
/// is closed immediately and contributes nothing; so does the 3s deadline.
pub async fn probe(cand: &Candidate, vhost: &str) -> Outcome {
    let url = format!("ws://{}/", cand.identity());
    let mut request = match url.as_str().into_client_request() {
        Ok(r) => r,
        Err(e) => return Outcome::AdapterError(format!("bad handshake request: {e}")),
    };
    let host = match HeaderValue::from_str(vhost) {
        Ok(h) => h,
        Err(e) => return Outcome::AdapterError(format!("bad virtual host {vhost:?}: {e}")),
    };
    request.headers_mut().insert(HOST, host);

    match time::timeout(UPGRADE_TIMEOUT, connect_async(request)).await {
        Err(_) => Outcome::Ignored,
        Ok(Ok((mut ws, _))) => {
            // The candidate actually speaks WebSocket. Not what this scan
            // records; close and move on.
            let _ = ws.close(None).await;
            Outcome::Ignored
        }
        Ok(Err(err)) => match classify_failure(&err) {
            FailureClass::Switching => Outcome::Accepted(ProbeResult::Cdn(CdnHit {
                domain: cand.identity().to_string(),
                ip: cand.ip.clone(),
                status_code: cand.status_code.unwrap_or_default(),
                server: cand.server.clone().unwrap_or_default(),
            })),
            FailureClass::Rejected => Outcome::Ignored,
            FailureClass::Opaque => Outcome::AdapterError(format!("handshake: {err}")),
        },
    }
}
