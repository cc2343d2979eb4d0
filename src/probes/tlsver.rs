//! TLS-version probe: raw TLS to a fixed front-end with the candidate's
//! identity as SNI, client offer capped at TLS 1.2, recording what the
//! front actually negotiates under that ceiling.

use crate::probes::{TLS_CONNECT_TIMEOUT, TLS_FRONT_HOST, TLS_FRONT_PORT, TLS_IDLE_TIMEOUT};
use crate::types::{Candidate, Outcome, ProbeResult, TlsHit};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpStream;
use tokio::time;
use tokio_rustls::rustls::client::{ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::{self, ProtocolVersion, ServerName};
use tokio_rustls::TlsConnector;

/// Certificate verification is disabled for this probe: the SNI is an
/// arbitrary candidate identity and never matches the front-end's cert.
struct NoVerify;

impl ServerCertVerifier for NoVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// Connector with the maximum offered protocol version pinned to TLS 1.2.
pub fn build_connector() -> Result<TlsConnector> {
    let config = rustls::ClientConfig::builder()
        .with_safe_default_cipher_suites()
        .with_safe_default_kx_groups()
        .with_protocol_versions(&[&rustls::version::TLS12])
        .context("TLS 1.2 not available in this build")?
        .with_custom_certificate_verifier(Arc::new(NoVerify))
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

fn protocol_label(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_0 => "TLSv1.0".to_string(),
        ProtocolVersion::TLSv1_1 => "TLSv1.1".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        other => format!("{other:?}"),
    }
}

/// Suffix-match a negotiated-protocol string against `TLSv<major>.<minor>`
/// and return the matched suffix. No match means no result.
pub fn extract_tls_version(s: &str) -> Option<String> {
    let idx = s.rfind("TLSv")?;
    let tail = &s[idx..];
    let rest = tail.as_bytes();
    // "TLSv" + digit + '.' + digit, anchored at the end of the string.
    if rest.len() == 7 && rest[4].is_ascii_digit() && rest[5] == b'.' && rest[6].is_ascii_digit() {
        Some(tail.to_string())
    } else {
        None
    }
}

/// Probe the negotiated TLS version for one candidate's SNI.
///
/// Connect and handshake each carry a 3s deadline; either expiring tears the
/// socket down and is Ignored, as is any transport or handshake failure.
pub async fn probe(connector: &TlsConnector, cand: &Candidate) -> Outcome {
    let identity = cand.identity().to_string();
    let server_name = match ServerName::try_from(identity.as_str()) {
        Ok(name) => name,
        Err(e) => return Outcome::AdapterError(format!("bad server name {identity:?}: {e}")),
    };

    let tcp = match time::timeout(
        TLS_CONNECT_TIMEOUT,
        TcpStream::connect((TLS_FRONT_HOST, TLS_FRONT_PORT)),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        _ => return Outcome::Ignored,
    };

    let stream = match time::timeout(TLS_IDLE_TIMEOUT, connector.connect(server_name, tcp)).await {
        Ok(Ok(stream)) => stream,
        // Handshake failure or idle expiry; the socket drops either way.
        _ => return Outcome::Ignored,
    };

    let (_, conn) = stream.get_ref();
    let negotiated = match conn.protocol_version() {
        Some(v) => protocol_label(v),
        None => return Outcome::Ignored,
    };
    match extract_tls_version(&negotiated) {
        Some(protocol_version) => Outcome::Accepted(ProbeResult::Tls(TlsHit {
            domain: identity,
            protocol_version,
        })),
        None => Outcome::Ignored,
    }
}
