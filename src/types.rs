use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One endpoint to probe, as produced by a prior discovery stage.
///
/// At least one of `domain`/`ip` is present. The trailing optional fields
/// appear when the candidate list is itself a previous direct-scan output
/// file (the upgrade scan reads that file as its candidate source and copies
/// these fields into its own results).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

impl Candidate {
    /// Display/probing identity: the domain when present, otherwise the IP.
    pub fn identity(&self) -> &str {
        self.domain
            .as_deref()
            .or(self.ip.as_deref())
            .unwrap_or_default()
    }

    pub fn is_valid(&self) -> bool {
        self.domain.is_some() || self.ip.is_some()
    }
}

/// A host answering plain HTTP behind one of the recognized CDNs.
/// Emitted by the direct scan, and re-emitted by the upgrade scan for
/// candidates whose handshake rejection carries status 101.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CdnHit {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub status_code: u16,
    pub server: String,
}

/// A host the third-party checker confirms as a TLS-terminating proxy for
/// the reference host, with the location fields it reports.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProxyHit {
    pub domain: String,
    pub city: String,
    pub country: String,
    pub colo: String,
    pub proxyip: bool,
}

/// The TLS version the fixed front-end negotiated for a candidate's SNI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsHit {
    pub domain: String,
    pub protocol_version: String,
}

/// One accepted classification. Each scan kind only ever produces one
/// variant, so persisted arrays stay homogeneous; untagged keeps the wire
/// shape identical to the per-variant structs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ProbeResult {
    Cdn(CdnHit),
    Proxy(ProxyHit),
    Tls(TlsHit),
}

impl ProbeResult {
    pub fn domain(&self) -> &str {
        match self {
            ProbeResult::Cdn(h) => &h.domain,
            ProbeResult::Proxy(h) => &h.domain,
            ProbeResult::Tls(h) => &h.domain,
        }
    }
}

/// Terminal classification of one probe. Every probe reaches exactly one of
/// these; only `Accepted` contributes to the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(ProbeResult),
    /// Expected miss (timeout, refusal, non-matching response). No result,
    /// no log.
    Ignored,
    /// Outcome matching no expected pattern. Logged at error level, scan
    /// continues.
    AdapterError(String),
    /// Service-side signal that must stop further dispatch for this scan
    /// kind while keeping already-accumulated results.
    StreamFatal(String),
}

/// Which of the four probe strategies to run.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Plain HTTP reachability, classified by Server header.
    Direct,
    /// WebSocket upgrade handshake against prior direct-scan hits.
    Upgrade,
    /// Third-party proxy-identity verification.
    Proxyip,
    /// Negotiated TLS version via a fixed front-end, SNI per candidate.
    Tls,
}

impl ScanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Direct => "direct",
            ScanKind::Upgrade => "upgrade",
            ScanKind::Proxyip => "proxyip",
            ScanKind::Tls => "tls",
        }
    }

    /// Default candidate file. The upgrade scan feeds on the direct scan's
    /// output rather than the raw discovery list.
    pub fn default_input(&self) -> &'static str {
        match self {
            ScanKind::Upgrade => "direct_results.json",
            _ => "candidates.json",
        }
    }

    pub fn default_output(&self) -> String {
        format!("{}_results.json", self.as_str())
    }
}

impl std::fmt::Display for ScanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
