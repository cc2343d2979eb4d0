//! The four probe adapters. Each takes one candidate, performs one
//! bounded-deadline network operation, and classifies the result into an
//! [`crate::types::Outcome`]; the engine never retries.

pub mod direct;
pub mod proxyid;
pub mod tlsver;
pub mod upgrade;

use std::time::Duration;

/// The two recognized CDN provider names, matched case-insensitively by
/// prefix against server-identification strings.
pub const CDN_PROVIDERS: [&str; 2] = ["cloudflare", "cloudfront"];

/// Default third-party proxy-identity checker.
pub const DEFAULT_CHECKER_URL: &str = "https://check.proxyip.workers.dev/api";

/// Reference host the checker verifies candidates against.
pub const REFERENCE_HOST: &str = "speed.cloudflare.com";
pub const REFERENCE_PORT: u16 = 443;

/// Fixed virtual host sent on upgrade handshakes. A fronting edge that
/// forwards WebSocket traffic for this host answers 101.
pub const DEFAULT_UPGRADE_VHOST: &str = "cdn-scan.pages.dev";

/// Fixed TLS front-end dialed by the tls-version scan; the candidate only
/// contributes the SNI.
pub const TLS_FRONT_HOST: &str = "speed.cloudflare.com";
pub const TLS_FRONT_PORT: u16 = 443;

pub const DIRECT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const UPGRADE_TIMEOUT: Duration = Duration::from_millis(3000);
pub const PROXYID_TIMEOUT: Duration = Duration::from_millis(5000);
pub const TLS_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const TLS_IDLE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Match a server-identification string against the recognized providers.
/// Returns the canonical provider name on a case-insensitive prefix match.
pub fn known_cdn(server: &str) -> Option<&'static str> {
    let lower = server.to_ascii_lowercase();
    CDN_PROVIDERS
        .iter()
        .find(|p| lower.starts_with(*p))
        .copied()
}

/// Shared HTTP client for the direct and proxy-identity adapters. Redirects
/// are never followed; the classification wants the edge's own answer.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}
