use std::path::PathBuf;

use cdn_scan_rs::candidates::{self, DEFAULT_CONCURRENCY};
use cdn_scan_rs::probes::{
    self, direct, proxyid, tlsver, upgrade, DEFAULT_CHECKER_URL, DEFAULT_UPGRADE_VHOST,
    DIRECT_TIMEOUT, PROXYID_TIMEOUT,
};
use cdn_scan_rs::types::{ProbeResult, ScanKind};
use cdn_scan_rs::{engine, view};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// cdn-scan-rs - classify candidate endpoints by fronting CDN, upgrade
/// handshake, proxy identity, and negotiated TLS version.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cdn-scan-rs",
    version,
    about = "Probe candidate endpoints: CDN fronting, upgrade handshake, proxy identity, TLS version.",
    long_about = None
)]
struct Cli {
    /// Which probe strategy to run.
    #[arg(value_enum)]
    kind: ScanKind,

    /// Candidate file (JSON array). Defaults per kind; the upgrade scan
    /// defaults to the direct scan's output file.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Write accepted results as pretty JSON to this path.
    /// Defaults to <kind>_results.json.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Max concurrently outstanding probes. The upgrade scan ignores this
    /// and derives its own limit from the prior direct results.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Proxy-identity checker endpoint.
    #[arg(long, default_value = DEFAULT_CHECKER_URL)]
    checker_url: String,

    /// Virtual Host header sent on upgrade handshakes.
    #[arg(long, default_value = DEFAULT_UPGRADE_VHOST)]
    ws_host: String,

    /// Disable the live terminal view and progress bar.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let input = cli
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(cli.kind.default_input()));
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(cli.kind.default_output()));

    // Missing or unreadable candidates abort before any probing begins.
    let cands = candidates::load_candidates_from_path(&input)?;

    let limit = match cli.kind {
        ScanKind::Upgrade => candidates::derive_upgrade_limit(&cands),
        _ => cli.concurrency,
    };

    println!("cdn-scan-rs configuration:");
    println!("  kind         : {}", cli.kind);
    println!("  input        : {} ({} candidates)", input.display(), cands.len());
    println!("  output       : {}", output.display());
    println!("  concurrency  : {limit}");

    let (view, render) = if cli.quiet {
        (None, None)
    } else {
        let (v, handle) = view::spawn(cli.kind, cands.len() as u64);
        (Some(v), Some(handle))
    };

    let results = run_kind(&cli, cands, limit, view).await?;

    if let Some(handle) = render {
        // All view handles are gone once the scan returns; wait for the
        // final frame.
        let _ = handle.await;
    }

    candidates::write_results_json(&output, &results)
        .with_context(|| format!("failed to persist {} results", cli.kind))?;
    println!(
        "\n{} scan finished: {} accepted, written to {}",
        cli.kind,
        results.len(),
        output.display()
    );
    Ok(())
}

async fn run_kind(
    cli: &Cli,
    cands: Vec<cdn_scan_rs::types::Candidate>,
    limit: usize,
    view: Option<view::View>,
) -> Result<Vec<ProbeResult>> {
    match cli.kind {
        ScanKind::Direct => {
            let client = probes::http_client(DIRECT_TIMEOUT).context("failed to build HTTP client")?;
            engine::run_scan(cands, limit, view, move |cand| {
                let client = client.clone();
                async move { direct::probe(&client, &cand).await }
            })
            .await
        }
        ScanKind::Upgrade => {
            let vhost = cli.ws_host.clone();
            engine::run_scan(cands, limit, view, move |cand| {
                let vhost = vhost.clone();
                async move { upgrade::probe(&cand, &vhost).await }
            })
            .await
        }
        ScanKind::Proxyip => {
            let client =
                probes::http_client(PROXYID_TIMEOUT).context("failed to build HTTP client")?;
            let checker = cli.checker_url.clone();
            engine::run_scan(cands, limit, view, move |cand| {
                let client = client.clone();
                let checker = checker.clone();
                async move { proxyid::probe(&client, &cand, &checker).await }
            })
            .await
        }
        ScanKind::Tls => {
            let connector = tlsver::build_connector()?;
            engine::run_scan(cands, limit, view, move |cand| {
                let connector = connector.clone();
                async move { tlsver::probe(&connector, &cand).await }
            })
            .await
        }
    }
}
