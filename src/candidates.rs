use crate::probes::known_cdn;
use crate::types::{Candidate, ProbeResult};
use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::path::Path;

/// Default concurrency ceiling for every scan kind except upgrade.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Divisor for the upgrade scan's derived concurrency limit. Roughly the
/// number of prior CDN hits one upgrade slot is expected to work through.
const UPGRADE_SCAN_ESTIMATE: f64 = 25.0;

/// Parse a candidate file's content: a JSON array of `{domain?, ip?}`
/// objects, optionally carrying prior-stage `statusCode`/`server` fields.
///
/// Entries with neither a domain nor an IP are rejected up front; a bad
/// candidate file aborts the run before any probing starts.
pub fn parse_candidates_str(s: &str) -> Result<Vec<Candidate>> {
    let candidates: Vec<Candidate> =
        serde_json::from_str(s).context("candidate file is not a JSON array of candidates")?;
    for (idx, c) in candidates.iter().enumerate() {
        if !c.is_valid() {
            bail!("candidate {idx}: needs at least one of \"domain\" or \"ip\"");
        }
    }
    Ok(candidates)
}

/// Load the candidate list from a file path. Errors if the file cannot be
/// read or parsed.
pub fn load_candidates_from_path(path: impl AsRef<Path>) -> Result<Vec<Candidate>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read candidate file: {}", path.as_ref().display()))?;
    parse_candidates_str(&content)
}

/// Write one scan kind's accumulated results as a pretty JSON array.
pub fn write_results_json(path: impl AsRef<Path>, results: &[ProbeResult]) -> Result<()> {
    let file = File::create(path.as_ref())
        .with_context(|| format!("failed to create output file: {}", path.as_ref().display()))?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}

/// Concurrency limit for the upgrade scan, derived from the prior direct
/// scan's per-provider hit counts. A zero (empty or tiny prior file) silently
/// falls back to the default of 8.
pub fn derive_upgrade_limit(prior: &[Candidate]) -> usize {
    let hits = prior
        .iter()
        .filter(|c| c.server.as_deref().and_then(known_cdn).is_some())
        .count();
    let derived = (hits as f64 / UPGRADE_SCAN_ESTIMATE).round() as usize;
    if derived == 0 {
        DEFAULT_CONCURRENCY
    } else {
        derived
    }
}
