//! Live terminal view: a height-bounded result frame redrawn in place,
//! plus a one-line progress bar advanced once per dispatch.
//!
//! The renderer is decoupled from probing: the engine pushes events over a
//! channel and a dedicated task rebuilds the frame, so no probe ever blocks
//! on terminal I/O.

use crate::probes::known_cdn;
use crate::types::{ProbeResult, ScanKind};
use colored::Colorize;
use crossterm::{cursor, execute, terminal};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::stderr;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// What the engine reports while a scan runs.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    /// A candidate is being dispatched; carries its display identity.
    Dispatch(String),
    /// A probe was accepted into the accumulator.
    Hit(ProbeResult),
}

/// Cheap cloneable handle the engine uses to feed the renderer. Dropping
/// every handle ends the render task.
#[derive(Clone, Debug)]
pub struct View {
    tx: UnboundedSender<ViewEvent>,
}

impl View {
    /// Raw channel, for wiring a custom consumer (tests use this).
    pub fn channel() -> (View, UnboundedReceiver<ViewEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (View { tx }, rx)
    }

    pub fn dispatch(&self, identity: String) {
        let _ = self.tx.send(ViewEvent::Dispatch(identity));
    }

    pub fn hit(&self, result: ProbeResult) {
        let _ = self.tx.send(ViewEvent::Hit(result));
    }
}

/// Spawn the render task for one scan of `total` candidates. The handle
/// resolves once every [`View`] clone is dropped, i.e. after the drain phase.
pub fn spawn(kind: ScanKind, total: u64) -> (View, JoinHandle<()>) {
    let (view, rx) = View::channel();
    let handle = tokio::spawn(render_loop(kind, total, rx));
    (view, handle)
}

async fn render_loop(kind: ScanKind, total: u64, mut rx: UnboundedReceiver<ViewEvent>) {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut results: Vec<ProbeResult> = Vec::new();
    let mut probing: Option<String> = None;
    let mut frame_height = 0usize;

    while let Some(ev) = rx.recv().await {
        match ev {
            ViewEvent::Dispatch(identity) => {
                pb.inc(1);
                pb.set_message(identity.clone());
                probing = Some(identity);
            }
            ViewEvent::Hit(result) => results.push(result),
        }

        let rows = terminal::size().map(|(_, h)| h as usize).unwrap_or(24);
        // Leave room for the progress line under the frame.
        let frame = build_frame(kind, &results, probing.as_deref(), rows.saturating_sub(1));
        pb.suspend(|| redraw(&frame, &mut frame_height));
    }

    pb.finish_with_message("done");
}

/// Replace the previously printed frame in place on stderr.
fn redraw(frame: &[String], prev_height: &mut usize) {
    let mut err = stderr();
    if *prev_height > 0 {
        let _ = execute!(
            err,
            cursor::MoveUp(*prev_height as u16),
            terminal::Clear(terminal::ClearType::FromCursorDown),
        );
    }
    for line in frame {
        eprintln!("{line}");
    }
    *prev_height = frame.len();
}

/// Build one frame: header, one row per accumulated result, a labeled
/// preview of the candidate being dispatched, and a trailing blank row.
/// Result rows are trimmed oldest-first (from just below the header) until
/// the frame fits `max_rows`.
pub fn build_frame(
    kind: ScanKind,
    results: &[ProbeResult],
    probing: Option<&str>,
    max_rows: usize,
) -> Vec<String> {
    let mut frame = Vec::with_capacity(results.len() + 3);
    frame.push(format!("{} scan: {} accepted", kind, results.len()).bold().to_string());
    for r in results {
        frame.push(render_row(r));
    }
    frame.push(format!("probing: {}", probing.unwrap_or("-")));
    frame.push(String::new());

    // Header, probing line, and blank row always survive trimming.
    let floor = 3;
    while frame.len() > max_rows.max(floor) && frame.len() > floor {
        frame.remove(1);
    }
    frame
}

fn render_row(result: &ProbeResult) -> String {
    match result {
        ProbeResult::Cdn(h) => {
            let line = format!("  {}  [{}]  {}", h.domain, h.status_code, h.server);
            match known_cdn(&h.server) {
                Some("cloudflare") => line.yellow().to_string(),
                Some("cloudfront") => line.blue().to_string(),
                _ => line,
            }
        }
        ProbeResult::Proxy(h) => format!(
            "  {}  {} {} ({})",
            h.domain, h.city, h.country, h.colo
        )
        .green()
        .to_string(),
        ProbeResult::Tls(h) => format!("  {}  {}", h.domain, h.protocol_version)
            .cyan()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CdnHit, TlsHit};

    fn cdn(domain: &str, server: &str) -> ProbeResult {
        ProbeResult::Cdn(CdnHit {
            domain: domain.into(),
            ip: None,
            status_code: 403,
            server: server.into(),
        })
    }

    #[test]
    fn frame_has_header_preview_and_trailing_blank() {
        colored::control::set_override(false);
        let results = vec![cdn("a.example", "cloudflare")];
        let frame = build_frame(ScanKind::Direct, &results, Some("b.example"), 24);
        assert_eq!(frame.len(), 4);
        assert!(frame[0].contains("direct scan"));
        assert!(frame[1].contains("a.example"));
        assert_eq!(frame[2], "probing: b.example");
        assert_eq!(frame[3], "");
    }

    #[test]
    fn frame_trims_oldest_rows_below_header() {
        colored::control::set_override(false);
        let results: Vec<ProbeResult> = (0..10)
            .map(|i| cdn(&format!("h{i}.example"), "cloudfront"))
            .collect();
        let frame = build_frame(ScanKind::Direct, &results, None, 6);
        assert_eq!(frame.len(), 6);
        // Oldest rows h0..h6 were trimmed; newest survive.
        assert!(frame[1].contains("h7.example"));
        assert!(frame[2].contains("h8.example"));
        assert!(frame[3].contains("h9.example"));
        assert_eq!(frame[4], "probing: -");
        assert_eq!(frame[5], "");
    }

    #[test]
    fn frame_never_trims_past_the_fixed_rows() {
        colored::control::set_override(false);
        let results = vec![ProbeResult::Tls(TlsHit {
            domain: "a.example".into(),
            protocol_version: "TLSv1.2".into(),
        })];
        let frame = build_frame(ScanKind::Tls, &results, Some("next"), 0);
        assert_eq!(frame.len(), 3);
        assert!(frame[0].contains("tls scan"));
        assert_eq!(frame[1], "probing: next");
        assert_eq!(frame[2], "");
    }
}
