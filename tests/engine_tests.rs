use cdn_scan_rs::engine::{run_scan, run_scan_with_shared, SharedProgress};
use cdn_scan_rs::types::{Candidate, CdnHit, Outcome, ProbeResult};
use cdn_scan_rs::view::{View, ViewEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn candidates(n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|i| Candidate {
            domain: Some(format!("h{i}.example")),
            ..Default::default()
        })
        .collect()
}

fn hit(domain: &str) -> ProbeResult {
    ProbeResult::Cdn(CdnHit {
        domain: domain.into(),
        ip: None,
        status_code: 200,
        server: "cloudflare".into(),
    })
}

#[tokio::test]
async fn dispatches_each_candidate_once_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log2 = log.clone();
    let shared = SharedProgress::new();

    // limit 1 serializes the probes, so the invocation log is the dispatch
    // order.
    let results = run_scan_with_shared(
        candidates(6),
        1,
        None,
        move |cand| {
            let log = log2.clone();
            async move {
                log.lock().unwrap().push(cand.identity().to_string());
                Outcome::Ignored
            }
        },
        shared.clone(),
    )
    .await
    .unwrap();

    assert!(results.is_empty());
    assert_eq!(shared.dispatched.load(Ordering::Relaxed), 6);
    assert_eq!(shared.completed.load(Ordering::Relaxed), 6);
    let seen = log.lock().unwrap().clone();
    assert_eq!(
        seen,
        (0..6).map(|i| format!("h{i}.example")).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn in_flight_never_exceeds_the_limit() {
    let current = Arc::new(AtomicU64::new(0));
    let peak = Arc::new(AtomicU64::new(0));
    let (current2, peak2) = (current.clone(), peak.clone());

    run_scan(candidates(24), 4, None, move |_cand| {
        let current = current2.clone();
        let peak = peak2.clone();
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Outcome::Ignored
        }
    })
    .await
    .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 4, "peak = {}", peak.load(Ordering::SeqCst));
    assert!(peak.load(Ordering::SeqCst) > 1, "scan never overlapped probes");
}

#[tokio::test]
async fn drain_completes_before_results_are_returned() {
    let shared = SharedProgress::new();
    let results = run_scan_with_shared(
        candidates(10),
        3,
        None,
        move |cand| async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            Outcome::Accepted(hit(cand.identity()))
        },
        shared.clone(),
    )
    .await
    .unwrap();

    // Every probe is terminal before persistence can happen.
    assert_eq!(shared.in_flight.load(Ordering::Relaxed), 0);
    assert_eq!(shared.completed.load(Ordering::Relaxed), 10);
    assert_eq!(results.len(), 10);
}

#[tokio::test]
async fn accumulator_orders_by_completion_not_dispatch() {
    // Later candidates finish sooner: candidate i sleeps (5 - i) * 30 ms.
    let results = run_scan(candidates(5), 5, None, move |cand| async move {
        let idx: u64 = cand.identity()[1..2].parse().unwrap();
        tokio::time::sleep(Duration::from_millis((5 - idx) * 30)).await;
        Outcome::Accepted(hit(cand.identity()))
    })
    .await
    .unwrap();

    let order: Vec<&str> = results.iter().map(|r| r.domain()).collect();
    assert_eq!(
        order,
        vec![
            "h4.example",
            "h3.example",
            "h2.example",
            "h1.example",
            "h0.example"
        ]
    );
}

#[tokio::test]
async fn only_accepted_outcomes_reach_the_accumulator() {
    let results = run_scan(candidates(8), 2, None, move |cand| async move {
        let idx: u64 = cand.identity()[1..2].parse().unwrap();
        match idx % 4 {
            0 => Outcome::Accepted(hit(cand.identity())),
            1 => Outcome::Ignored,
            2 => Outcome::AdapterError("simulated mismatch".into()),
            _ => Outcome::Ignored,
        }
    })
    .await
    .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| {
        let idx: u64 = r.domain()[1..2].parse().unwrap();
        idx % 4 == 0
    }));
}

#[tokio::test]
async fn stream_fatal_halts_dispatch_and_keeps_prior_entries() {
    let invocations = Arc::new(AtomicU64::new(0));
    let invocations2 = invocations.clone();
    let shared = SharedProgress::new();

    let results = run_scan_with_shared(
        candidates(10),
        1,
        None,
        move |cand| {
            let invocations = invocations2.clone();
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                let idx: u64 = cand.identity()[1..2].parse().unwrap();
                if idx == 2 {
                    Outcome::StreamFatal("rate limited (429)".into())
                } else {
                    Outcome::Accepted(hit(cand.identity()))
                }
            }
        },
        shared.clone(),
    )
    .await
    .unwrap();

    // Candidates 0 and 1 were accepted before the fatal signal on 2; with
    // limit 1, nothing after 2 is ever dispatched.
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert_eq!(shared.dispatched.load(Ordering::Relaxed), 3);
    assert_eq!(shared.in_flight.load(Ordering::Relaxed), 0);
    let order: Vec<&str> = results.iter().map(|r| r.domain()).collect();
    assert_eq!(order, vec!["h0.example", "h1.example"]);
}

#[tokio::test]
async fn replay_with_deterministic_probe_is_idempotent() {
    let run = || async {
        run_scan(candidates(9), 1, None, move |cand| async move {
            let idx: u64 = cand.identity()[1..2].parse().unwrap();
            if idx % 2 == 0 {
                Outcome::Accepted(hit(cand.identity()))
            } else {
                Outcome::Ignored
            }
        })
        .await
        .unwrap()
    };

    let first = serde_json::to_string(&run().await).unwrap();
    let second = serde_json::to_string(&run().await).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn view_receives_dispatches_in_order_and_hits_on_accept() {
    let (view, mut rx) = View::channel();
    run_scan(candidates(4), 1, Some(view), move |cand| async move {
        let idx: u64 = cand.identity()[1..2].parse().unwrap();
        if idx == 1 {
            Outcome::Accepted(hit(cand.identity()))
        } else {
            Outcome::Ignored
        }
    })
    .await
    .unwrap();

    let mut dispatches = Vec::new();
    let mut hits = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        match ev {
            ViewEvent::Dispatch(id) => dispatches.push(id),
            ViewEvent::Hit(r) => hits.push(r.domain().to_string()),
        }
    }
    assert_eq!(
        dispatches,
        vec!["h0.example", "h1.example", "h2.example", "h3.example"]
    );
    assert_eq!(hits, vec!["h1.example"]);
}
