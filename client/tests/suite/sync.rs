//! Sync engine semantics: coalescing, ordering, stale-while-revalidate,
//! optimistic injection, and the polling timer. Interleavings are driven
//! deterministically through the gated fetcher.

use std::time::Duration;

use autoqa_client::{
    ResourceKey, RunRecord, SyncEngine, Transport, TransportError,
};
use client_test_support::{
    GatedFetcher, sample_runs_body, snapshot_run_ids, wait_for_snapshot,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_with(fetcher: std::sync::Arc<GatedFetcher>) -> SyncEngine {
    SyncEngine::new(fetcher, Duration::from_millis(25))
}

#[tokio::test]
async fn subscriber_sees_empty_snapshot_immediately_then_updates() {
    let fetcher = GatedFetcher::ungated();
    let engine = engine_with(fetcher.clone());

    let mut receiver = engine.subscribe(ResourceKey::Runs);
    let initial = receiver.borrow().clone();
    assert!(initial.is_empty());
    assert_eq!(initial.revision, 0);

    fetcher.push_runs(&["r1"]);
    engine.refresh(ResourceKey::Runs).await;

    let updated = wait_for_snapshot(&mut receiver, |snapshot| !snapshot.is_empty()).await;
    assert_eq!(snapshot_run_ids(&updated), vec!["r1"]);
    assert!(updated.revision > initial.revision);
}

#[tokio::test]
async fn concurrent_refreshes_coalesce_into_one_fetch() {
    let fetcher = GatedFetcher::new();
    let engine = engine_with(fetcher.clone());
    fetcher.push_runs(&["r1"]);

    // join! polls in order: the first refresh registers its fetch, the
    // second joins it, and only then does the third arm open the gate.
    let (first, second, ()) = tokio::join!(
        engine.refresh(ResourceKey::Runs),
        engine.refresh(ResourceKey::Runs),
        async {
            fetcher.wait_until_started(1).await;
            fetcher.release(1);
        },
    );

    assert_eq!(fetcher.started(), 1);
    assert_eq!(snapshot_run_ids(&first), vec!["r1"]);
    assert_eq!(snapshot_run_ids(&second), vec!["r1"]);
}

#[tokio::test]
async fn coalescing_holds_over_live_http_too() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_runs_body())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = Transport::new(&server.uri(), Duration::from_secs(2)).expect("transport");
    let engine = SyncEngine::with_transport(transport, Duration::from_secs(5));

    let (first, second) = tokio::join!(
        engine.refresh(ResourceKey::Runs),
        engine.refresh(ResourceKey::Runs),
    );
    assert_eq!(first.runs().map(<[RunRecord]>::len), Some(3));
    assert_eq!(second, first);
    // The mock's expect(1) verifies the single request on drop.
}

#[tokio::test]
async fn failed_refresh_keeps_last_good_data_and_records_error() {
    let fetcher = GatedFetcher::ungated();
    let engine = engine_with(fetcher.clone());

    fetcher.push_runs(&["keep"]);
    engine.refresh(ResourceKey::Runs).await;

    fetcher.push_err(TransportError::Network {
        message: "backend not reachable: connection refused".to_string(),
    });
    let after_failure = engine.refresh(ResourceKey::Runs).await;

    assert_eq!(snapshot_run_ids(&after_failure), vec!["keep"]);
    assert!(matches!(
        after_failure.last_error,
        Some(TransportError::Network { .. })
    ));

    fetcher.push_runs(&["keep", "fresh"]);
    let recovered = engine.refresh(ResourceKey::Runs).await;
    assert_eq!(recovered.last_error, None);
    assert_eq!(snapshot_run_ids(&recovered), vec!["keep", "fresh"]);
}

#[tokio::test]
async fn invalidate_marks_stale_without_clearing_data() {
    let fetcher = GatedFetcher::ungated();
    let engine = engine_with(fetcher.clone());

    fetcher.push_runs(&["r1"]);
    engine.refresh(ResourceKey::Runs).await;

    engine.invalidate(ResourceKey::Runs);
    let stale = engine.snapshot(ResourceKey::Runs);
    assert!(stale.stale);
    assert_eq!(snapshot_run_ids(&stale), vec!["r1"]);

    fetcher.push_runs(&["r1"]);
    let refreshed = engine.refresh(ResourceKey::Runs).await;
    assert!(!refreshed.stale);
}

#[tokio::test]
async fn injected_run_survives_stale_poll_response() {
    let fetcher = GatedFetcher::new();
    let engine = engine_with(fetcher.clone());

    // A poll is in flight; its (stale) response is held at the gate.
    fetcher.push_runs(&["old"]);
    let poll = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh(ResourceKey::Runs).await }
    });
    fetcher.wait_until_started(1).await;

    // Action completes first and injects its confirmed run.
    let run = RunRecord::from_value(&json!({
        "runId": "injected",
        "status": "PASS",
        "startedAt": "2024-06-01T12:00:00",
    }));
    engine.inject_run(run);

    // The poll response arrives late and must be discarded wholesale.
    fetcher.release(1);
    let after_poll = poll.await.expect("poll refresh");

    assert_eq!(snapshot_run_ids(&after_poll), vec!["injected"]);
    assert_eq!(
        snapshot_run_ids(&engine.snapshot(ResourceKey::Runs)),
        vec!["injected"]
    );

    // The next poll reconciles the cache wholesale.
    fetcher.push_runs(&["injected", "old"]);
    fetcher.release(1);
    let reconciled = engine.refresh(ResourceKey::Runs).await;
    assert_eq!(snapshot_run_ids(&reconciled), vec!["injected", "old"]);
}

#[tokio::test]
async fn injection_notifies_subscribers() {
    let fetcher = GatedFetcher::ungated();
    let engine = engine_with(fetcher.clone());
    let mut receiver = engine.subscribe(ResourceKey::Runs);

    let run = RunRecord::from_value(&json!({"runId": "fresh", "status": "RUNNING"}));
    engine.inject_run(run);

    let seen = wait_for_snapshot(&mut receiver, |snapshot| !snapshot.is_empty()).await;
    assert_eq!(snapshot_run_ids(&seen), vec!["fresh"]);
}

#[tokio::test]
async fn poller_refreshes_immediately_then_on_cadence() {
    let fetcher = GatedFetcher::ungated();
    let engine = engine_with(fetcher.clone());

    let handle = engine.start_polling(&[ResourceKey::Runs]);
    fetcher.wait_until_started(1).await;

    // A few ticks at the 25ms cadence.
    fetcher.wait_until_started(3).await;
    assert!(!handle.is_paused());
    drop(handle);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let after_drop = fetcher.started();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(fetcher.started(), after_drop, "dropped poller must stop");
}

#[tokio::test]
async fn paused_poller_stops_and_resume_refreshes_immediately() {
    let fetcher = GatedFetcher::ungated();
    let engine = engine_with(fetcher.clone());

    let handle = engine.start_polling(&[ResourceKey::Runs]);
    fetcher.wait_until_started(1).await;

    handle.pause();
    assert!(handle.is_paused());
    // Let any tick that raced the pause drain before baselining.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let baseline = fetcher.started();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fetcher.started(), baseline, "paused poller must not fetch");

    handle.resume();
    assert!(!handle.is_paused());
    fetcher.wait_until_started(baseline + 1).await;
}

#[tokio::test]
async fn poller_covers_every_registered_key() {
    let fetcher = GatedFetcher::ungated();
    let engine = engine_with(fetcher.clone());

    let handle = engine.start_polling(&ResourceKey::ALL);
    // Immediate pass refreshes all three keys.
    fetcher.wait_until_started(3).await;
    drop(handle);
}
