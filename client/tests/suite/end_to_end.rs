//! Whole-client flows against a mock backend: a refresh feeding the metric
//! projections, the shared poller feeding every dashboard at once, and
//! artifact links resolving against the configured base.

use autoqa_client::{QaClient, ResourceKey, metrics};
use client_test_support::{
    mock_get, sample_analysis_body, sample_reports_body, sample_runs_body, snapshot_run_ids,
    test_config, wait_for_snapshot,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> QaClient {
    QaClient::new(test_config(&server.uri())).expect("build client")
}

#[tokio::test]
async fn refresh_feeds_the_metric_projections() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "/api/runs",
        json!({
            "r1": {
                "runId": "r1",
                "status": "PASS",
                "startedAt": "2024-01-01T00:00:00Z",
                "finishedAt": "2024-01-01T00:05:00Z"
            },
            "r2": {
                "runId": "r2",
                "status": "FAIL",
                "startedAt": "2024-01-02T00:00:00Z"
            }
        }),
    )
    .await;

    let client = client_for(&server).await;
    let snapshot = client.engine().refresh(ResourceKey::Runs).await;
    let runs = snapshot.runs().expect("runs cached");

    assert_eq!(metrics::pass_rate(runs), 50);
    let totals = metrics::run_totals(runs);
    assert_eq!(totals.total, 2);
    assert_eq!(totals.passed, 1);
    assert_eq!(totals.failed, 1);

    let latest = metrics::latest_run(runs).expect("non-empty");
    assert_eq!(latest.run_id, "r2");
    // Still unfinished, so no duration yet.
    assert_eq!(latest.duration_seconds(), None);
    // Newest first, so the finished run sits at index 1.
    assert_eq!(runs[1].duration_seconds(), Some(300));
}

#[tokio::test]
async fn one_poller_feeds_every_dashboard() {
    let server = MockServer::start().await;
    mock_get(&server, "/api/runs", sample_runs_body()).await;
    mock_get(&server, "/api/reports", sample_reports_body()).await;
    mock_get(&server, "/api/analysis/latest", sample_analysis_body()).await;

    let client = client_for(&server).await;
    let mut runs_rx = client.engine().subscribe(ResourceKey::Runs);
    let mut reports_rx = client.engine().subscribe(ResourceKey::Reports);
    let mut analysis_rx = client.engine().subscribe(ResourceKey::LatestAnalysis);

    let poller = client.engine().start_polling(&ResourceKey::ALL);
    let runs = wait_for_snapshot(&mut runs_rx, |s| !s.is_empty()).await;
    let reports = wait_for_snapshot(&mut reports_rx, |s| !s.is_empty()).await;
    let analysis = wait_for_snapshot(&mut analysis_rx, |s| !s.is_empty()).await;
    drop(poller);

    assert_eq!(
        snapshot_run_ids(&runs),
        ["run_20240103_c3", "run_20240102_b2", "run_20240101_a1"]
    );

    let reports = reports.reports().expect("reports cached");
    assert_eq!(reports[0].run_id, "run_20240102_b2");
    assert!(reports[0].has_json);
    assert!(!reports[0].has_pdf);

    let analysis = analysis.analysis().expect("analysis cached");
    assert_eq!(analysis.quality.readiness_score, 82);
    assert_eq!(analysis.risk_hotspots[0].module, "checkout");
    assert_eq!(
        metrics::coverage_percent(analysis.coverage.happy, 100.0),
        45
    );
}

#[tokio::test]
async fn approved_scenario_is_absent_until_one_exists() {
    let server = MockServer::start().await;
    // The backend answers an empty object before any approval.
    Mock::given(method("GET"))
        .and(path("/api/scenario/approved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/scenario/approved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Checkout happy path",
            "kind": "happy",
            "actions": []
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert_eq!(client.approved_scenario().await.expect("reachable"), None);

    let approved = client
        .approved_scenario()
        .await
        .expect("reachable")
        .expect("approved now");
    assert_eq!(approved["title"], "Checkout happy path");
}

#[tokio::test]
async fn health_returns_the_backend_body() {
    let server = MockServer::start().await;
    mock_get(
        &server,
        "/api/health",
        json!({"status": "ok", "approvedScenario": true}),
    )
    .await;

    let client = client_for(&server).await;
    let health = client.health().await.expect("healthy");
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn report_artifacts_resolve_against_the_client_base() {
    let server = MockServer::start().await;
    mock_get(&server, "/api/reports", sample_reports_body()).await;

    let client = client_for(&server).await;
    let snapshot = client.engine().refresh(ResourceKey::Reports).await;
    let reports = snapshot.reports().expect("reports cached");

    // Newest first; the newest sample entry has no PDF.
    let links = reports[0].artifact_urls(client.config().base());
    assert_eq!(
        links.report_json_url,
        Some(format!(
            "{}/files/reports/run_20240102_b2.json",
            server.uri()
        ))
    );
    assert_eq!(links.report_pdf_url, None);
    assert_eq!(
        links.screenshot_url,
        Some(format!(
            "{}/files/screenshots/run_20240102_b2.png",
            server.uri()
        ))
    );
}
