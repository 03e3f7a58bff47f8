// Usage accounting and the stats endpoints

use super::test_harness::*;
use kagami::endpoints::IncomingRequest;
use kagami::metadata::MetadataStore;

fn admin_get(path: &str) -> IncomingRequest {
    IncomingRequest::get(path).with_header("X-Admin-Secret", ADMIN_SECRET)
}

#[tokio::test]
async fn test_every_accounted_request_has_one_terminal_event() {
    let gateway = TestGateway::small().await;

    assert_eq!(gateway.get("/api/ai/text2img?prompt=a").await.status, 200);
    assert_eq!(gateway.get("/api/ai/text2img").await.status, 400);
    assert_eq!(gateway.get("/api/nope").await.status, 404);

    let counters = gateway.counters().await;
    assert_eq!(counters.total_requests, 3);
    assert_eq!(counters.total_success, 1);
    assert_eq!(counters.total_errors, 2);
    assert_eq!(
        counters.total_requests,
        counters.total_success + counters.total_errors
    );
    assert_eq!(gateway.metadata.request_log_len(), 3);
}

#[tokio::test]
async fn test_request_log_rows_match_responses() {
    let gateway = TestGateway::small().await;

    let response = gateway
        .send(
            IncomingRequest::get("/api/ai/text2img?prompt=a")
                .with_client_ip("203.0.113.5")
                .with_header("User-Agent", "curl/8.4"),
        )
        .await;
    let request_id = response.header("X-Request-ID").expect("request id").to_string();
    gateway.get("/api/unknown/path").await;
    gateway.state.accountant.flush().await;

    let logs = gateway.metadata.recent_request_logs(10).await.unwrap();
    assert_eq!(logs.len(), 2);

    // Newest first
    assert_eq!(logs[0].endpoint, "unknown");
    assert_eq!(logs[0].status_code, 404);
    assert!(!logs[0].success);

    assert_eq!(logs[1].request_id, request_id);
    assert_eq!(logs[1].endpoint, "text2img");
    assert_eq!(logs[1].method, "GET");
    assert_eq!(logs[1].path, "/api/ai/text2img");
    assert_eq!(logs[1].status_code, 200);
    assert!(logs[1].success);
    assert_eq!(logs[1].client_ip, "203.0.113.5");
    assert_eq!(logs[1].user_agent.as_deref(), Some("curl/8.4"));
}

#[tokio::test]
async fn test_stats_summary_reports_counters() {
    let gateway = TestGateway::small().await;
    gateway.get("/api/ai/text2img?prompt=a").await;
    gateway.get("/api/ai/text2img").await;
    gateway.state.accountant.flush().await;

    let response = gateway.get("/api/stats").await;

    assert_eq!(response.status, 200);
    let result = json(&response)["result"].clone();
    // The stats request itself may or may not be applied yet
    assert!(result["total_requests"].as_u64().unwrap() >= 2);
    assert_eq!(result["total_success"], 1);
    assert_eq!(result["total_errors"], 1);
    assert_eq!(result["total_visitors"], 0);
    assert!(result["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_stats_logs_honours_limit() {
    let gateway = TestGateway::small().await;
    for _ in 0..5 {
        gateway.get("/api/ai/chat").await;
    }
    gateway.state.accountant.flush().await;

    let response = gateway.send(admin_get("/api/stats/logs?limit=3")).await;
    let result = json(&response)["result"].clone();
    assert_eq!(result["count"], 3);
    assert_eq!(result["logs"].as_array().unwrap().len(), 3);
    assert_eq!(result["logs"][0]["endpoint"], "chat");

    gateway.state.accountant.flush().await;
    let fallback = gateway.send(admin_get("/api/stats/logs?limit=lots")).await;
    assert_eq!(json(&fallback)["result"]["count"], 6);
}

#[tokio::test]
async fn test_stats_logs_require_admin_secret() {
    let gateway = TestGateway::small().await;
    gateway
        .send(
            IncomingRequest::get("/api/ai/imagine/my%20secret%20prompt")
                .with_client_ip("198.51.100.7"),
        )
        .await;
    gateway.state.accountant.flush().await;

    let anonymous = gateway.get("/api/stats/logs").await;
    assert_eq!(anonymous.status, 403);
    let body = String::from_utf8(anonymous.body.to_vec()).unwrap();
    assert!(!body.contains("198.51.100.7"));
    assert!(!body.contains("secret%20prompt"));

    let wrong = gateway
        .send(IncomingRequest::get("/api/stats/logs").with_header("X-Admin-Secret", "guess"))
        .await;
    assert_eq!(wrong.status, 403);

    let authorized = gateway.send(admin_get("/api/stats/logs")).await;
    assert_eq!(authorized.status, 200);
    let rows = json(&authorized)["result"]["logs"].as_array().unwrap().clone();
    assert!(rows
        .iter()
        .any(|row| row["client_ip"] == "198.51.100.7" && row["endpoint"] == "imagine"));

    // The counters summary stays public
    assert_eq!(gateway.get("/api/stats").await.status, 200);
}

#[tokio::test]
async fn test_visit_beacon_counts_visitors() {
    let gateway = TestGateway::small().await;

    for _ in 0..2 {
        let response = gateway
            .send(IncomingRequest::new("POST", "/api/stats/visit"))
            .await;
        assert_eq!(response.status, 200);
    }

    let counters = gateway.counters().await;
    assert_eq!(counters.total_visitors, 2);
    assert_eq!(counters.total_requests, 2);

    let wrong_method = gateway.get("/api/stats/visit").await;
    assert_eq!(wrong_method.status, 405);
}

#[tokio::test]
async fn test_system_routes_are_not_accounted() {
    let gateway = TestGateway::small().await;

    assert_eq!(gateway.get("/health").await.status, 200);
    assert_eq!(gateway.get("/metrics").await.status, 200);
    assert_eq!(
        gateway
            .send(IncomingRequest::new("OPTIONS", "/api/ai/text2img"))
            .await
            .status,
        204
    );

    let counters = gateway.counters().await;
    assert_eq!(counters.total_requests, 0);
    assert_eq!(gateway.metadata.request_log_len(), 0);
}
