//! End-to-end tests: real listener, real upstream sockets.

use std::time::{Duration, Instant};

use edge_gateway::error::GatewayError;
use edge_gateway::lifecycle::{Phase, StopOutcome};
use reqwest::StatusCode;
use serde_json::Value;

mod common;

use common::{client, config, mint_token, spawn_gateway};

async fn error_of(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_healthcheck() {
    let unused = common::unused_addr().await;
    let gateway = spawn_gateway(config(unused, unused, unused)).await;

    let res = client().get(gateway.url("/healthcheck")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "api-gateway is alive");

    assert_eq!(gateway.stop().await.unwrap(), StopOutcome::Clean);
}

#[tokio::test]
async fn test_identity_is_forwarded_and_response_relayed() {
    let (templates, log) = common::start_mock_backend(201, "template created").await;
    let unused = common::unused_addr().await;
    let gateway = spawn_gateway(config(unused, templates, unused)).await;

    let res = client()
        .post(gateway.url("/templates/new?draft=1"))
        .header("cookie", format!("access_token={}", mint_token("user-42")))
        .header("x-user-id", "admin")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.text().await.unwrap(), "template created");

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/templates/new?draft=1");
    assert_eq!(request.header("x-user-id"), Some("user-42"));
    assert_eq!(request.header("x-forwarded-for"), Some("127.0.0.1"));
    assert!(request.header("x-request-id").is_some());
    assert_eq!(request.body, "payload");

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_missing_and_invalid_credentials() {
    let (pdf, log) = common::start_mock_backend(200, "pdf").await;
    let unused = common::unused_addr().await;
    let gateway = spawn_gateway(config(unused, unused, pdf)).await;

    let res = client().get(gateway.url("/pdf/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(res).await, "authentication required");

    // An invalid cookie wins over a valid bearer token.
    let res = client()
        .get(gateway.url("/pdf/1"))
        .header("cookie", "access_token=garbage")
        .bearer_auth(mint_token("user-42"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_of(res).await, "invalid or expired token");

    assert!(log.lock().unwrap().is_empty());

    let res = client()
        .get(gateway.url("/pdf/1"))
        .bearer_auth(mint_token("user-42"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_preview_is_forwarded() {
    let (templates, log) =
        common::start_recording_backend(|req| (200, format!("preview of {}", req.body))).await;
    let unused = common::unused_addr().await;
    let gateway = spawn_gateway(config(unused, templates, unused)).await;

    let res = client()
        .post(gateway.url("/templates/42/preview"))
        .bearer_auth(mint_token("user-7"))
        .body("{\"name\":\"x\"}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "preview of {\"name\":\"x\"}");

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen[0].target, "/templates/42/preview");
    assert_eq!(seen[0].header("x-user-id"), Some("user-7"));

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_auth_routes_are_public_and_limited() {
    let (auth, log) = common::start_mock_backend(200, "ok").await;
    let unused = common::unused_addr().await;
    let mut config = config(auth, unused, unused);
    config.rate_limit.default.max_requests = 3;
    let gateway = spawn_gateway(config).await;

    for remaining in ["2", "1", "0"] {
        let res = client()
            .post(gateway.url("/auth/login"))
            .header("x-user-id", "spoofed")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-limit"], "3");
        assert_eq!(res.headers()["x-ratelimit-remaining"], remaining);
        let reset: u64 = res.headers()["x-ratelimit-reset"].to_str().unwrap().parse().unwrap();
        assert!((1..=60).contains(&reset));
    }

    let res = client().post(gateway.url("/auth/login")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(error_of(res).await, "too many requests");

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|r| r.header("x-user-id").is_none()));

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let unused = common::unused_addr().await;
    let gateway = spawn_gateway(config(unused, unused, unused)).await;

    let start = Instant::now();
    let res = client().get(gateway.url("/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_of(res).await, "upstream unavailable");
    assert!(start.elapsed() < Duration::from_secs(3));

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_slow_upstream_is_gateway_timeout() {
    let silent = common::start_silent_backend().await;
    let unused = common::unused_addr().await;
    let gateway = spawn_gateway(config(silent, unused, unused)).await;

    let start = Instant::now();
    let res = client().get(gateway.url("/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error_of(res).await, "upstream timed out");
    assert!(start.elapsed() < Duration::from_secs(4));

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_route_and_logout() {
    let unused = common::unused_addr().await;
    let gateway = spawn_gateway(config(unused, unused, unused)).await;

    let res = client().get(gateway.url("/admin")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_of(res).await, "not found");

    let res = client().get(gateway.url("/logout")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res.headers()["set-cookie"].to_str().unwrap();
    assert!(cookie.starts_with("access_token=;"));
    assert!(cookie.contains("Max-Age=0"));

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_clean_stop_releases_listener() {
    let unused = common::unused_addr().await;
    let gateway = spawn_gateway(config(unused, unused, unused)).await;
    let addr = gateway.addr;
    let phases = gateway.phases.clone();

    assert_eq!(gateway.stop().await.unwrap(), StopOutcome::Clean);
    assert_eq!(*phases.borrow(), Phase::Stopped);
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_forced_stop_cancels_in_flight() {
    let silent = common::start_silent_backend().await;
    let unused = common::unused_addr().await;
    let mut config = config(silent, unused, unused);
    config.timeouts.response_header_secs = 30;
    config.shutdown.grace_period_secs = 1;
    let gateway = spawn_gateway(config).await;

    let url = gateway.url("/auth/slow");
    let in_flight = tokio::spawn(async move { client().get(url).send().await });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let start = Instant::now();
    assert_eq!(gateway.stop().await.unwrap(), StopOutcome::Forced);
    assert!(start.elapsed() < Duration::from_secs(5));

    let res = in_flight.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_forced_stop_closes_streaming_upstream() {
    let (stalling, upstream_closed) = common::start_stalling_backend().await;
    let unused = common::unused_addr().await;
    let mut config = config(stalling, unused, unused);
    config.shutdown.grace_period_secs = 1;
    let gateway = spawn_gateway(config).await;

    let res = client().get(gateway.url("/auth/export")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let reading = tokio::spawn(async move { res.bytes().await });

    assert_eq!(gateway.stop().await.unwrap(), StopOutcome::Forced);
    tokio::time::timeout(Duration::from_secs(2), upstream_closed)
        .await
        .expect("upstream connection still open after forced stop")
        .unwrap();

    // The client never receives the advertised 1000 bytes.
    assert!(reading.await.unwrap().is_err());
}

#[tokio::test]
async fn test_invalid_upstream_never_binds() {
    let addr = common::unused_addr().await;
    let mut config = config(addr, addr, addr);
    config.listener.bind_address = addr.to_string();
    config.upstreams.pdf = "not a url".into();

    let result = edge_gateway::run(config, std::future::pending()).await;
    assert!(matches!(result, Err(GatewayError::Build(_))));
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
