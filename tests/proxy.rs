//! End-to-end forwarding tests against raw TCP backends.

use std::sync::atomic::Ordering;

use ai_api_proxy::config::RouteConfig;
use axum::http::StatusCode;

mod common;

fn route(prefix: &str, origin: String) -> RouteConfig {
    RouteConfig::new(prefix, origin)
}

#[tokio::test]
async fn strips_prefix_and_keeps_query() {
    let backend = common::start_echo_backend().await;
    let (proxy, _shutdown) = common::start_proxy(vec![route("/echo", format!("http://{backend}"))]).await;
    let client = common::client();

    let cases = [
        ("/echo/v1/models?limit=5&order=asc", "GET /v1/models?limit=5&order=asc HTTP/1.1"),
        ("/echo/v1/chat/completions", "GET /v1/chat/completions HTTP/1.1"),
        ("/echo", "GET / HTTP/1.1"),
        ("/echo/", "GET / HTTP/1.1"),
    ];
    for (path, request_line) in cases {
        let res = client.get(format!("http://{proxy}{path}")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{path}");
        let echo = res.text().await.unwrap();
        assert!(echo.starts_with(request_line), "{path}: {echo}");
    }
}

#[tokio::test]
async fn origin_base_path_is_prepended() {
    let backend = common::start_echo_backend().await;
    let (proxy, _shutdown) =
        common::start_proxy(vec![route("/router", format!("http://{backend}/api"))]).await;
    let client = common::client();

    let echo = client.get(format!("http://{proxy}/router")).send().await.unwrap().text().await.unwrap();
    assert!(echo.starts_with("GET /api/ HTTP/1.1"), "{echo}");

    let echo = client
        .get(format!("http://{proxy}/router/v1/chat/completions"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(echo.starts_with("GET /api/v1/chat/completions HTTP/1.1"), "{echo}");
}

#[tokio::test]
async fn sanitizes_outbound_headers() {
    let backend = common::start_echo_backend().await;
    let (proxy, _shutdown) = common::start_proxy(vec![route("/echo", format!("http://{backend}"))]).await;

    let res = common::client()
        .get(format!("http://{proxy}/echo/v1/models"))
        .header("CF-Connecting-IP", "203.0.113.7")
        .header("Cf-Ray", "8a1b2c")
        .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
        .header("X-Real-IP", "203.0.113.7")
        .header("True-Client-IP", "203.0.113.7")
        .header("Forwarded", "for=203.0.113.7")
        .header("CDN-Loop", "cloudflare")
        .header("Ali-Cdn-Real-Ip", "203.0.113.7")
        .header("Proxy-Authorization", "Basic Zm9vOmJhcg==")
        .header("Authorization", "Bearer sk-test")
        .header("X-Custom", "kept")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let echo = res.text().await.unwrap().to_ascii_lowercase();
    for denied in [
        "cf-connecting-ip",
        "cf-ray",
        "x-forwarded-for",
        "x-real-ip",
        "true-client-ip",
        "forwarded:",
        "cdn-loop",
        "ali-cdn-real-ip",
        "proxy-authorization",
        "203.0.113.7",
    ] {
        assert!(!echo.contains(denied), "{denied} leaked upstream: {echo}");
    }
    assert!(echo.contains("authorization: bearer sk-test"));
    assert!(echo.contains("x-custom: kept"));
    assert!(echo.contains(&format!("host: {backend}")));
}

#[tokio::test]
async fn forwards_request_body() {
    let backend = common::start_echo_backend().await;
    let (proxy, _shutdown) = common::start_proxy(vec![route("/echo", format!("http://{backend}"))]).await;

    let payload = serde_json::json!({
        "model": "gpt-4o",
        "messages": [{"role": "user", "content": "hello"}],
    });
    let res = common::client()
        .post(format!("http://{proxy}/echo/v1/chat/completions"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let echo = res.text().await.unwrap();
    assert!(echo.starts_with("POST /v1/chat/completions HTTP/1.1"));
    assert!(echo.ends_with(&payload.to_string()), "{echo}");
}

#[tokio::test]
async fn response_disables_buffering() {
    let backend = common::start_echo_backend().await;
    let (proxy, _shutdown) = common::start_proxy(vec![route("/echo", format!("http://{backend}"))]).await;

    let res = common::client()
        .get(format!("http://{proxy}/echo/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-accel-buffering"], "no");
    assert_eq!(res.headers()["x-upstream"], "echo");
    assert_eq!(res.headers()["content-type"], "text/plain");
}

#[tokio::test]
async fn unknown_prefix_never_reaches_upstream() {
    let (backend, accepted) = common::start_counting_backend().await;
    let (proxy, _shutdown) = common::start_proxy(vec![route("/count", format!("http://{backend}"))]).await;
    let client = common::client();

    for path in ["/other/v1/models", "/countx", "/favicon.ico"] {
        let res = client.get(format!("http://{proxy}{path}")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(res.text().await.unwrap(), "Not Found");
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 0);

    let res = client.get(format!("http://{proxy}/count/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refused_upstream_is_json_502() {
    let dead = common::refused_addr().await;
    let (proxy, _shutdown) = common::start_proxy(vec![route("/dead", format!("http://{dead}"))]).await;

    let res = common::client()
        .post(format!("http://{proxy}/dead/v1/chat/completions"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()["content-type"], "application/json");

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["type"], "proxy_error");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Proxy Connection Error"));
    assert!(!message.contains(&dead.port().to_string()));
}

#[tokio::test]
async fn serves_homepage_and_robots() {
    let backend = common::start_echo_backend().await;
    let (proxy, _shutdown) = common::start_proxy(vec![
        route("/openai", format!("http://{backend}")),
        route("/claude", format!("http://{backend}/v1")),
    ])
    .await;
    let client = common::client();

    let page = client.get(format!("http://{proxy}/")).send().await.unwrap().text().await.unwrap();
    let claude = page.find("/claude").unwrap();
    let openai = page.find("/openai").unwrap();
    assert!(claude < openai);

    let res = client.post(format!("http://{proxy}/robots.txt")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert_eq!(res.text().await.unwrap(), "User-agent: *\nDisallow: /");
}

#[tokio::test]
async fn stops_accepting_after_shutdown() {
    let backend = common::start_echo_backend().await;
    let (proxy, shutdown) = common::start_proxy(vec![route("/echo", format!("http://{backend}"))]).await;

    shutdown.trigger();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert!(common::client().get(format!("http://{proxy}/echo")).send().await.is_err());
}
