use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use agent_engine::{AgentEngineClient, EngineTarget};
use axum::http::StatusCode;
use http_body_util::BodyExt;
use mockito::Matcher;
use serde_json::json;
use shopper_core::catalog::{StorefrontCatalog, UnconfiguredCatalog, VariantCatalog};
use shopper_core::session::InMemorySessionStore;
use shopper_core::{CatalogError, VariantRecord};
use shopper_core::tools::ProductCacheTools;
use shopper_server::state::AppState;
use tower::ServiceExt;

const RESOURCE: &str = "/projects/proj/locations/us-central1/reasoningEngines/42";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn engine(server: &mockito::ServerGuard) -> AgentEngineClient {
    let target = EngineTarget {
        project_id: "proj".into(),
        location: "us-central1".into(),
        resource_id: "42".into(),
    };
    AgentEngineClient::new(&target, Some(server.url().as_str()), Some("tok".into()))
}

fn state_with(
    server: &mockito::ServerGuard,
    catalog: Arc<dyn VariantCatalog>,
    tool_timeout: Duration,
) -> AppState {
    let tools = ProductCacheTools::new(Arc::new(InMemorySessionStore::new()), catalog);
    AppState::new(engine(server), tools, tool_timeout)
}

fn app_with(
    server: &mockito::ServerGuard,
    catalog: Arc<dyn VariantCatalog>,
    tool_timeout: Duration,
) -> axum::Router {
    shopper_server::build_router(state_with(server, catalog, tool_timeout), &[])
}

/// Catalog that answers after a fixed delay.
struct SlowCatalog(Duration);

impl VariantCatalog for SlowCatalog {
    fn fetch_variants(&self, _product_id: &str) -> Result<Vec<VariantRecord>, CatalogError> {
        std::thread::sleep(self.0);
        Ok(vec![VariantRecord::new("v1", "S", json!("20.0"), true)])
    }
}

fn app(server: &mockito::ServerGuard) -> axum::Router {
    app_with(server, Arc::new(UnconfiguredCatalog), Duration::from_secs(5))
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

fn jacket(id: &str, title: &str) -> serde_json::Value {
    json!({
        "product_id": id,
        "title": title,
        "price_range": {"min": "59.0", "max": "89.0", "currency": "USD"},
        "variants": [{"variant_id": format!("{id}-v1"), "title": "M", "price": "59.0", "available": true}]
    })
}

// ---------------------------------------------------------------------------
// Chat routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_session_seeds_cart_state() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", format!("{RESOURCE}/sessions").as_str())
        .match_body(Matcher::Json(json!({"userId": "u1"})))
        .with_status(200)
        .with_body(format!(r#"{{"name": "{RESOURCE}/sessions/777/operations/1"}}"#))
        .create_async()
        .await;
    let seed = server
        .mock("POST", format!("{RESOURCE}/sessions/777:appendEvent").as_str())
        .match_body(Matcher::PartialJson(json!({
            "author": "shopify_agent",
            "actions": {"stateDelta": {"cart_id": "gid://shopify/Cart/abc"}}
        })))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let (status, body) = send(
        app(&server),
        "POST",
        "/api/chat/u1/create-session?cart_id=abc",
        None,
    )
    .await;

    create.assert_async().await;
    seed.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": {"sessionId": "777"}}));
}

#[tokio::test]
async fn create_session_upstream_failure_is_500() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", format!("{RESOURCE}/sessions").as_str())
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;

    let (status, body) = send(
        app(&server),
        "POST",
        "/api/chat/u1/create-session?cart_id=abc",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn inject_agent_message_appends_model_event() {
    let mut server = mockito::Server::new_async().await;
    let append = server
        .mock("POST", format!("{RESOURCE}/sessions/s1:appendEvent").as_str())
        .match_body(Matcher::PartialJson(json!({
            "author": "suggestion_agent",
            "content": {"role": "model", "parts": [{"text": "Try the parka"}]}
        })))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let (status, body) = send(
        app(&server),
        "POST",
        "/api/chat/s1/inject-agent-message?message=Try%20the%20parka",
        None,
    )
    .await;

    append.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["injectedAgentMessage"], "Try the parka");
}

#[tokio::test]
async fn latest_session_is_null_for_new_user() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("{RESOURCE}/sessions").as_str())
        .match_query(Matcher::UrlEncoded("filter".into(), "user_id=u9".into()))
        .with_status(200)
        .with_body(r#"{"sessions": []}"#)
        .create_async()
        .await;

    let (status, body) = get(app(&server), "/api/chat/u9/latest-session").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": {"latestSessionId": null}}));
}

#[tokio::test]
async fn history_is_reshaped_for_the_widget() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("{RESOURCE}/sessions/s1/events").as_str())
        .with_status(200)
        .with_body(
            r#"{"sessionEvents": [
                {"author": "shopify_agent", "timestamp": "2025-06-01T10:00:00Z",
                 "actions": {"stateDelta": {"cart_id": "gid://shopify/Cart/abc"}}},
                {"author": "user", "timestamp": "2025-06-01T10:00:05Z",
                 "content": {"role": "user", "parts": [{"text": "black jacket?"}]}}
            ]}"#,
        )
        .create_async()
        .await;

    let (status, body) = get(app(&server), "/api/chat/s1/history").await;
    assert_eq!(status, StatusCode::OK);
    let events = body["data"]["sessionEvents"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0]["content"].is_null());
    assert_eq!(events[0]["actions"]["state_delta"]["cart_id"], "gid://shopify/Cart/abc");
    assert_eq!(events[1]["content"]["parts"]["text"], "black jacket?");
    assert!(events[1]["actions"]["state_delta"].is_null());
}

#[tokio::test]
async fn send_message_streams_sse_frames() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", format!("{RESOURCE}:streamQuery").as_str())
        .match_body(Matcher::PartialJson(json!({
            "input": {"user_id": "u1", "session_id": "s1", "message": "hi"}
        })))
        .with_status(200)
        .with_body("{\"author\":\"happy_shopper\"}\n{\"author\":\"shopify_advisor\"}\n")
        .create_async()
        .await;

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/chat/u1/s1/send-message?message=hi")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app(&server).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(ct.starts_with("text/event-stream"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let frames: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .collect();
    assert_eq!(
        frames,
        vec![r#"{"author":"happy_shopper"}"#, r#"{"author":"shopify_advisor"}"#]
    );
}

#[tokio::test]
async fn history_unframes_user_turns_and_validates_replies() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("{RESOURCE}/sessions/s1/events").as_str())
        .with_status(200)
        .with_body(
            r#"{"sessionEvents": [
                {"author": "user", "timestamp": "2025-06-01T10:00:05Z",
                 "content": {"role": "user", "parts": [{"text": "cart_id=gid://shopify/Cart/abc\nuser_message=red gloves?"}]}},
                {"author": "shopify_agent", "timestamp": "2025-06-01T10:00:07Z",
                 "content": {"role": "model", "parts": [{"text": "{\"message\": \"Here they are\", \"suggestion\": [\"Add to cart\"]}"}]}},
                {"author": "shopify_agent", "timestamp": "2025-06-01T10:00:09Z",
                 "content": {"role": "model", "parts": [{"text": "Sorry, something broke."}]}}
            ]}"#,
        )
        .create_async()
        .await;

    let (status, body) = get(app(&server), "/api/chat/s1/history").await;
    assert_eq!(status, StatusCode::OK);
    let events = body["data"]["sessionEvents"].as_array().unwrap();
    assert_eq!(events[0]["content"]["parts"]["text"], "red gloves?");
    assert!(events[0].get("reply").is_none());
    assert_eq!(events[1]["reply"]["message"], "Here they are");
    assert_eq!(events[1]["reply"]["suggestion"], json!(["Add to cart"]));
    assert_eq!(events[2]["content"]["parts"]["text"], "Sorry, something broke.");
    assert!(events[2].get("reply").is_none());
}

#[tokio::test]
async fn send_message_frames_cart_for_the_shopper() {
    let mut server = mockito::Server::new_async().await;
    let query = server
        .mock("POST", format!("{RESOURCE}:streamQuery").as_str())
        .match_body(Matcher::PartialJson(json!({
            "input": {"message": "cart_id=gid://shopify/Cart/abc\nuser_message=red gloves?"}
        })))
        .with_status(200)
        .with_body("{\"author\":\"happy_shopper\"}\n")
        .create_async()
        .await;

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/chat/u1/s1/send-message?message=red%20gloves%3F&cart_id=abc")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app(&server).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body().collect().await.unwrap();
    query.assert_async().await;
}

#[tokio::test]
async fn send_message_ends_with_error_event_on_bad_line() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", format!("{RESOURCE}:streamQuery").as_str())
        .with_status(200)
        .with_body("{\"n\":1}\nnot-json\n{\"n\":3}\n")
        .create_async()
        .await;

    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/chat/u1/s1/send-message?message=hi")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app(&server).oneshot(req).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains(r#"data: {"n":1}"#));
    assert!(text.contains("event: error"));
    assert!(!text.contains(r#"{"n":3}"#));
}

// ---------------------------------------------------------------------------
// Product cache tools
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cache_then_lookup_then_end_session() {
    let server = mockito::Server::new_async().await;
    let app = app(&server);

    let (status, body) = post_json(
        app.clone(),
        "/api/tools/s1/products/lookup",
        json!({"query": "jacket"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hit"], false);

    let (status, body) = post_json(
        app.clone(),
        "/api/tools/s1/products",
        json!({"products": [
            jacket("p1", "Black Jacket"),
            jacket("p2", "Denim Jacket"),
            {"title": "Nameless Scarf"}
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cached"], json!(["p1", "p2"]));
    assert_eq!(body["data"]["rejected"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["cache_size"], 2);

    let (_, body) = post_json(
        app.clone(),
        "/api/tools/s1/products/lookup",
        json!({"query": "  BLACK jacket "}),
    )
    .await;
    assert_eq!(body["data"]["hit"], true);
    let products = body["data"]["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["product_id"], "p1");
    assert_eq!(products[0]["price_range"]["max"], "89.0");

    let (_, body) = post_json(
        app.clone(),
        "/api/tools/other/products/lookup",
        json!({"query": "jacket"}),
    )
    .await;
    assert_eq!(body["data"]["hit"], false, "caches are per session");

    let (status, body) = send(app.clone(), "DELETE", "/api/tools/s1/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ended"], "s1");

    let (_, body) = post_json(app, "/api/tools/s1/products/lookup", json!({"query": "jacket"})).await;
    assert_eq!(body["data"]["hit"], false);
}

#[tokio::test]
async fn availability_matrix_is_expanded_through_catalog() {
    let mut server = mockito::Server::new_async().await;
    let graphql = server
        .mock("POST", "/api/graphql.json")
        .match_body(Matcher::PartialJson(json!({"variables": {"id": "p7"}})))
        .with_status(200)
        .with_body(
            r#"{"data": {"product": {"variants": {"nodes": [
                {"id": "v1", "title": "S", "availableForSale": true, "price": {"amount": "20.0", "currencyCode": "USD"}},
                {"id": "v2", "title": "L", "availableForSale": false, "price": {"amount": "20.0", "currencyCode": "USD"}}
            ]}}}}"#,
        )
        .create_async()
        .await;
    let catalog = Arc::new(StorefrontCatalog::new(
        format!("{}/api/graphql.json", server.url()),
        None,
        Duration::from_secs(5),
    ));
    let app = app_with(&server, catalog, Duration::from_secs(5));

    let (status, body) = post_json(
        app.clone(),
        "/api/tools/s1/products",
        json!({"products": [{"product_id": "p7", "title": "Rain Shell", "availabilityMatrix": "S:1,L:0"}]}),
    )
    .await;
    graphql.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cached"], json!(["p7"]));

    let (_, body) = post_json(app, "/api/tools/s1/products/lookup", json!({"query": "shell"})).await;
    let product = &body["data"]["products"][0];
    assert_eq!(product["variants"].as_array().unwrap().len(), 2);
    assert_eq!(product["variants"][1]["available"], false);
    assert!(product.get("availabilityMatrix").is_none());
}

#[tokio::test]
async fn failed_expansion_skips_only_that_product() {
    let server = mockito::Server::new_async().await;
    let app = app(&server);

    let (status, body) = post_json(
        app.clone(),
        "/api/tools/s1/products",
        json!({"products": [
            {"product_id": "p9", "title": "Mystery Coat", "availabilityMatrix": "S:1"},
            jacket("p1", "Black Jacket")
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cached"], json!(["p1"]));
    assert_eq!(body["data"]["failed"][0]["product_id"], "p9");

    let (_, body) = post_json(app, "/api/tools/s1/products/lookup", json!({"query": "coat"})).await;
    assert_eq!(body["data"]["hit"], false);
}

#[tokio::test]
async fn slow_catalog_times_out_with_504() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/graphql.json")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(600));
            w.write_all(br#"{"data": {"product": null}}"#)
        })
        .create_async()
        .await;
    let catalog = Arc::new(StorefrontCatalog::new(
        format!("{}/api/graphql.json", server.url()),
        None,
        Duration::from_secs(5),
    ));
    let app = app_with(&server, catalog, Duration::from_millis(100));

    let (status, body) = post_json(
        app,
        "/api/tools/s1/products",
        json!({"products": [{"product_id": "p7", "title": "Rain Shell", "availabilityMatrix": "S:1"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].as_str().unwrap().contains("s1"));
}

#[tokio::test]
async fn timed_out_update_leaves_cache_untouched() {
    let server = mockito::Server::new_async().await;
    let app = app_with(
        &server,
        Arc::new(SlowCatalog(Duration::from_millis(300))),
        Duration::from_millis(50),
    );

    let (status, _) = post_json(
        app.clone(),
        "/api/tools/s1/products",
        json!({"products": [{"product_id": "p7", "title": "Rain Shell", "availabilityMatrix": "S:1"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    // Let the abandoned normalization run to completion.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let (_, body) = post_json(app, "/api/tools/s1/products/lookup", json!({"query": "rain"})).await;
    assert_eq!(body["data"]["hit"], false);
}

#[tokio::test]
async fn timed_out_session_accepts_the_next_update() {
    let server = mockito::Server::new_async().await;
    let app = app_with(
        &server,
        Arc::new(SlowCatalog(Duration::from_millis(200))),
        Duration::from_millis(50),
    );

    let (status, _) = post_json(
        app.clone(),
        "/api/tools/s1/products",
        json!({"products": [{"product_id": "p7", "title": "Rain Shell", "availabilityMatrix": "S:1"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    // Explicit variants need no catalog call; this write waits for the lock.
    let (status, body) = post_json(
        app.clone(),
        "/api/tools/s1/products",
        json!({"products": [jacket("p1", "Black Jacket")]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cache_size"], 1);
}

#[tokio::test]
async fn finished_updates_release_their_session_lock() {
    let server = mockito::Server::new_async().await;
    let state = state_with(&server, Arc::new(UnconfiguredCatalog), Duration::from_secs(5));
    let app = shopper_server::build_router(state.clone(), &[]);

    for n in 0..20 {
        let (status, _) = post_json(
            app.clone(),
            &format!("/api/tools/s{n}/products"),
            json!({"products": [jacket("p1", "Black Jacket")]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(state.tracked_sessions(), 0);
}

#[tokio::test]
async fn timed_out_update_releases_its_lock_once_done() {
    let server = mockito::Server::new_async().await;
    let state = state_with(
        &server,
        Arc::new(SlowCatalog(Duration::from_millis(150))),
        Duration::from_millis(20),
    );
    let app = shopper_server::build_router(state.clone(), &[]);

    let (status, _) = post_json(
        app,
        "/api/tools/s1/products",
        json!({"products": [{"product_id": "p7", "title": "Rain Shell", "availabilityMatrix": "S:1"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(state.tracked_sessions(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(state.tracked_sessions(), 0);
}

// ---------------------------------------------------------------------------
// Agents and CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn agents_are_listed() {
    let server = mockito::Server::new_async().await;
    let (status, body) = get(app(&server), "/api/agents").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["shopify_agent", "happy_shopper", "shopify_advisor"]);
}

#[tokio::test]
async fn unknown_agent_is_404() {
    let server = mockito::Server::new_async().await;
    let (status, body) = get(app(&server), "/api/agents/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn configured_origin_passes_preflight() {
    let server = mockito::Server::new_async().await;
    let tools = ProductCacheTools::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(UnconfiguredCatalog),
    );
    let state = AppState::new(engine(&server), tools, Duration::from_secs(5));
    let app = shopper_server::build_router(state, &["https://shop.example".to_string()]);

    let req = axum::http::Request::builder()
        .method("OPTIONS")
        .uri("/api/agents")
        .header("origin", "https://shop.example")
        .header("access-control-request-method", "GET")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "https://shop.example"
    );
    assert_eq!(
        headers.get("access-control-allow-credentials").unwrap(),
        "true"
    );
}
