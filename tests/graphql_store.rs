//! GraphQL store integration tests.
//!
//! Runs the client against a mock admin GraphQL endpoint served by axum.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use attr_ratings::config::{Config, StoreConfig};
use attr_ratings::error::StoreError;
use attr_ratings::router::SubmissionRouter;
use attr_ratings::server;
use attr_ratings::store::{FieldRef, FieldStore, GraphqlFieldStore};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

const TOKEN: &str = "shpat_test";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Mode {
    #[default]
    Normal,
    Unavailable,
    Throttled,
    RejectWrites,
    NoAck,
    Slow,
}

#[derive(Default)]
struct MockShop {
    values: Mutex<HashMap<String, String>>,
    mode: Mutex<Mode>,
}

impl MockShop {
    fn set_mode(&self, mode: Mode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn value(&self, owner_id: &str, namespace: &str, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap()
            .get(&format!("{owner_id}/{namespace}.{key}"))
            .cloned()
    }
}

async fn graphql_handler(
    State(shop): State<Arc<MockShop>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let token = headers
        .get("x-shopify-access-token")
        .and_then(|v| v.to_str().ok());
    if token != Some(TOKEN) {
        return (StatusCode::UNAUTHORIZED, "Invalid API key or access token").into_response();
    }

    let mode = *shop.mode.lock().unwrap();
    match mode {
        Mode::Unavailable => {
            return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
        }
        Mode::Throttled => {
            return Json(json!({"errors": [{"message": "Throttled"}]})).into_response();
        }
        Mode::Slow => tokio::time::sleep(Duration::from_secs(3)).await,
        _ => {}
    }

    let query = request["query"].as_str().unwrap_or_default();
    let vars = &request["variables"];

    if query.contains("metafieldsSet") {
        match mode {
            Mode::NoAck => return Json(json!({"data": {"metafieldsSet": null}})).into_response(),
            Mode::RejectWrites => {
                return Json(json!({"data": {"metafieldsSet": {
                    "metafields": [],
                    "userErrors": [{
                        "field": ["metafields", "0", "value"],
                        "message": "Value is too long",
                        "code": "TOO_LONG",
                        "elementIndex": null
                    }]
                }}}))
                .into_response();
            }
            _ => {}
        }

        let input = &vars["metafields"][0];
        assert_eq!(input["type"], "json");
        let value = input["value"].as_str().unwrap_or_default().to_string();
        let key = format!(
            "{}/{}.{}",
            input["ownerId"].as_str().unwrap_or_default(),
            input["namespace"].as_str().unwrap_or_default(),
            input["key"].as_str().unwrap_or_default()
        );
        shop.values.lock().unwrap().insert(key, value.clone());

        Json(json!({"data": {"metafieldsSet": {
            "metafields": [{"value": value}],
            "userErrors": []
        }}}))
        .into_response()
    } else {
        let key = format!(
            "{}/{}.{}",
            vars["id"].as_str().unwrap_or_default(),
            vars["namespace"].as_str().unwrap_or_default(),
            vars["key"].as_str().unwrap_or_default()
        );
        let value = shop.values.lock().unwrap().get(&key).cloned();
        let metafield = value.map(|value| json!({"value": value}));
        Json(json!({"data": {"product": {"metafield": metafield}}})).into_response()
    }
}

/// Start the mock endpoint and return it with its URL.
async fn start_mock() -> (Arc<MockShop>, String) {
    let shop = Arc::new(MockShop::default());
    let app = Router::new()
        .route("/graphql", post(graphql_handler))
        .with_state(shop.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (shop, format!("http://{addr}/graphql"))
}

fn store_config(endpoint: &str) -> StoreConfig {
    StoreConfig {
        endpoint: Some(endpoint.to_string()),
        ..StoreConfig::default()
    }
}

fn ratings() -> FieldRef {
    FieldRef::new("custom", "custom_ratings")
}

#[tokio::test]
async fn test_read_write_round_trip() {
    let (shop, endpoint) = start_mock().await;
    let store = GraphqlFieldStore::new(&store_config(&endpoint), TOKEN).unwrap();

    assert_eq!(store.read_field("42", &ratings()).await.unwrap(), None);

    let ack = store
        .write_field("42", &ratings(), r#"{"total_submissions":1}"#)
        .await
        .unwrap()
        .unwrap();
    assert!(ack.field_errors.is_empty());
    assert_eq!(ack.written_value.as_deref(), Some(r#"{"total_submissions":1}"#));

    assert_eq!(
        shop.value("gid://shopify/Product/42", "custom", "custom_ratings")
            .as_deref(),
        Some(r#"{"total_submissions":1}"#)
    );
    assert_eq!(
        store.read_field("42", &ratings()).await.unwrap().as_deref(),
        Some(r#"{"total_submissions":1}"#)
    );
}

#[tokio::test]
async fn test_wrong_token_is_a_status_error() {
    let (_shop, endpoint) = start_mock().await;
    let store = GraphqlFieldStore::new(&store_config(&endpoint), "wrong").unwrap();

    match store.read_field("1", &ratings()).await {
        Err(StoreError::Status { status, .. }) => assert_eq!(status, 401),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_remote_failures() {
    let (shop, endpoint) = start_mock().await;
    let store = GraphqlFieldStore::new(&store_config(&endpoint), TOKEN).unwrap();

    shop.set_mode(Mode::Unavailable);
    assert!(matches!(
        store.read_field("1", &ratings()).await,
        Err(StoreError::Status { status: 503, .. })
    ));

    shop.set_mode(Mode::Throttled);
    match store.write_field("1", &ratings(), "{}").await {
        Err(StoreError::Remote(msg)) => assert_eq!(msg, "Throttled"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_write_acknowledgments() {
    let (shop, endpoint) = start_mock().await;
    let store = GraphqlFieldStore::new(&store_config(&endpoint), TOKEN).unwrap();

    shop.set_mode(Mode::RejectWrites);
    let ack = store.write_field("1", &ratings(), "{}").await.unwrap().unwrap();
    assert_eq!(ack.field_errors.len(), 1);
    assert_eq!(ack.field_errors[0].message(), "Value is too long");
    assert_eq!(ack.field_errors[0].code(), Some("TOO_LONG"));

    shop.set_mode(Mode::NoAck);
    assert_eq!(store.write_field("1", &ratings(), "{}").await.unwrap(), None);
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store =
        GraphqlFieldStore::new(&store_config(&format!("http://{addr}/graphql")), TOKEN).unwrap();
    assert!(matches!(
        store.read_field("1", &ratings()).await,
        Err(StoreError::Connect(_))
    ));
}

#[tokio::test]
async fn test_timeout() {
    let (shop, endpoint) = start_mock().await;
    shop.set_mode(Mode::Slow);
    let config = StoreConfig {
        timeout_seconds: Some(1),
        ..store_config(&endpoint)
    };
    let store = GraphqlFieldStore::new(&config, TOKEN).unwrap();

    assert!(matches!(
        store.read_field("1", &ratings()).await,
        Err(StoreError::Timeout(1))
    ));
}

#[tokio::test]
async fn test_submission_end_to_end() {
    let (shop, endpoint) = start_mock().await;
    let mut config = Config::default();
    config.store = store_config(&endpoint);
    let store = Arc::new(GraphqlFieldStore::new(&config.store, TOKEN).unwrap());

    let submissions = Arc::new(SubmissionRouter::from_config(store, &config));
    let app = server::router(submissions, &config.server.path);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    for value in [4, 2] {
        let resp = client
            .post(format!("http://{addr}/submit-attr-ratings"))
            .json(&json!({"product_id": "5", "odour_control": value}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let raw = shop
        .value("gid://shopify/Product/5", "custom", "custom_ratings")
        .unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["odour_control"], json!({"average": 3.0, "count": 2}));
    assert_eq!(stored["total_submissions"], 2);

    shop.set_mode(Mode::RejectWrites);
    let resp = client
        .post(format!("http://{addr}/submit-attr-ratings"))
        .json(&json!({"product_id": "5", "odour_control": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["errors"][0],
        json!({
            "field": ["metafields", "0", "value"],
            "message": "Value is too long",
            "code": "TOO_LONG",
            "elementIndex": null
        })
    );
}
