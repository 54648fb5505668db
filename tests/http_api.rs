//! HTTP-level tests: the router served on an ephemeral port, exercised with
//! `reqwest` and with the bundled client.

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use worksheet_store::client::{DetailView, ListState, ListView, PageQuery, WorksheetClient};
use worksheet_store::config::PaginationConfig;
use worksheet_store::models::{format_timestamp, ObjectId, RawDocument};
use worksheet_store::retrieval::RetrievalService;
use worksheet_store::server::router;
use worksheet_store::store::memory::InMemoryStore;
use worksheet_store::store::DocumentStore;

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
}

async fn start_server() -> TestServer {
    let store = Arc::new(InMemoryStore::new());
    let service = RetrievalService::new(store.clone(), PaginationConfig::default());
    let app = router(service);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        store,
    }
}

async fn seed(store: &InMemoryStore, value: Value) -> ObjectId {
    let doc: RawDocument = value.as_object().cloned().unwrap();
    store.insert(doc).await.unwrap()
}

fn days_ago(days: i64) -> String {
    format_timestamp(&(Utc::now() - Duration::days(days)))
}

#[tokio::test]
async fn test_health() {
    let server = start_server().await;
    let resp = reqwest::get(format!("{}/health", server.base_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_unknown_route_is_404_json() {
    let server = start_server().await;
    let resp = reqwest::get(format!("{}/nope", server.base_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Route not found"}));
}

#[tokio::test]
async fn test_list_envelope_and_wire_shape() {
    let server = start_server().await;
    seed(
        &server.store,
        json!({
            "chatInput": "Algebra Basics",
            "text": "<p>x + 1</p>",
            "combined_at": "2024-01-02T03:04:05.000Z",
            "userEmail": "t@example.com",
            "createdAt": days_ago(1),
        }),
    )
    .await;
    seed(&server.store, json!({"createdAt": days_ago(2)})).await;

    let resp = reqwest::get(format!("{}/worksheets?page=abc&limit=1", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["currentPage"], 1);
    assert_eq!(body["perPage"], 1);
    assert_eq!(body["totalItems"], 2);
    assert_eq!(body["totalPages"], 2);

    let item = &body["items"][0];
    assert_eq!(item["chatInput"], "Algebra Basics");
    assert_eq!(item["text"], "<p>x + 1</p>");
    assert_eq!(item["combined_at"], "2024-01-02T03:04:05.000Z");
    assert_eq!(item["userEmail"], "t@example.com");
    assert_eq!(item["dateDefaulted"], false);
    assert_eq!(item["_id"].as_str().unwrap().len(), 24);
}

#[tokio::test]
async fn test_repeated_and_malformed_query_keys_do_not_fail() {
    let server = start_server().await;
    for i in 0..7 {
        seed(
            &server.store,
            json!({"chatInput": format!("Algebra {}", i), "createdAt": days_ago(i)}),
        )
        .await;
    }

    let resp = reqwest::get(format!(
        "{}/worksheets?page=2&page=1&limit=3&limit=abc",
        server.base_url
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["currentPage"], 2);
    assert_eq!(body["perPage"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
    assert_eq!(body["items"][0]["chatInput"], "Algebra 3");

    let resp = reqwest::get(format!("{}/worksheets?page=%ZZ&&=&limit", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["currentPage"], 1);
    assert_eq!(body["perPage"], 50);
    assert_eq!(body["totalItems"], 7);

    let resp = reqwest::get(format!(
        "{}/worksheets/subject/algebra?limit=2&limit=5",
        server.base_url
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let items: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn test_get_and_delete_status_codes() {
    let server = start_server().await;
    let id = seed(&server.store, json!({"chatInput": "Doomed"})).await;
    let http = reqwest::Client::new();

    let resp = http
        .get(format!("{}/worksheets/not-a-valid-id", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = http
        .get(format!("{}/worksheets/{}", server.base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["chatInput"], "Doomed");

    let resp = http
        .delete(format!("{}/worksheets/{}", server.base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().is_some());

    let resp = http
        .delete(format!("{}/worksheets/{}", server.base_url, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = http
        .delete(format!("{}/worksheets/xyz", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subject_recent_and_subjects_routes() {
    let server = start_server().await;
    seed(&server.store, json!({"chatInput": "World History", "createdAt": days_ago(0)})).await;
    seed(&server.store, json!({"chatInput": "Art History", "createdAt": days_ago(10)})).await;
    seed(&server.store, json!({"subject": "Biology", "createdAt": days_ago(3)})).await;

    let body: Value = reqwest::get(format!("{}/worksheets/subject/history", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);

    let body: Value = reqwest::get(format!("{}/worksheets/recent/7", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subjects: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["chatInput"].as_str().unwrap())
        .collect();
    assert_eq!(subjects, vec!["World History", "Biology"]);

    let body: Value = reqwest::get(format!("{}/subjects", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!(["Art History", "Biology", "World History"]));
}

#[tokio::test]
async fn test_client_list_and_detail() {
    let server = start_server().await;
    seed(
        &server.store,
        json!({
            "chatInput": "Fractions",
            "text": "<h2>Warm up</h2><script>steal()</script><ul><li>1/2 + 1/4</li></ul>",
            "combined_at": "2024-02-03T10:00:00Z",
            "createdAt": days_ago(0),
        }),
    )
    .await;
    seed(&server.store, json!({"createdAt": days_ago(1)})).await;

    let client = WorksheetClient::new(&format!("{}/", server.base_url));
    let mut view = ListView::new();
    view.refresh(&client, &PageQuery::default()).await;

    let ListState::Loaded(page) = view.state() else {
        panic!("expected loaded state, got {:?}", view.state());
    };
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[1].subject, "Unknown Subject");

    let first = view.select(0).unwrap();
    let out = DetailView::new(first).render();
    assert!(out.starts_with("Fractions\n2024-02-03 10:00 UTC\n\n"));
    assert!(out.contains("Warm up\n-------"));
    assert!(out.contains("- 1/2 + 1/4"));
    assert!(!out.contains("steal"));
}

#[tokio::test]
async fn test_client_search_parameter() {
    let server = start_server().await;
    seed(&server.store, json!({"chatInput": "Algebra", "createdAt": days_ago(0)})).await;
    seed(&server.store, json!({"chatInput": "Poetry", "createdAt": days_ago(0)})).await;

    let client = WorksheetClient::new(&server.base_url);
    let page = client
        .fetch_page(&PageQuery {
            search: Some("poe".to_string()),
            ..PageQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.items[0].subject, "Poetry");
}

#[tokio::test]
async fn test_client_error_state_on_unreachable_server() {
    // Bind then drop to obtain a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = WorksheetClient::new(&format!("http://{}", addr));
    let mut view = ListView::new();
    view.refresh(&client, &PageQuery::default()).await;
    assert!(matches!(view.state(), ListState::Error(_)));
    assert!(view.render().contains("retry"));
}

#[tokio::test]
async fn test_client_error_state_on_bad_status() {
    let server = start_server().await;
    let client = WorksheetClient::new(&format!("{}/missing-prefix", server.base_url));
    let mut view = ListView::new();
    view.refresh(&client, &PageQuery::default()).await;
    assert!(matches!(view.state(), ListState::Error(m) if m.contains("404")));
}
