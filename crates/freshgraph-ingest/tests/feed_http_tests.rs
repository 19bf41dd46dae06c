//! The HTTP page source against a mock events API.

use freshgraph_ingest::{HttpClient, HttpConfig, IngestError, PageSource, Paginator, RetryPolicy};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpClient {
    HttpClient::new(&HttpConfig {
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            backoff_factor: Duration::from_millis(1),
            ..RetryPolicy::default()
        },
        ..HttpConfig::default()
    })
    .unwrap()
}

fn event(id: i64) -> Value {
    json!({
        "id": id,
        "event_type_id": 8,
        "message_id": format!("msg-{id}"),
        "state": 2,
        "state_name": "COMPLETE",
        "state_reason": null,
        "url": format!("/api/1/events/{id}"),
        "search_key": id.to_string(),
        "builds": []
    })
}

fn page(ids: &[i64], next: Option<&str>) -> Value {
    json!({
        "items": ids.iter().map(|id| event(*id)).collect::<Vec<_>>(),
        "meta": { "next": next, "per_page": 2 }
    })
}

fn feed_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/api/1/events/?per_page=2&page=1", server.uri())).unwrap()
}

#[tokio::test]
async fn walks_three_pages_exactly_once_each() {
    let server = MockServer::start().await;
    let page2 = format!("{}/api/1/events/?page=2&per_page=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/1/events/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1, 2], Some(&page2))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/1/events/"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(&[3, 4], Some("/api/1/events/?page=3&per_page=2"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/1/events/"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[5], None)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    let mut pages = Paginator::new(&client, feed_url(&server));
    let mut ids = Vec::new();
    while let Some(page) = pages.next_page().await.unwrap() {
        ids.extend(page.items.iter().filter_map(|event| event["id"].as_i64()));
    }

    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(pages.pages_fetched(), 3);
}

#[tokio::test]
async fn retries_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&[1], None)))
        .expect(1)
        .mount(&server)
        .await;

    let page = client().fetch_page(&feed_url(&server)).await.unwrap();
    assert_eq!(page.items.len(), 1);
}

#[tokio::test]
async fn gives_up_after_the_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let err = client().fetch_page(&feed_url(&server)).await.unwrap_err();
    assert!(matches!(err, IngestError::Status { status: 502, .. }));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client().fetch_page(&feed_url(&server)).await.unwrap_err();
    assert!(matches!(err, IngestError::Status { status: 404, .. }));
}

#[tokio::test]
async fn malformed_page_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client();
    let mut pages = Paginator::new(&client, feed_url(&server));
    let err = pages.next_page().await.unwrap_err();
    assert!(matches!(err, IngestError::MalformedPage { .. }));
}
