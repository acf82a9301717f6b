use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use structure_sync::notion::{NotionClient, NOTION_VERSION};
use structure_sync_core::blocks::{BlockContent, RichText};
use structure_sync_core::contract::{BlockStore, StoreError};

/// A canned HTTP response: status line, extra headers, body.
type Canned = (u16, Vec<(&'static str, &'static str)>, String);

/// Status that makes the server read the request and close without answering.
const HANG_UP: u16 = 0;

/// Serves `responses` in order, one per connection, and records each raw request.
async fn serve(responses: Vec<Canned>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    tokio::spawn(async move {
        for (status, headers, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            seen.lock().unwrap().push(request);
            if status == HANG_UP {
                drop(socket);
                continue;
            }
            let mut response = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                body.len()
            );
            for (name, value) in headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str("\r\n");
            response.push_str(&body);
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });
    (base_url, requests)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn empty_page() -> String {
    json!({"object": "list", "results": [], "has_more": false, "next_cursor": null}).to_string()
}

fn client(base_url: &str) -> NotionClient {
    NotionClient::new("secret_test", base_url)
        .unwrap()
        .with_initial_backoff(Duration::from_millis(10))
}

#[tokio::test]
async fn list_children_sends_auth_and_version_headers() {
    let (base_url, requests) = serve(vec![(200, vec![], empty_page())]).await;
    let page = client(&base_url)
        .list_children("abc", Some("cur".into()))
        .await
        .unwrap();
    assert!(page.results.is_empty());

    let requests = requests.lock().unwrap();
    let request = requests[0].to_lowercase();
    assert!(request.starts_with("get /v1/blocks/abc/children?page_size=100&start_cursor=cur"));
    assert!(request.contains("authorization: bearer secret_test"));
    assert!(request.contains(&format!("notion-version: {NOTION_VERSION}")));
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let (base_url, requests) = serve(vec![
        (503, vec![], "{}".into()),
        (429, vec![("retry-after", "0")], "{}".into()),
        (200, vec![], empty_page()),
    ])
    .await;
    client(&base_url).list_children("abc", None).await.unwrap();
    assert_eq!(requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn retries_stop_after_three_attempts() {
    let (base_url, requests) = serve(vec![
        (500, vec![], "one".into()),
        (500, vec![], "two".into()),
        (500, vec![], "three".into()),
    ])
    .await;
    let err = client(&base_url).list_children("abc", None).await.unwrap_err();
    assert!(matches!(err, StoreError::Api { status: 500, ref body, .. } if body == "three"));
    assert_eq!(requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn client_errors_fail_immediately() {
    let (base_url, requests) = serve(vec![(
        401,
        vec![],
        json!({"object": "error", "code": "unauthorized"}).to_string(),
    )])
    .await;
    let err = client(&base_url).list_children("abc", None).await.unwrap_err();
    assert!(matches!(err, StoreError::Api { status: 401, .. }));
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn append_posts_children_and_returns_created_blocks() {
    let created = json!({
        "object": "list",
        "results": [{
            "object": "block",
            "id": "new-1",
            "has_children": false,
            "type": "toggle",
            "toggle": {"rich_text": [{"type": "text", "text": {"content": "🌿 main"}, "plain_text": "🌿 main"}]}
        }],
        "has_more": false
    });
    let (base_url, requests) = serve(vec![(200, vec![], created.to_string())]).await;
    let blocks = client(&base_url)
        .append_children(
            "grouping",
            vec![BlockContent::toggle(vec![RichText::text("🌿 main")], vec![])],
        )
        .await
        .unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, "new-1");

    let requests = requests.lock().unwrap();
    assert!(requests[0].starts_with("PATCH /v1/blocks/grouping/children"));
    assert!(requests[0].contains(r#"{"children":[{"type":"toggle""#));
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let (base_url, _) = serve(vec![(200, vec![], "not json".into())]).await;
    let err = client(&base_url).list_children("abc", None).await.unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }));
}

fn created_toggle() -> String {
    json!({
        "object": "list",
        "results": [{
            "object": "block",
            "id": "record-1",
            "has_children": true,
            "type": "toggle",
            "toggle": {"rich_text": []}
        }],
        "has_more": false
    })
    .to_string()
}

fn record() -> Vec<BlockContent> {
    vec![BlockContent::toggle(vec![RichText::text("abc1234")], vec![])]
}

#[tokio::test]
async fn append_is_not_replayed_after_the_request_was_sent() {
    let (base_url, requests) = serve(vec![
        (HANG_UP, vec![], String::new()),
        (200, vec![], created_toggle()),
    ])
    .await;
    let err = client(&base_url)
        .append_children("grouping", record())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Transport { .. }));
    assert_eq!(requests.lock().unwrap().len(), 1, "append must not be sent twice");
}

#[tokio::test]
async fn append_is_not_replayed_after_a_server_error() {
    let (base_url, requests) = serve(vec![
        (503, vec![], "{}".into()),
        (200, vec![], created_toggle()),
    ])
    .await;
    let err = client(&base_url)
        .append_children("grouping", record())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Api { status: 503, .. }));
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn rate_limited_append_is_replayed() {
    let (base_url, requests) = serve(vec![
        (429, vec![("retry-after", "0")], "{}".into()),
        (200, vec![], created_toggle()),
    ])
    .await;
    let blocks = client(&base_url)
        .append_children("grouping", record())
        .await
        .unwrap();
    assert_eq!(blocks[0].id, "record-1");
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn reads_are_replayed_after_a_dropped_connection() {
    let (base_url, requests) = serve(vec![
        (HANG_UP, vec![], String::new()),
        (200, vec![], empty_page()),
    ])
    .await;
    client(&base_url).list_children("abc", None).await.unwrap();
    assert_eq!(requests.lock().unwrap().len(), 2);
}
