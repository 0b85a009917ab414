use assert_matches::assert_matches;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zert_sdk::{IndexerNoteSource, NoteSource, ZertSdkError};

//=============================================================================
// Canned HTTP indexer
//=============================================================================

struct Indexer {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

/// Answers every connection with `response`, or never answers when `None`
async fn indexer(response: Option<String>) -> Indexer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let seen = requests.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let response = response.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                if let Some(line) = request.lines().next() {
                    seen.lock().unwrap().push(line.to_string());
                }
                match response {
                    Some(response) => {
                        let _ = stream.write_all(response.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    },
                    None => tokio::time::sleep(Duration::from_secs(5)).await,
                }
            });
        }
    });

    Indexer { url, requests }
}

fn http(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn source(url: &str, timeout_ms: u64) -> IndexerNoteSource {
    IndexerNoteSource::new(url, Duration::from_millis(timeout_ms)).unwrap()
}

//=============================================================================
// Tests
//=============================================================================

#[tokio::test]
async fn test_page_is_read_from_the_commitments_endpoint() {
    let body = r#"{"commitments":[{"index":5,"encryptedOutput":"0a0b"},{"index":6,"encryptedOutput":"0c"}],"total":7,"start":5,"end":7,"hasMore":false}"#;
    let indexer = indexer(Some(http("200 OK", body))).await;

    let page = source(&indexer.url, 2_000).fetch_notes_from(5, 4).await.unwrap();
    assert_eq!(page.start, 5);
    assert_eq!(page.total, 7);
    assert_eq!(page.notes.len(), 2);
    assert_eq!(page.notes[0].ciphertext, vec![0x0a, 0x0b]);

    let requests = indexer.requests.lock().unwrap().clone();
    assert_eq!(requests, vec!["GET /commitments?start=5&end=9 HTTP/1.1".to_string()]);
}

#[tokio::test]
async fn test_server_error_is_retryable_transport_failure() {
    let indexer = indexer(Some(http("503 Service Unavailable", "{}"))).await;

    let err = source(&indexer.url, 2_000).fetch_notes_from(0, 10).await.unwrap_err();
    assert_matches!(err, ZertSdkError::Transport(_));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_transport_failure() {
    let indexer = indexer(Some(http("200 OK", "<html>maintenance</html>"))).await;

    let err = source(&indexer.url, 2_000).fetch_notes_from(0, 10).await.unwrap_err();
    assert_matches!(err, ZertSdkError::Transport(ref msg) if msg.contains("bad indexer response"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_slow_indexer_times_out_as_transport_failure() {
    let indexer = indexer(None).await;

    let started = std::time::Instant::now();
    let err = source(&indexer.url, 100).fetch_notes_from(0, 10).await.unwrap_err();
    assert_matches!(err, ZertSdkError::Transport(_));
    assert!(err.is_retryable());
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_unreachable_indexer_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = source(&url, 2_000).fetch_notes_from(0, 10).await.unwrap_err();
    assert_matches!(err, ZertSdkError::Transport(_));
}
