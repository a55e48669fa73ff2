//! Guest Sheet Client
//!
//! HTTP client for the remote guest collection. Both operations are plain
//! GETs against one base URL; connection failures are retried according to
//! the configured [`RetryPolicy`], while any answer from the remote is final.

use super::error::{GuestError, GuestResult};
use super::types::{duplicate_ids, GuestRecord, RawGuestRecord};
use crate::retry::RetryPolicy;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::Instrument;
use uuid::Uuid;

/// Client for the guest sheet endpoint
#[derive(Debug, Clone)]
pub struct GuestClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl GuestClient {
    /// Create a client for `base_url`.
    ///
    /// No cookie store is attached, so no credentials ever go out with a
    /// request. No request timeout is set either; a hung connection is bounded
    /// only by the OS.
    pub fn new(base_url: Url, retry: RetryPolicy) -> GuestResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("rsvp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch the full guest list, in the order the remote returns it
    pub async fn fetch_guests(&self) -> GuestResult<Vec<GuestRecord>> {
        let request_id = Uuid::new_v4();

        async {
            let result = self.try_fetch_guests().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Error fetching guests");
            }
            result
        }
        .instrument(tracing::info_span!("fetch_guests", request_id = %request_id))
        .await
    }

    /// Record a guest's answer. Returns the remote's `success` flag as-is.
    ///
    /// The remote only speaks GET, so this mutation travels as a query string
    /// with `action=update`. That breaks GET's no-side-effects contract; any
    /// cache or prefetcher between here and the sheet could replay it. Kept
    /// for compatibility with the deployed endpoint.
    pub async fn update_guest_response(
        &self,
        guest_id: i64,
        name: &str,
        is_attending: bool,
    ) -> GuestResult<bool> {
        let request_id = Uuid::new_v4();

        async {
            let result = self.try_update(guest_id, name, is_attending).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Error updating guest response");
            }
            result
        }
        .instrument(tracing::info_span!(
            "update_guest_response",
            request_id = %request_id,
            guest_id
        ))
        .await
    }

    async fn try_fetch_guests(&self) -> GuestResult<Vec<GuestRecord>> {
        let query = [("t", cache_buster())];
        let response = self.get_with_retry(&query, false).await?;

        let body = response.text().await?;
        tracing::debug!(payload = %body, "Guest list response");

        let parsed: GuestListResponse = serde_json::from_str(&body)?;
        let guests = parsed
            .guests
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                raw.normalize()
                    .map_err(|reason| GuestError::InvalidRecord { index, reason })
            })
            .collect::<GuestResult<Vec<_>>>()?;

        let repeated = duplicate_ids(&guests);
        if !repeated.is_empty() {
            tracing::warn!(ids = ?repeated, "Guest list contains duplicate ids");
        }

        tracing::info!(count = guests.len(), "Fetched guests");
        Ok(guests)
    }

    async fn try_update(&self, guest_id: i64, name: &str, is_attending: bool) -> GuestResult<bool> {
        let query = [
            ("id", guest_id.to_string()),
            ("name", name.to_string()),
            ("isAttending", is_attending.to_string()),
            ("action", "update".to_string()),
            ("t", cache_buster()),
        ];
        let response = self.get_with_retry(&query, true).await?;

        let body = response.text().await?;
        tracing::debug!(payload = %body, "Update response");

        let parsed: UpdateResponse = serde_json::from_str(&body)?;
        tracing::info!(success = parsed.success, "Guest response submitted");
        Ok(parsed.success)
    }

    /// GET the base URL with `query`, retrying connection-level failures only
    async fn get_with_retry(&self, query: &[(&str, String)], no_cache: bool) -> GuestResult<Response> {
        let response = self
            .retry
            .run(
                |attempt| {
                    tracing::debug!(attempt, url = %self.base_url, "Sending request");
                    let mut request = self
                        .client
                        .get(self.base_url.clone())
                        .query(query)
                        .header(ACCEPT, "application/json");
                    if no_cache {
                        request = request.header(CACHE_CONTROL, "no-cache");
                    }
                    request.send()
                },
                is_network_failure,
            )
            .await
            .map_err(|failure| {
                if is_network_failure(&failure.error) {
                    GuestError::Network {
                        attempts: failure.attempts,
                        source: failure.error,
                    }
                } else {
                    GuestError::Request(failure.error)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GuestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

/// Send errors worth another attempt. Status codes never reach here since
/// `send` resolves `Ok` for any response.
fn is_network_failure(err: &reqwest::Error) -> bool {
    !(err.is_builder() || err.is_redirect())
}

fn cache_buster() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

// ============================================
// Response DTOs
// ============================================

#[derive(Debug, Deserialize)]
struct GuestListResponse {
    guests: Vec<RawGuestRecord>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guests::types::NormalizeError;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Endpoint that hangs up on the first `drops` connections without a
    /// response, then answers every later request with `body`.
    struct FlakyEndpoint {
        url: Url,
        connections: Arc<AtomicUsize>,
        served: Arc<Mutex<Vec<String>>>,
        task: tokio::task::JoinHandle<()>,
    }

    impl FlakyEndpoint {
        async fn start(drops: usize, body: String) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = Url::parse(&format!("http://{}/exec", listener.local_addr().unwrap())).unwrap();
            let connections = Arc::new(AtomicUsize::new(0));
            let served = Arc::new(Mutex::new(Vec::new()));

            let task = {
                let connections = Arc::clone(&connections);
                let served = Arc::clone(&served);
                tokio::spawn(async move {
                    loop {
                        let (mut stream, _) = match listener.accept().await {
                            Ok(conn) => conn,
                            Err(_) => return,
                        };
                        if connections.fetch_add(1, Ordering::SeqCst) < drops {
                            drop(stream);
                            continue;
                        }

                        let mut request = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                            match stream.read(&mut buf).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => request.extend_from_slice(&buf[..n]),
                            }
                        }
                        let request_line = String::from_utf8_lossy(&request)
                            .lines()
                            .next()
                            .unwrap_or_default()
                            .to_string();
                        served.lock().unwrap().push(request_line);

                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = stream.write_all(response.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    }
                })
            };

            Self {
                url,
                connections,
                served,
                task,
            }
        }

        fn client(&self) -> GuestClient {
            GuestClient::new(self.url.clone(), RetryPolicy::linear(3, Duration::from_millis(5))).unwrap()
        }

        fn connections(&self) -> usize {
            self.connections.load(Ordering::SeqCst)
        }

        fn served(&self) -> Vec<String> {
            self.served.lock().unwrap().clone()
        }
    }

    impl Drop for FlakyEndpoint {
        fn drop(&mut self) {
            self.task.abort();
        }
    }

    fn client_for(server: &ServerGuard) -> GuestClient {
        let url = Url::parse(&format!("{}/exec", server.url())).unwrap();
        GuestClient::new(url, RetryPolicy::linear(3, Duration::from_millis(5))).unwrap()
    }

    fn guest_list_body() -> String {
        json!({
            "guests": [
                { "id": 3, "Nome": "Carla", "Respondeu": true, "Confirmado": true, "Data": "2024-05-10" },
                { "id": 1, "name": "Alice", "hasResponded": true, "isAttending": false },
                { "id": 2, "Nome": "Bruno" }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_fetch_guests_normalizes_in_remote_order() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::Regex(r"^t=\d+$".to_string()))
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(guest_list_body())
            .expect(1)
            .create_async()
            .await;

        let guests = client_for(&server).fetch_guests().await.unwrap();
        mock.assert_async().await;

        let ids: Vec<i64> = guests.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        assert_eq!(guests[0].name, "Carla");
        assert!(guests[0].has_responded && guests[0].is_attending);
        assert_eq!(guests[0].response_date.as_deref(), Some("2024-05-10"));

        assert_eq!(guests[1].name, "Alice");
        assert!(guests[1].has_responded && !guests[1].is_attending);

        assert_eq!(guests[2].name, "Bruno");
        assert!(!guests[2].has_responded);
        assert_eq!(guests[2].response_date, None);
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let err = client_for(&server).fetch_guests().await.unwrap_err();
        mock.assert_async().await;

        match err {
            GuestError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_exhausts_retry_budget() {
        // Grab a free port and release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/exec", addr)).unwrap();
        let client = GuestClient::new(url, RetryPolicy::linear(3, Duration::from_millis(1))).unwrap();

        let err = client.fetch_guests().await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, GuestError::Network { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_fetch_recovers_after_two_dropped_connections() {
        let endpoint = FlakyEndpoint::start(2, guest_list_body()).await;

        let guests = endpoint.client().fetch_guests().await.unwrap();

        assert_eq!(endpoint.connections(), 3);
        let ids: Vec<i64> = guests.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        let served = endpoint.served();
        assert_eq!(served.len(), 1);
        assert!(served[0].starts_with("GET /exec?t="));
    }

    #[tokio::test]
    async fn test_update_recovers_after_two_dropped_connections() {
        let endpoint = FlakyEndpoint::start(2, json!({ "success": true }).to_string()).await;

        let ok = endpoint
            .client()
            .update_guest_response(42, "Alice", true)
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(endpoint.connections(), 3);

        let served = endpoint.served();
        assert_eq!(served.len(), 1);
        assert!(served[0].contains("id=42&name=Alice&isAttending=true&action=update&t="));
    }

    #[tokio::test]
    async fn test_update_gives_up_after_three_dropped_connections() {
        let endpoint = FlakyEndpoint::start(usize::MAX, String::new()).await;

        let err = endpoint
            .client()
            .update_guest_response(42, "Alice", true)
            .await
            .unwrap_err();

        assert!(matches!(err, GuestError::Network { attempts: 3, .. }));
        assert_eq!(endpoint.connections(), 3);
        assert!(endpoint.served().is_empty());
    }

    #[test]
    fn test_client_exposes_endpoint_and_policy() {
        let url = Url::parse("https://example.com/exec?sheet=guests").unwrap();
        let policy = RetryPolicy::linear(4, Duration::from_millis(250));
        let client = GuestClient::new(url.clone(), policy).unwrap();

        assert_eq!(client.base_url(), &url);
        assert_eq!(client.retry_policy(), &policy);
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = client_for(&server).fetch_guests().await.unwrap_err();
        assert!(matches!(err, GuestError::Decode(_)));
    }

    #[tokio::test]
    async fn test_missing_guests_field_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "rows": [] }).to_string())
            .create_async()
            .await;

        let err = client_for(&server).fetch_guests().await.unwrap_err();
        assert!(matches!(err, GuestError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unnamed_guest_reports_index() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "guests": [{ "id": 1, "name": "Alice" }, { "id": 2 }] }).to_string())
            .create_async()
            .await;

        let err = client_for(&server).fetch_guests().await.unwrap_err();
        match err {
            GuestError::InvalidRecord { index, reason } => {
                assert_eq!(index, 1);
                assert_eq!(reason, NormalizeError::MissingName);
            }
            other => panic!("expected invalid record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_independent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::Regex(r"^t=\d+$".to_string()))
            .with_status(200)
            .with_body(guest_list_body())
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let (first, second) = tokio::join!(client.fetch_guests(), client.fetch_guests());
        mock.assert_async().await;

        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_update_reports_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "42".into()),
                Matcher::UrlEncoded("name".into(), "Alice".into()),
                Matcher::UrlEncoded("isAttending".into(), "true".into()),
                Matcher::UrlEncoded("action".into(), "update".into()),
                Matcher::Regex(r"t=\d+".to_string()),
            ]))
            .match_header("accept", "application/json")
            .match_header("cache-control", "no-cache")
            .with_status(200)
            .with_body(json!({ "success": true }).to_string())
            .expect(1)
            .create_async()
            .await;

        let ok = client_for(&server)
            .update_guest_response(42, "Alice", true)
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(ok);
    }

    #[tokio::test]
    async fn test_update_reports_failure_flag_without_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "7".into()),
                Matcher::UrlEncoded("name".into(), "Ana Luísa".into()),
                Matcher::UrlEncoded("isAttending".into(), "false".into()),
                Matcher::UrlEncoded("action".into(), "update".into()),
            ]))
            .with_status(200)
            .with_body(json!({ "success": false }).to_string())
            .expect(1)
            .create_async()
            .await;

        let ok = client_for(&server)
            .update_guest_response(7, "Ana Luísa", false)
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_update_without_success_field_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/exec")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "status": "ok" }).to_string())
            .create_async()
            .await;

        let err = client_for(&server)
            .update_guest_response(1, "Alice", true)
            .await
            .unwrap_err();
        assert!(matches!(err, GuestError::Decode(_)));
    }
}
