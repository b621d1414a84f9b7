//! `HttpClient` over reqwest with transport-level retry.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, TransportRetry},
};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("catalog-mirror/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Desktop HTTP transport.
///
/// Failed sends are retried with the configured [`TransportRetry`]:
/// - `GET`: connection errors, timeouts, 429 and 5xx
/// - `POST`: connection errors and 429 only, since a timeout or 5xx may
///   follow a create the server already committed
///
/// The last response is returned even when it is still an error status, so
/// providers can map it.
pub struct ReqwestHttpClient {
    inner: Client,
    retry: TransportRetry,
}

/// What one send produced before the retry decision.
enum Attempt {
    Done(HttpResponse),
    Retryable(HttpResponse),
    /// `sent` is false when the connection was never established
    Failed { error: BridgeError, sent: bool },
}

impl Attempt {
    fn may_retry(&self, method: HttpMethod) -> bool {
        match self {
            Attempt::Done(_) => false,
            Attempt::Retryable(response) => method.is_idempotent() || response.status == 429,
            Attempt::Failed { sent, .. } => method.is_idempotent() || !sent,
        }
    }
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let inner = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Cannot build HTTP client: {e}")))?;
        Ok(Self::from_client(inner))
    }

    /// Use an existing reqwest client (proxy or TLS settings chosen by the host).
    pub fn from_client(inner: Client) -> Self {
        Self {
            inner,
            retry: TransportRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: TransportRetry) -> Self {
        self.retry = retry;
        self
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }

    async fn send_once(&self, request: &HttpRequest) -> Attempt {
        let mut builder = self
            .inner
            .request(Self::method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Failed {
                    error: transport_error(&e),
                    sent: !e.is_connect(),
                }
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_owned())))
            .collect();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return Attempt::Failed {
                    error: transport_error(&e),
                    sent: true,
                }
            }
        };

        let response = HttpResponse {
            status,
            headers,
            body,
        };
        if response.should_retry() {
            Attempt::Retryable(response)
        } else {
            Attempt::Done(response)
        }
    }
}

fn transport_error(e: &reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::OperationFailed(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        BridgeError::OperationFailed(format!("Connection failed: {e}"))
    } else {
        BridgeError::OperationFailed(e.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(method = %request.method, url = %request.url, attempt, "Sending request");

            let outcome = self.send_once(&request).await;
            let retry = attempt < attempts && outcome.may_retry(request.method);
            let retry_reason = match outcome {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retryable(response) if !retry => return Ok(response),
                Attempt::Failed { error, .. } if !retry => return Err(error),
                Attempt::Retryable(response) => format!("status {}", response.status),
                Attempt::Failed { error, .. } => error.to_string(),
            };

            let delay = self.retry.delay_before(attempt);
            warn!(
                url = %request.url,
                attempt,
                reason = %retry_reason,
                delay_ms = delay.as_millis() as u64,
                "Retrying request"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_retry_configuration() {
        let client = ReqwestHttpClient::new()
            .unwrap()
            .with_retry(TransportRetry::disabled());
        assert_eq!(client.retry.attempts, 1);
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Post), reqwest::Method::POST);
    }

    fn response(status: u16) -> HttpResponse {
        HttpResponse::new(status, Vec::new())
    }

    #[test]
    fn test_post_is_not_retried_once_sent() {
        let timed_out = Attempt::Failed {
            error: BridgeError::OperationFailed("Request timed out".to_string()),
            sent: true,
        };
        let refused = Attempt::Failed {
            error: BridgeError::OperationFailed("Connection failed".to_string()),
            sent: false,
        };
        let bad_gateway = Attempt::Retryable(response(502));
        let throttled = Attempt::Retryable(response(429));

        assert!(!timed_out.may_retry(HttpMethod::Post));
        assert!(!bad_gateway.may_retry(HttpMethod::Post));
        assert!(refused.may_retry(HttpMethod::Post));
        assert!(throttled.may_retry(HttpMethod::Post));

        assert!(timed_out.may_retry(HttpMethod::Get));
        assert!(bad_gateway.may_retry(HttpMethod::Get));
        assert!(!Attempt::Done(response(201)).may_retry(HttpMethod::Get));
    }

    /// Answers every connection with `status` and counts the connections.
    async fn serve_status(status: u16) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {status} Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (url, hits)
    }

    fn fast_retry() -> TransportRetry {
        TransportRetry {
            attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_create_with_server_error_is_sent_once() {
        let (url, hits) = serve_status(502).await;
        let client = ReqwestHttpClient::new().unwrap().with_retry(fast_retry());

        let response = client
            .execute(HttpRequest::post(url).json(&serde_json::json!({"name": "Shoes"})).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status, 502);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listing_with_server_error_is_retried() {
        let (url, hits) = serve_status(503).await;
        let client = ReqwestHttpClient::new().unwrap().with_retry(fast_retry());

        let response = client.execute(HttpRequest::get(url)).await.unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_millis(500))
            .unwrap()
            .with_retry(TransportRetry::disabled());

        // Nothing listens on the discard port in test environments
        let result = client.execute(HttpRequest::get("http://127.0.0.1:9/")).await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }
}
