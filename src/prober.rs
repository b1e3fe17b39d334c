use crate::error::{PickerError, Result};
use crate::traits::Prober;
use crate::types::{Endpoint, ProbeFailure, ProbeResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// HTTP reachability probe.
///
/// 逻辑:
/// 1. 发送 HEAD 请求 (禁用缓存), 只关心请求是否在预算内完成
/// 2. 不检查状态码: 任何完成的响应都视为可达
/// 3. 超时或传输错误 (DNS, TLS, 拒绝连接) 视为失败
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, endpoint: &Endpoint, budget: Duration) -> ProbeResult {
        let start = Instant::now();
        let request = self.client.head(endpoint.as_str()).send();

        let result = match timeout(budget, request).await {
            // Status is deliberately ignored; the response is treated as opaque.
            Ok(Ok(_resp)) => ProbeResult::success(endpoint.clone(), round_ms(start.elapsed())),
            Ok(Err(e)) => ProbeResult::transport(endpoint.clone(), e.to_string()),
            Err(_) => ProbeResult::timeout(endpoint.clone(), budget.as_millis() as u64),
        };

        match (&result.elapsed_ms, &result.error_message) {
            (Some(ms), _) => tracing::debug!(%endpoint, elapsed_ms = ms, "Probe succeeded"),
            (None, Some(msg)) => tracing::debug!(%endpoint, error = %msg, "Probe failed"),
            _ => {}
        }

        result
    }
}

/// Elapsed time to the nearest whole millisecond (half rounds up).
pub(crate) fn round_ms(elapsed: Duration) -> u64 {
    ((elapsed.as_micros() + 500) / 1000) as u64
}

impl ProbeResult {
    /// The error this result would surface as, if it were surfaced.
    pub fn failure_kind(&self) -> Option<PickerError> {
        let endpoint = self.endpoint.to_string();
        match self.failure? {
            ProbeFailure::Timeout(timeout_ms) => Some(PickerError::ProbeTimeout {
                endpoint,
                timeout_ms,
            }),
            ProbeFailure::Transport => Some(PickerError::ProbeTransport {
                endpoint,
                reason: self.error_message.clone().unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP server that answers every request with the given status.
    async fn serve_status(status: &'static str) -> std::io::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let resp = format!(
                        "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        status
                    );
                    let _ = socket.write_all(resp.as_bytes()).await;
                });
            }
        });
        Ok(format!("http://{}", addr))
    }

    /// Accepts connections but never answers.
    async fn serve_silence() -> std::io::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        Ok(format!("http://{}", addr))
    }

    #[test]
    fn elapsed_rounds_to_nearest_millisecond() {
        assert_eq!(round_ms(Duration::from_micros(2_999_600)), 3000);
        assert_eq!(round_ms(Duration::from_micros(2_999_400)), 2999);
        assert_eq!(round_ms(Duration::from_micros(1_500)), 2);
        assert_eq!(round_ms(Duration::from_micros(400)), 0);
    }

    #[tokio::test]
    async fn any_response_counts_as_reachable() -> Result<()> {
        let prober = HttpProber::new()?;
        for status in ["200 OK", "404 Not Found", "503 Service Unavailable"] {
            let url = serve_status(status).await?;
            let res = prober
                .probe(&Endpoint::new(&url), Duration::from_secs(5))
                .await;
            assert!(res.succeeded, "{} should count as reachable", status);
            assert!(res.elapsed_ms.is_some());
            assert!(res.failure_kind().is_none());
        }
        Ok(())
    }

    #[tokio::test]
    async fn silent_endpoint_times_out() -> Result<()> {
        let prober = HttpProber::new()?;
        let url = serve_silence().await?;
        let res = prober
            .probe(&Endpoint::new(&url), Duration::from_millis(200))
            .await;
        assert!(!res.succeeded);
        assert_eq!(res.failure, Some(ProbeFailure::Timeout(200)));
        assert!(matches!(
            res.failure_kind(),
            Some(PickerError::ProbeTimeout { timeout_ms: 200, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn refused_connection_is_transport_failure() -> Result<()> {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let prober = HttpProber::new()?;
        let res = prober
            .probe(&Endpoint::new(&format!("http://{}", addr)), Duration::from_secs(5))
            .await;
        assert!(!res.succeeded);
        assert_eq!(res.failure, Some(ProbeFailure::Transport));
        assert!(matches!(
            res.failure_kind(),
            Some(PickerError::ProbeTransport { .. })
        ));
        Ok(())
    }
}
