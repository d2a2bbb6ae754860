//! Error-rate telemetry sampling.
//!
//! The controller pulls one sample per tick through the [`MetricSampler`]
//! trait. The production implementation fetches JSON samples over HTTP/1;
//! tests script their own samplers.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// A rolling error-rate reading for one running version.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AlarmSample {
    pub version_id: String,
    /// Average errors per evaluation period.
    pub error_rate: f64,
    /// Unix timestamp (milliseconds) of the end of the sampled window.
    pub window_end: u64,
}

/// Failure to obtain a sample. Never fatal on its own; the control loop
/// skips the tick and retries.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("telemetry unavailable: {0}")]
    Unavailable(String),
}

/// Source of error-rate samples for a running version.
pub trait MetricSampler: Send + Sync + 'static {
    fn sample(
        &self,
        version_id: &str,
    ) -> impl Future<Output = Result<AlarmSample, SamplerError>> + Send;
}

/// Pulls samples from a telemetry collector over HTTP/1.
///
/// Issues `GET http://{authority}{path_prefix}/{version_id}` and expects a
/// JSON [`AlarmSample`] body. Any connection, protocol, or decode failure
/// maps to [`SamplerError::Unavailable`].
#[derive(Debug, Clone)]
pub struct HttpSampler {
    /// Collector address (`host:port`).
    authority: String,
    /// Path prefix for sample lookups (e.g. `/metrics/error-rate`).
    path_prefix: String,
}

impl HttpSampler {
    pub fn new(authority: &str, path_prefix: &str) -> Self {
        Self {
            authority: authority.to_string(),
            path_prefix: path_prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl MetricSampler for HttpSampler {
    async fn sample(&self, version_id: &str) -> Result<AlarmSample, SamplerError> {
        let uri = format!("http://{}{}/{}", self.authority, self.path_prefix, version_id);

        let stream = tokio::net::TcpStream::connect(&self.authority)
            .await
            .map_err(|e| {
                debug!(error = %e, %uri, "telemetry connection failed");
                SamplerError::Unavailable(e.to_string())
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| {
                debug!(error = %e, %uri, "telemetry handshake failed");
                SamplerError::Unavailable(e.to_string())
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", &self.authority)
            .header("user-agent", "todo-rollout/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| SamplerError::Unavailable(e.to_string()))?;

        let resp = sender.send_request(req).await.map_err(|e| {
            debug!(error = %e, %uri, "telemetry request failed");
            SamplerError::Unavailable(e.to_string())
        })?;

        if !resp.status().is_success() {
            debug!(status = %resp.status(), %uri, "telemetry non-2xx");
            return Err(SamplerError::Unavailable(format!(
                "collector returned {}",
                resp.status()
            )));
        }

        use http_body_util::BodyExt;
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| SamplerError::Unavailable(e.to_string()))?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|e| {
            debug!(error = %e, %uri, "telemetry body decode failed");
            SamplerError::Unavailable(e.to_string())
        })
    }
}

/// Sample with a bounded per-call timeout. A timeout is indistinguishable
/// from an unavailable collector to the caller.
pub async fn sample_with_timeout<S: MetricSampler>(
    sampler: &S,
    version_id: &str,
    timeout: Duration,
) -> Result<AlarmSample, SamplerError> {
    match tokio::time::timeout(timeout, sampler.sample(version_id)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(%version_id, ?timeout, "telemetry sample timed out");
            Err(SamplerError::Unavailable("sample timed out".to_string()))
        }
    }
}
