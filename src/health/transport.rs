//! Probe transport: the actual health request/response exchange.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;
use url::Url;

/// Classified result of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Failure,
    /// The probe did not answer within its deadline. Counts as a failure.
    Timeout,
}

/// Performs the probe exchange against one destination address.
///
/// The prober loop owns classification and state; implementations only
/// talk to the network. Tests substitute a scripted implementation.
#[async_trait]
pub trait ProbeTransport: Send + Sync + 'static {
    async fn probe(&self, target: &Url, timeout: Duration) -> ProbeOutcome;
}

/// HTTP GET probe: any 2xx within the deadline is a success.
pub struct HttpProbeTransport {
    client: Client<HttpConnector, Body>,
}

impl HttpProbeTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpProbeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    async fn probe(&self, target: &Url, timeout: Duration) -> ProbeOutcome {
        let request = match Request::builder()
            .method("GET")
            .uri(target.as_str())
            .header("user-agent", "proxy-director-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(target = %target, error = %e, "Failed to build probe request");
                return ProbeOutcome::Failure;
            }
        };

        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                if response.status().is_success() {
                    ProbeOutcome::Success
                } else {
                    tracing::debug!(
                        target = %target,
                        status = %response.status(),
                        "Probe failed: non-success status"
                    );
                    ProbeOutcome::Failure
                }
            }
            Ok(Err(e)) => {
                tracing::debug!(target = %target, error = %e, "Probe failed: connection error");
                ProbeOutcome::Failure
            }
            Err(_) => {
                tracing::debug!(target = %target, "Probe failed: timeout");
                ProbeOutcome::Timeout
            }
        }
    }
}
