//! HTTP transport used for the validation probe.

use std::future::Future;
use std::time::Duration;

use reqwest::header::HeaderMap;
use tracing::debug;

use crate::error::TransportError;

/// A response to a probe: the status code and the raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ProbeResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a `200 OK` response with a JSON body.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to issue the validation probe.
///
/// Implementations perform exactly one GET per call and don't retry. Any
/// timeout is the implementation's business.
pub trait Transport {
    /// Sends a GET request to `url` with the given headers.
    fn get(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> impl Future<Output = Result<ProbeResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for &T {
    fn get(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> impl Future<Output = Result<ProbeResponse, TransportError>> + Send {
        (**self).get(url, headers)
    }
}

/// Builder for configuring an [`HttpTransport`].
#[derive(Debug, Default)]
pub struct HttpTransportBuilder {
    timeout: Option<Duration>,
}

impl HttpTransportBuilder {
    /// Bounds each probe to `timeout`. Without it a hanging server hangs the flow.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the [`HttpTransport`].
    ///
    /// ## Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (e.g. TLS
    /// initialization failure).
    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpTransport {
            client: builder.build()?,
        })
    }
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with no timeout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<ProbeResponse, TransportError> {
        let response = self.client.get(url).headers(headers).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        debug!(status, bytes = body.len(), "probe response received");

        Ok(ProbeResponse { status, body })
    }
}
