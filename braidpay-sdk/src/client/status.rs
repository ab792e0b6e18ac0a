//! Verification endpoint client (browser-side code → host backend).

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{StatusCheckRequest, StatusCheckResponse};

/// Something that can answer a status check.
///
/// [`StatusClient`] is the HTTP implementation; the poller is generic over
/// this trait so it can be driven by any transport.
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn check(&self, request: &StatusCheckRequest) -> Result<StatusCheckResponse, ClientError>;
}

/// Typed HTTP client for the host **verification endpoint**.
///
/// Every call is a `POST` of a JSON [`StatusCheckRequest`]; the response is a
/// JSON [`StatusCheckResponse`].  Non-2xx answers are errors.
#[derive(Debug, Clone)]
pub struct StatusClient {
    http: Client,
    endpoint: Url,
}

impl StatusClient {
    /// Create a client posting to an absolute endpoint URL.
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: Client::new(),
            endpoint,
        }
    }

    /// Create a client for an endpoint path relative to the host origin,
    /// e.g. `/api/check-payment-status`.
    pub fn with_base(base_url: &Url, endpoint: &str) -> Result<Self, ClientError> {
        Ok(Self::new(base_url.join(endpoint)?))
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl StatusSource for StatusClient {
    async fn check(&self, request: &StatusCheckRequest) -> Result<StatusCheckResponse, ClientError> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
