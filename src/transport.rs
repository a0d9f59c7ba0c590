use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, header::HeaderMap, StatusCode};

use crate::ApiRequest;

/// Status line and headers of an HTTP response.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// A response as received from the wire, before validation.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub head: ResponseHead,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            head: ResponseHead {
                status,
                headers: HeaderMap::new(),
            },
            body: body.into(),
        }
    }
}

/// Failure below the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Error from `reqwest`.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The request did not complete within the timeout.
    #[error("request timed out")]
    Timeout,
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Http(err) => {
                err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
            }
        }
    }
}

/// Sends a single request. Retrying is the executor's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .header(header::ACCEPT, "application/json")
            .timeout(self.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some((user, password)) = &request.basic_auth {
            builder = builder.basic_auth(user, Some(password));
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder.send().await?;
        let head = ResponseHead {
            status: response.status(),
            headers: response.headers().clone(),
        };
        let body = response.bytes().await?;

        Ok(RawResponse {
            head,
            body: body.to_vec(),
        })
    }
}
