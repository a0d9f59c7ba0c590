use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::time::sleep;

use crate::{
    transport::{ResponseHead, Transport},
    ActitoError, ActitoOptions, NetworkError, NetworkRequest, Result,
};

/// Status codes treated as success.
pub const ACCEPTED_STATUS: Range<u16> = 200..300;

/// Executes requests through a [`Transport`], retrying transient failures
/// with exponential backoff.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    options: ActitoOptions,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, options: ActitoOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &ActitoOptions {
        &self.options
    }

    /// Runs the request, retrying up to `max_retries` times on retryable
    /// failures.
    ///
    /// Non-retryable failures return immediately. When every attempt fails
    /// with a retryable error the result is [`NetworkError::Inaccessible`].
    pub async fn perform(
        &self,
        request: NetworkRequest,
    ) -> std::result::Result<(ResponseHead, Option<Vec<u8>>), NetworkError> {
        let mut attempt = 0usize;
        loop {
            let err = match self.attempt(&request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= request.max_retries {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "giving up on {} {} after {} attempts: {}",
                    request.request.method,
                    request.request.url,
                    attempt + 1,
                    err
                );
                return Err(NetworkError::Inaccessible {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            self.wait_before_retry(attempt).await;
            attempt += 1;
        }
    }

    /// Runs the request and decodes the JSON body.
    pub async fn perform_decode<T: DeserializeOwned>(&self, request: NetworkRequest) -> Result<T> {
        let (_, body) = self.perform(request).await?;
        let body = body.ok_or(NetworkError::NoResponseData)?;
        serde_json::from_slice(&body).map_err(|err| {
            ActitoError::Decode(format!(
                "invalid response JSON: {err}; body: {}",
                String::from_utf8_lossy(&body)
            ))
        })
    }

    async fn attempt(
        &self,
        request: &NetworkRequest,
    ) -> std::result::Result<(ResponseHead, Option<Vec<u8>>), NetworkError> {
        let response = self.transport.send(&request.request).await?;
        let status = response.head.status.as_u16();
        let body = if response.body.is_empty() && !request.allow_empty_data {
            None
        } else {
            Some(response.body)
        };

        if !ACCEPTED_STATUS.contains(&status) {
            return Err(NetworkError::Validation {
                response: response.head,
                body,
                accepted: ACCEPTED_STATUS,
            });
        }

        Ok((response.head, body))
    }

    async fn wait_before_retry(&self, attempt: usize) {
        let delay = self.options.retry_delay(attempt);

        #[cfg(feature = "tracing")]
        tracing::debug!("retrying request after {} ms", delay.as_millis());

        sleep(delay).await;
    }
}
