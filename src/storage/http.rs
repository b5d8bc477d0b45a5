//! Read-only HTTP(S) backend.

use std::time::Duration;

use url::Url;

use crate::resilience::RetryPolicy;
use crate::storage::AccessorError;

/// Fetches the configuration with a GET request.
#[derive(Debug, Clone)]
pub struct HttpAccessor {
    url: Url,
    client: reqwest::Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpAccessor {
    pub fn new(url: Url, timeout: Duration, retry: RetryPolicy) -> Result<Self, AccessorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| AccessorError::Http {
                url: url.to_string(),
                source,
            })?;

        Ok(Self {
            url,
            client,
            timeout,
            retry,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// GET the document. Transient failures are retried per the retry policy.
    pub async fn read(&self) -> Result<Vec<u8>, AccessorError> {
        self.retry
            .retry(|_| self.fetch(), AccessorError::is_transient)
            .await
    }

    pub async fn write(&self, _bytes: &[u8]) -> Result<(), AccessorError> {
        Err(AccessorError::Unsupported {
            location: self.url.to_string(),
            operation: "write",
        })
    }

    async fn fetch(&self) -> Result<Vec<u8>, AccessorError> {
        let url = self.url.to_string();
        let request = async {
            let response = self
                .client
                .get(self.url.clone())
                .send()
                .await
                .map_err(|source| AccessorError::Http {
                    url: url.clone(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(AccessorError::Status {
                    url: url.clone(),
                    status: status.as_u16(),
                });
            }

            let body = response.bytes().await.map_err(|source| AccessorError::Http {
                url: url.clone(),
                source,
            })?;
            Ok(body.to_vec())
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(AccessorError::Timeout {
                location: url.clone(),
                after: self.timeout,
            }),
        }
    }
}
