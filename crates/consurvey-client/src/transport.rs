use serde::de::DeserializeOwned;
use url::Url;

use crate::config::RetryPolicy;
use crate::error::ClientError;

/// Shared HTTP plumbing for the sub-clients.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl Transport {
    pub(crate) fn new(http: reqwest::Client, base_url: Url, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url,
            retry,
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL for an API path such as `/v1/admin/coupons`.
    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send the request built by `build`, failing on a non-2xx status.
    ///
    /// `build` is invoked once per attempt. Only transport failures are
    /// retried.
    pub(crate) async fn send<F>(
        &self,
        endpoint: &str,
        build: F,
    ) -> Result<reqwest::Response, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        let resp = loop {
            match build().send().await {
                Ok(resp) => break resp,
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        endpoint,
                        attempt,
                        max_retries = self.retry.max_retries,
                        "survey API request failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(ClientError::Http {
                        endpoint: endpoint.to_string(),
                        source,
                    })
                }
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::ApiError {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Send and decode a JSON body.
    pub(crate) async fn json<T, F>(&self, endpoint: &str, build: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        self.send(endpoint, build)
            .await?
            .json()
            .await
            .map_err(|source| ClientError::Deserialization {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    /// Send and return the body as text.
    pub(crate) async fn text<F>(&self, endpoint: &str, build: F) -> Result<String, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        self.send(endpoint, build)
            .await?
            .text()
            .await
            .map_err(|source| ClientError::Deserialization {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}
