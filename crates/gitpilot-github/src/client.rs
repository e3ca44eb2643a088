use std::{path::PathBuf, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Url,
};
use serde::de::DeserializeOwned;

use crate::{
    transport::{
        is_retryable_github_status, is_retryable_transport_error, parse_retry_after, retry_delay,
        truncate_for_error,
    },
    GithubError,
};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
const ERROR_BODY_MAX_CHARS: usize = 800;

/// `owner/name` pair that scopes repository calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
    /// Total attempts per request; `1` disables retries.
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    /// Parent directory for artifact extraction; the system temp dir when unset.
    pub artifact_workdir: Option<PathBuf>,
}

impl Default for GithubClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            token: String::new(),
            request_timeout_ms: 30_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 500,
            artifact_workdir: None,
        }
    }
}

/// Authenticated GitHub REST client shared by every repository operation.
#[derive(Debug, Clone)]
pub struct GithubClient {
    pub(crate) http: reqwest::Client,
    api_base: Url,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
    pub(crate) artifact_workdir: Option<PathBuf>,
}

impl GithubClient {
    pub fn new(config: GithubClientConfig) -> Result<Self, GithubError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("gitpilot"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));
        let mut auth_header = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| GithubError::InvalidHeader)?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|source| GithubError::Network {
                operation: "client setup".to_string(),
                source,
            })?;

        let api_base = Url::parse(config.api_base.trim()).map_err(|error| {
            GithubError::InvalidArgument(format!("invalid github api base: {error}"))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(GithubError::InvalidArgument(format!(
                "github api base '{}' cannot carry a path",
                config.api_base
            )));
        }

        Ok(Self {
            http,
            api_base,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
            artifact_workdir: config.artifact_workdir,
        })
    }

    /// Joins percent-encoded path segments onto the API base.
    pub(crate) fn endpoint<'a, I>(&self, segments: I) -> Result<Url, GithubError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| GithubError::InvalidArgument("github api base cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn repo_endpoint<'a, I>(&self, repo: &'a RepoRef, segments: I) -> Result<Url, GithubError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.endpoint(
            ["repos", repo.owner.as_str(), repo.name.as_str()]
                .into_iter()
                .chain(segments),
        )
    }

    pub(crate) async fn request_json<T, F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<T, GithubError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        let raw = response.text().await.map_err(|source| GithubError::Network {
            operation: operation.to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|error| GithubError::Decode {
            operation: operation.to_string(),
            detail: error.to_string(),
        })
    }

    pub(crate) async fn request_bytes<F>(
        &self,
        operation: &str,
        request_builder: F,
    ) -> Result<Vec<u8>, GithubError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        let bytes = response.bytes().await.map_err(|source| GithubError::Network {
            operation: operation.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> Result<reqwest::Response, GithubError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            tracing::debug!(operation, attempt, "sending github api request");
            let response = request_builder().send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_github_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    tracing::warn!(operation, status = status.as_u16(), "github api request failed");
                    return Err(GithubError::RemoteApi {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, ERROR_BODY_MAX_CHARS),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    tracing::warn!(operation, %error, "github api transport failed");
                    return Err(GithubError::Network {
                        operation: operation.to_string(),
                        source: error,
                    });
                }
            }
        }
    }
}
