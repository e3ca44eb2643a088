use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::{
    extract::{extract_img_sources, render_html, visible_text},
    FetchError,
};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36 Edg/113.0.1774.35";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    Html,
    #[default]
    Text,
}

impl FetchMode {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(FetchMode::Html),
            "text" => Ok(FetchMode::Text),
            _ => Err(FetchError::InvalidMode(raw.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchMode::Html => "html",
            FetchMode::Text => "text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

/// Issues one GET per call and extracts content from the returned HTML.
#[derive(Debug, Clone)]
pub struct ContentFetcher {
    http: reqwest::Client,
}

impl ContentFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|error| FetchError::InvalidHeader(error.to_string()))?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()?;
        Ok(Self { http })
    }

    /// Fetches `url` as markup or visible text, truncated to `max_length` characters.
    pub async fn fetch(
        &self,
        url: &str,
        mode: FetchMode,
        max_length: Option<usize>,
    ) -> Result<String, FetchError> {
        let body = self.get_body(url).await?;
        let content = match mode {
            FetchMode::Html => render_html(&body),
            FetchMode::Text => visible_text(&body),
        };
        Ok(match max_length {
            Some(limit) => content.chars().take(limit).collect(),
            None => content,
        })
    }

    /// Returns the `src` of every `<img>` on the page, as written in the markup.
    pub async fn extract_image_urls(&self, url: &str) -> Result<Vec<String>, FetchError> {
        let body = self.get_body(url).await?;
        Ok(extract_img_sources(&body))
    }

    async fn get_body(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "fetching url");
        let response = self.http.get(url).send().await.map_err(|error| {
            tracing::warn!(url, %error, "url fetch failed");
            FetchError::Network(error)
        })?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "url fetch returned error status");
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(response.text().await?)
    }
}
