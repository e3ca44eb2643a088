use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Network(#[from] reqwest::Error),
    #[error("{status} status for url ({url}): {reason}")]
    HttpStatus {
        status: u16,
        url: String,
        reason: String,
    },
    #[error("Invalid content_type. Use 'html' or 'text'.")]
    InvalidMode(String),
    #[error("invalid fetch client header: {0}")]
    InvalidHeader(String),
}

impl FetchError {
    /// Message shown to the model for a failed retrieval of `url`.
    pub fn render_for_url(&self, url: &str) -> String {
        match self {
            FetchError::InvalidMode(_) => self.to_string(),
            _ => format!("Failed to retrieve content from {url}. Error: {self}"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::HttpStatus { .. } => "remote_api",
            FetchError::InvalidMode(_) | FetchError::InvalidHeader(_) => "invalid_argument",
        }
    }
}
