use thiserror::Error;

/// Failures surfaced by [`crate::GithubClient`].
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("github api {operation} request failed: {source}")]
    Network {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("github api {operation} failed with status {status}: {body}")]
    RemoteApi {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("No artifact named '{0}' found.")]
    ArtifactNotFound(String),
    #[error("github response is missing field '{0}'")]
    MissingField(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("failed to decode github {operation}: {detail}")]
    Decode { operation: String, detail: String },
    #[error("artifact archive is unreadable: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("artifact workspace io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid github authorization header")]
    InvalidHeader,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl GithubError {
    /// Coarse category reported to callers that cannot inspect the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            GithubError::Network { .. } => "network",
            GithubError::MissingField("sha") => "not_found",
            GithubError::RemoteApi { .. }
            | GithubError::MissingField(_)
            | GithubError::Decode { .. }
            | GithubError::Archive(_)
            | GithubError::Io(_) => "remote_api",
            GithubError::NotFound(_) | GithubError::ArtifactNotFound(_) => "not_found",
            GithubError::Conflict(_) => "conflict",
            GithubError::InvalidHeader | GithubError::InvalidArgument(_) => "invalid_argument",
        }
    }

    /// HTTP status reported by GitHub, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            GithubError::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }
}
