#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {text}")]
    Http { status: u16, text: String },
    #[error("config error: {0}")]
    Config(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("source deadline exceeded")]
    Deadline,
}

impl IngestError {
    /// HTTP status carried by the error, when the failure was an HTTP one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            IngestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IngestError::Timeout
        } else if err.is_connect() {
            IngestError::Network(err.to_string())
        } else if err.is_status() {
            IngestError::Http {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                text: err.to_string(),
            }
        } else {
            IngestError::Network(err.to_string())
        }
    }
}
