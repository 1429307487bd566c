/// Errors returned by speech service clients.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Recognition failed with status {0}")]
    Recognition(String),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Decode(_) => true,
            Self::Http { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::MissingCredentials(_) | Self::EmptyInput(_) | Self::Recognition(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Turn a non-success response into [`ProviderError::Http`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Http {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Transport("reset".into()).is_retryable());
        assert!(ProviderError::Decode("eof".into()).is_retryable());
        for status in [408, 429, 500, 503] {
            let err = ProviderError::Http {
                status,
                body: String::new(),
            };
            assert!(err.is_retryable(), "{status} should retry");
        }
        for status in [400, 401, 403, 404] {
            let err = ProviderError::Http {
                status,
                body: String::new(),
            };
            assert!(!err.is_retryable(), "{status} should not retry");
        }
        assert!(!ProviderError::MissingCredentials("key".into()).is_retryable());
        assert!(!ProviderError::EmptyInput("text").is_retryable());
        assert!(!ProviderError::Recognition("Error".into()).is_retryable());
    }
}
