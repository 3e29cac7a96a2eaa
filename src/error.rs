use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no provider configured. run 'nlsh setup' first")]
    MissingProvider,

    #[error("{provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("could not generate a command: {0}")]
    Generation(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the failure text points at credentials rather than the model,
    /// so the user can be nudged toward `nlsh setup`.
    pub fn is_auth_error(&self) -> bool {
        let text = match self {
            Error::Provider { message, .. } => message.to_lowercase(),
            Error::Http(e) => e.to_string().to_lowercase(),
            _ => return false,
        };
        [
            "401",
            "403",
            "unauthorized",
            "forbidden",
            "api key",
            "api_key",
            "authentication",
            "credential",
        ]
        .iter()
        .any(|needle| text.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_recognized() {
        let err = Error::Provider {
            provider: "openai".to_string(),
            message: "401 Unauthorized: invalid api key".to_string(),
        };
        assert!(err.is_auth_error());
    }

    #[test]
    fn other_errors_are_not_auth() {
        let err = Error::Generation("model returned no usable command".to_string());
        assert!(!err.is_auth_error());

        let err = Error::Provider {
            provider: "openai".to_string(),
            message: "500 Internal Server Error".to_string(),
        };
        assert!(!err.is_auth_error());
    }
}
