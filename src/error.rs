use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("credential not found: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("invalid conversation state: {0}")]
    InvalidState(String),

    #[error("provider request timed out after {0:?}")]
    ProviderTimeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({platform}): {message}")]
    Api {
        platform: String,
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited by {platform}")]
    RateLimit {
        platform: String,
        retry_after_secs: Option<u64>,
    },

    #[error("no supported model found (tried: {})", .tried.join(", "))]
    NoSupportedModel { tried: Vec<String> },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    pub fn api_with_status(
        platform: impl Into<String>,
        message: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self::Api {
            platform: platform.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the provider rejected the request because of the model id.
    ///
    /// Proxies report this as a 400 (sometimes 404) whose body mentions the
    /// model; the body wording is not stable, so the marker match is loose.
    pub fn is_model_not_supported(&self) -> bool {
        match self {
            Self::Api {
                message,
                status_code,
                ..
            } => {
                matches!(status_code, Some(400) | Some(404))
                    && message.to_lowercase().contains("model")
            }
            _ => false,
        }
    }

    /// Only a missing credential may terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingCredential(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_rejection_is_classified() {
        let err = Error::api_with_status(
            "api.proxyapi.ru",
            r#"{"error":{"message":"Model not supported"}}"#,
            400,
        );
        assert!(err.is_model_not_supported());
    }

    #[test]
    fn other_bad_requests_are_not_model_errors() {
        let err = Error::api_with_status("api.proxyapi.ru", "max_tokens too large", 400);
        assert!(!err.is_model_not_supported());

        let err = Error::api_with_status("api.proxyapi.ru", "model overloaded", 529);
        assert!(!err.is_model_not_supported());

        assert!(!Error::ProviderTimeout(Duration::from_secs(5)).is_model_not_supported());
    }

    #[test]
    fn only_missing_credential_is_fatal() {
        assert!(Error::MissingCredential("PROXYAPI_KEY".into()).is_fatal());
        assert!(!Error::invalid_state("empty").is_fatal());
        assert!(!Error::NoSupportedModel { tried: vec![] }.is_fatal());
    }

    #[test]
    fn no_supported_model_lists_candidates() {
        let err = Error::NoSupportedModel {
            tried: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "no supported model found (tried: a, b)");
    }
}
