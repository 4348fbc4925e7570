use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Malformed tax ID, address or other local input. Never retried.
    InvalidInput(String),
    /// Local rate-limit policy denied the call before any network access.
    RateLimited(String),
    /// An upstream provider failed (HTTP status, timeout, malformed body).
    ProviderUnavailable {
        /// Name of the provider or strategy that failed.
        provider: String,
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Human-readable failure description.
        message: String,
    },
    /// Every configured provider failed; wraps the last failure seen.
    AllProvidersFailed {
        /// The last provider error recorded during the cascade.
        last: Box<AppError>,
    },
    /// An endpoint of a distance/routing query could not be geocoded.
    UnresolvableLocation(String),
    /// Local key/value storage could not be read or written.
    Storage(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Builds a `ProviderUnavailable` error without an HTTP status.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ProviderUnavailable {
            provider: provider.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Builds a `ProviderUnavailable` error from a non-success HTTP status.
    pub fn provider_status(
        provider: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        AppError::ProviderUnavailable {
            provider: provider.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    /// HTTP status carried by the innermost provider failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::ProviderUnavailable { status, .. } => *status,
            AppError::AllProvidersFailed { last } => last.status(),
            AppError::WithContext { source, .. } => source.status(),
            _ => None,
        }
    }

    /// True when the provider rejected our credentials (HTTP 403).
    pub fn is_auth_failure(&self) -> bool {
        self.status() == Some(403)
    }

    /// True when the provider throttled us (HTTP 429).
    pub fn is_throttled(&self) -> bool {
        self.status() == Some(429)
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Rate limit exceeded: {}", msg),
            AppError::ProviderUnavailable {
                provider,
                status: Some(status),
                message,
            } => write!(f, "Provider {} returned {}: {}", provider, status, message),
            AppError::ProviderUnavailable {
                provider, message, ..
            } => write!(f, "Provider {} unavailable: {}", provider, message),
            AppError::AllProvidersFailed { last } => {
                write!(f, "All providers failed, last error: {}", last)
            }
            AppError::UnresolvableLocation(msg) => write!(f, "Unresolvable location: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    ///
    /// Timeouts and connection errors are soft provider failures.
    fn from(err: reqwest::Error) -> Self {
        let provider = err
            .url()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        AppError::ProviderUnavailable {
            provider,
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<AppError>> ResultExt<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e.into()),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_survives_wrapping() {
        let err = AppError::provider_status("grok", 403, "Forbidden");
        let wrapped = AppError::AllProvidersFailed {
            last: Box::new(err),
        };
        let with_ctx: Result<(), AppError> = Err(wrapped);
        let err = with_ctx.context("analysis").unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert!(err.is_auth_failure());
        assert!(!err.is_throttled());
    }

    #[test]
    fn test_display_includes_context() {
        let err: Result<(), AppError> = Err(AppError::InvalidInput("CNPJ inválido".into()));
        let err = err.with_context(|| "registry lookup".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "registry lookup: Invalid input: CNPJ inválido");
    }
}
