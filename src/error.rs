use std::time::Duration;
use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has invalid value '{value}' (expected {expected})")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// A command or shape command was attempted without the required role.
#[derive(Debug, Clone, Error)]
#[error("permission denied for {command}")]
pub struct PermissionDenied {
    pub command: String,
    pub owner_configured: bool,
}

impl PermissionDenied {
    pub fn user_message(&self) -> String {
        if self.owner_configured {
            format!(
                "❌ You need to be the bot owner, server owner, have Administrator/Manage Server \
                 permissions, or have a role with permission to use `{}`.",
                self.command
            )
        } else {
            format!(
                "❌ You need to be the server owner, have Administrator/Manage Server \
                 permissions, or have a role with permission to use `{}`.",
                self.command
            )
        }
    }
}

/// Failures talking to the Shapes API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limited by the Shapes API")]
    RateLimited { retry_after: Option<Duration> },
    #[error("the Shapes API rejected the credentials")]
    Unauthorized,
    #[error("the Shapes API returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("the Shapes API request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected Shapes API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Unauthorized => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// Text shown in Discord for this failure.
    ///
    /// Rate limiting always gets its own message. Everything else renders the
    /// operator's `ERROR_MESSAGE` template (with `{status}` and `{error}`
    /// placeholders) when one is configured.
    pub fn user_message(&self, template: Option<&str>) -> String {
        if let Some(template) = template.filter(|_| !self.is_rate_limited()) {
            let status = self
                .status()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            return template
                .replace("{status}", &status)
                .replace("{error}", &self.to_string());
        }

        match self {
            ApiError::RateLimited {
                retry_after: Some(wait),
            } => format!(
                "I'm being rate limited. Please try again in {:.1} seconds.",
                wait.as_secs_f64()
            ),
            ApiError::RateLimited { retry_after: None } => {
                "I'm currently rate limited. Please try again in a moment.".to_string()
            }
            ApiError::Unauthorized => {
                "Authentication error. Please check that your Shapes API key is valid.".to_string()
            }
            ApiError::Status { status: 403, .. } => {
                "Access forbidden. Please check your permissions.".to_string()
            }
            ApiError::Status { status: 502, .. } => {
                "The AI service is temporarily unavailable. Please try again in a few moments."
                    .to_string()
            }
            ApiError::Status { status: 503, .. } => {
                "The AI service is currently overloaded. Please try again later.".to_string()
            }
            ApiError::Status { status: 504, .. } | ApiError::Timeout => {
                "The AI service timed out. Please try again with a shorter message.".to_string()
            }
            ApiError::Status { status, .. } if *status >= 500 => {
                "The AI service is experiencing issues. Please try again later.".to_string()
            }
            ApiError::Status { status, .. } => {
                format!("Request error ({}). Please try again later.", status)
            }
            ApiError::Network(_) => "Network error. Please try again later.".to_string(),
            ApiError::InvalidResponse(_) => {
                "Received an unexpected response from the API.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Errors surfaced at command and event handler boundaries.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Discord refused a send (missing permission, deleted channel, ...)
    #[error("delivery failed: {0}")]
    Delivery(#[source] serenity::Error),
    /// A Discord lookup needed before answering failed
    #[error("discord request failed: {0}")]
    Discord(#[source] serenity::Error),
    #[error("storage error: {0}")]
    Storage(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_message_ignores_template() {
        let err = ApiError::RateLimited {
            retry_after: Some(Duration::from_millis(2500)),
        };
        let msg = err.user_message(Some("Oops ({status})"));
        assert_eq!(msg, "I'm being rate limited. Please try again in 2.5 seconds.");

        let err = ApiError::RateLimited { retry_after: None };
        assert!(err.user_message(None).contains("rate limited"));
    }

    #[test]
    fn test_template_placeholders() {
        let err = ApiError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(
            err.user_message(Some("Shape is napping ({status})")),
            "Shape is napping (500)"
        );

        let err = ApiError::Network("connection reset".to_string());
        let msg = err.user_message(Some("{status} / {error}"));
        assert_eq!(msg, "n/a / network error: connection reset");
    }

    #[test]
    fn test_default_messages_by_status() {
        let status = |s| ApiError::Status {
            status: s,
            message: String::new(),
        };
        assert!(status(503).user_message(None).contains("overloaded"));
        assert!(status(504).user_message(None).contains("timed out"));
        assert!(status(500).user_message(None).contains("experiencing issues"));
        assert_eq!(
            status(418).user_message(None),
            "Request error (418). Please try again later."
        );
        assert!(ApiError::Timeout.user_message(None).contains("timed out"));
    }

    #[test]
    fn test_permission_denied_message() {
        let denied = PermissionDenied {
            command: "/activate".to_string(),
            owner_configured: true,
        };
        assert!(denied.user_message().contains("bot owner"));
        assert!(denied.user_message().contains("`/activate`"));

        let denied = PermissionDenied {
            command: "!imagine".to_string(),
            owner_configured: false,
        };
        assert!(!denied.user_message().contains("bot owner"));
    }

    #[test]
    fn test_bot_error_wraps_sources() {
        let err = BotError::from(ApiError::Timeout);
        assert_eq!(err.to_string(), "the Shapes API request timed out");

        let err = BotError::Storage(anyhow::anyhow!("database connection mutex poisoned"));
        assert_eq!(err.to_string(), "storage error: database connection mutex poisoned");
    }
}
