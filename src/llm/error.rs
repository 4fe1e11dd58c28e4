//! Identification failures.
//!
//! Every variant collapses to one user-facing string through
//! `user_message`; the variants exist for logging and tests.

#[derive(Debug, thiserror::Error)]
pub enum IdentificationError {
    #[error("no API key configured for {provider} (set {env_key} or run `plantsnap settings save-key`)")]
    MissingApiKey { provider: String, env_key: String },

    /// Stored without its URL: the Gemini URL carries the API key.
    #[error("{0}")]
    Network(reqwest::Error),

    #[error("{provider} rejected the API key (HTTP {status})")]
    Auth { provider: String, status: u16 },

    #[error("{provider} quota exceeded (HTTP {status})")]
    Quota { provider: String, status: u16 },

    #[error("{provider} returned HTTP {status}: {body}")]
    Service {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error("response blocked: {0}")]
    Blocked(String),
}

impl From<reqwest::Error> for IdentificationError {
    fn from(e: reqwest::Error) -> Self {
        IdentificationError::Network(e.without_url())
    }
}

impl IdentificationError {
    /// Map a non-success HTTP status to the matching variant.
    pub(crate) fn from_status(provider: &str, status: reqwest::StatusCode, body: String) -> Self {
        let provider = provider.to_string();
        let code = status.as_u16();
        match code {
            401 | 403 => IdentificationError::Auth {
                provider,
                status: code,
            },
            429 => IdentificationError::Quota {
                provider,
                status: code,
            },
            _ => IdentificationError::Service {
                provider,
                status: code,
                body,
            },
        }
    }

    /// Short name of the failure kind, shown before the message.
    pub fn kind(&self) -> &'static str {
        match self {
            IdentificationError::MissingApiKey { .. } => "MissingApiKey",
            IdentificationError::Network(_) => "NetworkError",
            IdentificationError::Auth { .. } => "AuthError",
            IdentificationError::Quota { .. } => "QuotaError",
            IdentificationError::Service { .. } => "ServiceError",
            IdentificationError::MalformedResponse(_) => "MalformedResponse",
            IdentificationError::Blocked(_) => "Blocked",
        }
    }

    /// The single message string the error banner displays.
    pub fn user_message(&self) -> String {
        format!("Error: {} - {}", self.kind(), self)
    }
}
