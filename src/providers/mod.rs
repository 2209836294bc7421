//! Clients for the external image-generation providers.
//!
//! - `huggingface`: text-to-image, returns raw image bytes.
//! - `replicate`: image-conditioned generation, returns a prediction descriptor.
//!
//! Both clients fail locally with [`ProviderErrorKind::NotConfigured`] when
//! their credential is missing and never retry.
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

pub mod huggingface;
pub mod replicate;

pub use huggingface::HuggingFaceClient;
pub use replicate::{PredictionDescriptor, ReplicateClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    HuggingFace,
    Replicate,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::HuggingFace, ProviderKind::Replicate];

    /// Wire identifier, as accepted in the `service` form field.
    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Replicate => "replicate",
        }
    }

    /// Human-readable label used in responses.
    pub fn label(self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "Hugging Face",
            ProviderKind::Replicate => "Replicate",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "HUGGINGFACE_API_KEY",
            ProviderKind::Replicate => "REPLICATE_API_TOKEN",
        }
    }

    pub fn setup_instructions(self) -> String {
        match self {
            ProviderKind::HuggingFace => format!(
                "Set {} in the environment. Create a free access token at https://huggingface.co/settings/tokens",
                self.env_var()
            ),
            ProviderKind::Replicate => format!(
                "Set {} in the environment. Create an API token at https://replicate.com/account/api-tokens",
                self.env_var()
            ),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown service '{0}', expected 'huggingface' or 'replicate'")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hugging_face" | "hf" => Ok(ProviderKind::HuggingFace),
            "replicate" => Ok(ProviderKind::Replicate),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Credential absent; no request was sent.
    NotConfigured,
    /// Provider answered with a non-success status or a failed job.
    Upstream { status: Option<u16> },
    Timeout,
    Transport,
    MalformedResponse,
    /// Image-conditioned provider called without a reference image.
    MissingReference,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{provider}: {message}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: ProviderKind, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        ProviderError { provider, kind, message: message.into() }
    }

    pub fn not_configured(provider: ProviderKind) -> Self {
        ProviderError::new(
            provider,
            ProviderErrorKind::NotConfigured,
            format!("{} is not configured ({} is missing)", provider.label(), provider.env_var()),
        )
    }

    /// Translate a transport-level reqwest failure.
    pub fn from_transport(provider: ProviderKind, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::new(provider, ProviderErrorKind::Timeout, format!("{} request timed out", provider.label()))
        } else {
            ProviderError::new(
                provider,
                ProviderErrorKind::Transport,
                format!("Failed to reach {}: {}", provider.label(), err.without_url()),
            )
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind == ProviderErrorKind::NotConfigured
    }

    pub fn remediation(&self) -> String {
        match (&self.kind, self.provider) {
            (ProviderErrorKind::NotConfigured, provider) => provider.setup_instructions(),
            (ProviderErrorKind::MissingReference, _) => {
                "Attach an image to the request; it is used as the reference image.".to_string()
            }
            (ProviderErrorKind::Timeout, _) => {
                "The provider did not answer in time. Retry, or raise PROVIDER_TIMEOUT_SECS.".to_string()
            }
            (_, ProviderKind::HuggingFace) => {
                "Check that HUGGINGFACE_MODEL is available for inference and that the token is valid. Models can take a minute to load; retry shortly.".to_string()
            }
            (_, ProviderKind::Replicate) => {
                "Check the Replicate token, REPLICATE_MODEL_VERSION and your account billing at https://replicate.com/account.".to_string()
            }
        }
    }
}

/// Pull a human-readable message out of an upstream error body.
pub(crate) fn upstream_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "detail", "message"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) => return s.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() { "no response body".to_string() } else { trimmed.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_names() {
        assert_eq!("huggingface".parse::<ProviderKind>(), Ok(ProviderKind::HuggingFace));
        assert_eq!(" Replicate ".parse::<ProviderKind>(), Ok(ProviderKind::Replicate));
        assert!("dalle".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn not_configured_remediation_names_the_variable() {
        let err = ProviderError::not_configured(ProviderKind::Replicate);
        assert!(err.is_configuration());
        assert!(err.remediation().contains("REPLICATE_API_TOKEN"));
    }

    #[test]
    fn extracts_upstream_messages() {
        assert_eq!(upstream_message(r#"{"error":"Model is loading"}"#), "Model is loading");
        assert_eq!(upstream_message(r#"{"detail":"Invalid version"}"#), "Invalid version");
        assert_eq!(upstream_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(upstream_message(""), "no response body");
    }
}
