//! Thin HTTP client for the Hugging Face Inference API.
//!
//! - `generate` posts `{"inputs": prompt}` to `/models/<model>` and returns the
//!   raw image bytes from the response body.
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::json;

use crate::config::Config;
use crate::providers::{upstream_message, ProviderError, ProviderErrorKind, ProviderKind};

const PROVIDER: ProviderKind = ProviderKind::HuggingFace;

#[derive(Clone)]
pub struct HuggingFaceClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build Hugging Face HTTP client ({}), using defaults", e);
                Client::new()
            });
        HuggingFaceClient {
            client,
            base_url: config.huggingface_api_url.trim_end_matches('/').to_string(),
            model: config.huggingface_model.clone(),
            api_key: config.huggingface_api_key.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate an image from `prompt`.
    ///
    /// Fails with `NotConfigured` without touching the network when no API
    /// key is set. A 2xx answer that is JSON or empty is treated as malformed,
    /// since the inference endpoint reports errors as JSON bodies.
    pub async fn generate(&self, prompt: &str) -> Result<Bytes, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(PROVIDER))?;

        let url = format!("{}/models/{}", self.base_url, self.model);
        tracing::info!(model = %self.model, "Sending prompt to Hugging Face");
        tracing::debug!("Prompt: {}", prompt);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({ "inputs": prompt }))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            let message = format!("Hugging Face returned {}: {}", status, upstream_message(&error_body));
            tracing::error!("{}", message);
            return Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::Upstream { status: Some(status.as_u16()) },
                message,
            ));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

        if is_json {
            let message = upstream_message(&String::from_utf8_lossy(&body));
            return Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::MalformedResponse,
                format!("Hugging Face returned JSON instead of an image: {}", message),
            ));
        }
        if body.is_empty() {
            return Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::MalformedResponse,
                "Hugging Face returned an empty image",
            ));
        }

        tracing::info!(bytes = body.len(), "Received image from Hugging Face");
        Ok(body)
    }
}
