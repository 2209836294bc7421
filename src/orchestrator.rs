//! Generation orchestration: provider selection, primary/fallback routing
//! and normalization of results and failures.
//!
//! Per request the flow is
//! `ValidatingInput -> SelectingProvider -> InvokingPrimary -> {Succeeded | InvokingFallback} -> {Succeeded | Failed}`.
//! Fallback to Replicate happens only when Hugging Face was picked by
//! default (not requested explicitly), fallback is allowed, and Replicate has
//! a token.
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppResult;
use crate::prompt::resolve_prompt;
use crate::providers::{
    HuggingFaceClient, PredictionDescriptor, ProviderError, ProviderErrorKind, ProviderKind,
    ReplicateClient,
};
use crate::storage::AssetStore;
use crate::upload::UploadedAsset;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: Option<String>,
    pub source_asset: Option<UploadedAsset>,
    pub preferred_provider: Option<ProviderKind>,
    pub allow_fallback: bool,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest { prompt: None, source_asset: None, preferred_provider: None, allow_fallback: true }
    }
}

impl GenerationRequest {
    pub fn new(prompt: Option<String>) -> Self {
        GenerationRequest { prompt, ..Default::default() }
    }

    pub fn with_asset(mut self, asset: Option<UploadedAsset>) -> Self {
        self.source_asset = asset;
        self
    }

    pub fn prefer(mut self, provider: Option<ProviderKind>) -> Self {
        self.preferred_provider = provider;
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.allow_fallback = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub output_location: String,
    pub used_provider: ProviderKind,
    pub prompt_used: String,
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionDescriptor>,
}

/// Terminal failure: every provider error seen plus setup instructions for
/// each provider lacking a credential.
#[derive(Debug, Clone)]
pub struct GenerationFailure {
    pub errors: Vec<ProviderError>,
    pub setup: BTreeMap<ProviderKind, String>,
}

impl GenerationFailure {
    pub fn is_configuration_only(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(ProviderError::is_configuration)
    }

    pub fn to_body(&self) -> Value {
        let error = if self.is_configuration_only() {
            "Image generation service is not configured"
        } else {
            "Failed to generate image"
        };
        let errors: Vec<Value> = self
            .errors
            .iter()
            .map(|e| {
                json!({
                    "provider": e.provider.id(),
                    "message": e.message,
                    "remediation": e.remediation(),
                })
            })
            .collect();
        let setup: serde_json::Map<String, Value> = self
            .setup
            .iter()
            .map(|(provider, text)| (provider.id().to_string(), Value::String(text.clone())))
            .collect();

        json!({
            "success": false,
            "error": error,
            "details": self.to_string(),
            "status": GenerationStatus::Failed,
            "errors": errors,
            "setup": setup,
        })
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for GenerationFailure {}

enum ProviderOutput {
    Image(Bytes),
    Prediction { descriptor: PredictionDescriptor, location: String },
}

#[derive(Clone)]
pub struct Orchestrator {
    huggingface: HuggingFaceClient,
    replicate: ReplicateClient,
    store: AssetStore,
}

impl Orchestrator {
    pub fn new(config: &Config) -> Self {
        Orchestrator {
            huggingface: HuggingFaceClient::new(config),
            replicate: ReplicateClient::new(config),
            store: AssetStore::new(config),
        }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn is_configured(&self, provider: ProviderKind) -> bool {
        match provider {
            ProviderKind::HuggingFace => self.huggingface.is_configured(),
            ProviderKind::Replicate => self.replicate.is_configured(),
        }
    }

    #[tracing::instrument(
        name = "generate",
        skip(self, request),
        fields(request_id = %Uuid::new_v4(), preferred = ?request.preferred_provider)
    )]
    pub async fn generate(&self, request: GenerationRequest) -> AppResult<GenerationResult> {
        let prompt = resolve_prompt(request.prompt.as_deref());
        let reference_url = request
            .source_asset
            .as_ref()
            .map(|asset| self.store.upload_url(&asset.storage_name));
        tracing::debug!(stage = "validating_input", reference = ?reference_url, "Resolved prompt: {}", prompt);

        if !ProviderKind::ALL.iter().any(|p| self.is_configured(*p)) {
            tracing::warn!(stage = "selecting_provider", "No image generation provider is configured");
            let errors = ProviderKind::ALL.iter().map(|p| ProviderError::not_configured(*p)).collect();
            return Err(self.failure(errors).into());
        }

        let primary = request.preferred_provider.unwrap_or(ProviderKind::HuggingFace);
        tracing::info!(stage = "invoking_primary", provider = %primary, "Invoking provider");

        let mut errors = Vec::new();
        let (used, output) = match self.invoke(primary, &prompt, reference_url.as_deref()).await {
            Ok(output) => (primary, output),
            Err(err) => {
                tracing::warn!(provider = %primary, error = %err, "Primary provider failed");
                errors.push(err);
                if !self.should_fall_back(primary, &request) {
                    return Err(self.failure(errors).into());
                }

                let fallback = ProviderKind::Replicate;
                tracing::info!(stage = "invoking_fallback", provider = %fallback, "Falling back");
                match self.invoke(fallback, &prompt, reference_url.as_deref()).await {
                    Ok(output) => (fallback, output),
                    Err(err) => {
                        tracing::warn!(provider = %fallback, error = %err, "Fallback provider failed");
                        errors.push(err);
                        return Err(self.failure(errors).into());
                    }
                }
            }
        };

        let result = self.complete(used, output, prompt).await?;
        tracing::info!(stage = "succeeded", provider = %used, location = %result.output_location, "Generation completed");
        Ok(result)
    }

    fn should_fall_back(&self, primary: ProviderKind, request: &GenerationRequest) -> bool {
        primary == ProviderKind::HuggingFace
            && request.preferred_provider.is_none()
            && request.allow_fallback
            && self.replicate.is_configured()
    }

    async fn invoke(
        &self,
        provider: ProviderKind,
        prompt: &str,
        reference_url: Option<&str>,
    ) -> Result<ProviderOutput, ProviderError> {
        match provider {
            ProviderKind::HuggingFace => self.huggingface.generate(prompt).await.map(ProviderOutput::Image),
            ProviderKind::Replicate => {
                if !self.replicate.is_configured() {
                    return Err(ProviderError::not_configured(provider));
                }
                let reference = reference_url.ok_or_else(|| {
                    ProviderError::new(
                        provider,
                        ProviderErrorKind::MissingReference,
                        "Replicate requires a reference image, but no image was uploaded",
                    )
                })?;
                let descriptor = self.replicate.generate(prompt, reference).await?;
                let location = descriptor.output_location().ok_or_else(|| {
                    ProviderError::new(
                        provider,
                        ProviderErrorKind::MalformedResponse,
                        format!("Replicate prediction {} has no output or status URL", descriptor.id),
                    )
                })?;
                Ok(ProviderOutput::Prediction { descriptor, location })
            }
        }
    }

    async fn complete(
        &self,
        provider: ProviderKind,
        output: ProviderOutput,
        prompt: String,
    ) -> AppResult<GenerationResult> {
        let result = match output {
            ProviderOutput::Image(bytes) => {
                let (name, path) = self.store.write_generated(&bytes).await?;
                GenerationResult {
                    output_location: self.store.generated_url(&name),
                    used_provider: provider,
                    prompt_used: prompt,
                    status: GenerationStatus::Completed,
                    output_path: Some(path),
                    prediction: None,
                }
            }
            ProviderOutput::Prediction { descriptor, location } => GenerationResult {
                output_location: location,
                used_provider: provider,
                prompt_used: prompt,
                status: GenerationStatus::Completed,
                output_path: None,
                prediction: Some(descriptor),
            },
        };
        Ok(result)
    }

    fn failure(&self, errors: Vec<ProviderError>) -> GenerationFailure {
        let setup = ProviderKind::ALL
            .iter()
            .filter(|p| !self.is_configured(**p))
            .map(|p| (*p, p.setup_instructions()))
            .collect();
        GenerationFailure { errors, setup }
    }
}
