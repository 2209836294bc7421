//! Replicate predictions client for image-conditioned generation.
//!
//! A prediction is created with the prompt and a reference image URL and the
//! descriptor Replicate returns is handed back unchanged. Predictions are not
//! polled; callers get the job handle (and output, if it finished inline).
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::Config;
use crate::providers::{upstream_message, ProviderError, ProviderErrorKind, ProviderKind};

const PROVIDER: ProviderKind = ProviderKind::Replicate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDescriptor {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<PredictionUrls>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionUrls {
    #[serde(default)]
    pub get: Option<String>,
    #[serde(default)]
    pub cancel: Option<String>,
}

impl PredictionDescriptor {
    /// Where the caller can find the result: the first output URL when the
    /// prediction already finished, otherwise the prediction's status URL.
    pub fn output_location(&self) -> Option<String> {
        let from_output = match &self.output {
            Some(Value::String(url)) => Some(url.as_str()),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).find(|url| !url.is_empty()),
            _ => None,
        };
        from_output
            .filter(|url| !url.is_empty())
            .map(String::from)
            .or_else(|| self.urls.as_ref().and_then(|u| u.get.clone()))
            .filter(|loc| !loc.is_empty())
    }
}

#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    base_url: String,
    model_version: String,
    api_token: Option<String>,
}

impl ReplicateClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(config.provider_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build Replicate HTTP client ({}), using defaults", e);
                Client::new()
            });
        ReplicateClient {
            client,
            base_url: config.replicate_api_url.trim_end_matches('/').to_string(),
            model_version: config.replicate_model_version.clone(),
            api_token: config.replicate_api_token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }

    /// Create a prediction conditioned on `reference_image_url`.
    pub async fn generate(
        &self,
        prompt: &str,
        reference_image_url: &str,
    ) -> Result<PredictionDescriptor, ProviderError> {
        let api_token = self
            .api_token
            .as_deref()
            .ok_or_else(|| ProviderError::not_configured(PROVIDER))?;
        if reference_image_url.trim().is_empty() {
            return Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::MissingReference,
                "Replicate requires a reference image",
            ));
        }

        let url = format!("{}/predictions", self.base_url);
        tracing::info!(version = %self.model_version, reference = %reference_image_url, "Creating Replicate prediction");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", api_token))
            .json(&json!({
                "version": self.model_version,
                "input": {
                    "prompt": prompt,
                    "image": reference_image_url,
                },
            }))
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            let message = format!("Replicate returned {}: {}", status, upstream_message(&error_body));
            tracing::error!("{}", message);
            return Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::Upstream { status: Some(status.as_u16()) },
                message,
            ));
        }

        let prediction: PredictionDescriptor = response.json().await.map_err(|e| {
            ProviderError::new(
                PROVIDER,
                ProviderErrorKind::MalformedResponse,
                format!("Failed to parse Replicate prediction: {}", e.without_url()),
            )
        })?;

        match prediction.status.as_str() {
            "failed" | "canceled" => {
                let reason = prediction.error.clone().unwrap_or_else(|| "Unknown error".to_string());
                Err(ProviderError::new(
                    PROVIDER,
                    ProviderErrorKind::Upstream { status: None },
                    format!("Replicate prediction {} {}: {}", prediction.id, prediction.status, reason),
                ))
            }
            _ => {
                tracing::info!(prediction_id = %prediction.id, status = %prediction.status, "Replicate prediction created");
                Ok(prediction)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, token: Option<&str>) -> Config {
        Config {
            replicate_api_token: token.map(String::from),
            replicate_api_url: server.uri(),
            replicate_model_version: "test-version".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn returns_the_prediction_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predictions"))
            .and(header("authorization", "Token r8_test"))
            .and(body_partial_json(json!({
                "version": "test-version",
                "input": { "prompt": "denim jacket", "image": "http://host/uploads/a.png" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "pred-123",
                "status": "starting",
                "urls": { "get": "https://api.replicate.com/v1/predictions/pred-123" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ReplicateClient::new(&config_for(&server, Some("r8_test")));
        let prediction = client
            .generate("denim jacket", "http://host/uploads/a.png")
            .await
            .unwrap();
        assert_eq!(prediction.id, "pred-123");
        assert_eq!(
            prediction.output_location().as_deref(),
            Some("https://api.replicate.com/v1/predictions/pred-123")
        );
    }

    #[tokio::test]
    async fn missing_token_fails_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let client = ReplicateClient::new(&config_for(&server, None));
        let err = client.generate("p", "http://host/a.png").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn empty_reference_is_rejected_locally() {
        let server = MockServer::start().await;
        let client = ReplicateClient::new(&config_for(&server, Some("r8_test")));
        let err = client.generate("p", "  ").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MissingReference);
    }

    #[tokio::test]
    async fn failed_prediction_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "pred-9",
                "status": "failed",
                "error": "NSFW content detected"
            })))
            .mount(&server)
            .await;

        let client = ReplicateClient::new(&config_for(&server, Some("r8_test")));
        let err = client.generate("p", "http://host/a.png").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Upstream { status: None });
        assert!(err.message.contains("NSFW content detected"));
    }

    #[test]
    fn output_location_prefers_finished_output() {
        let prediction = PredictionDescriptor {
            id: "p".into(),
            status: "succeeded".into(),
            output: Some(json!(["https://replicate.delivery/out-0.png"])),
            error: None,
            urls: Some(PredictionUrls { get: Some("https://api/p".into()), cancel: None }),
        };
        assert_eq!(
            prediction.output_location().as_deref(),
            Some("https://replicate.delivery/out-0.png")
        );

        let bare = PredictionDescriptor { output: None, urls: None, ..prediction };
        assert_eq!(bare.output_location(), None);
    }

    #[test]
    fn empty_output_defers_to_the_poll_url() {
        let urls = Some(PredictionUrls { get: Some("https://api/p".into()), cancel: None });
        for output in [json!(""), json!([""]), json!(["", null])] {
            let prediction = PredictionDescriptor {
                id: "p".into(),
                status: "starting".into(),
                output: Some(output.clone()),
                error: None,
                urls: urls.clone(),
            };
            assert_eq!(prediction.output_location().as_deref(), Some("https://api/p"), "output {}", output);
        }
    }
}
