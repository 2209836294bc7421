//! Env-driven configuration for the service and library.
//!
//! Values are read from the process environment once at startup; `dotenv` is
//! loaded on demand by the binaries. Defaults are provided for convenience
//! during development. Provider clients receive the resulting `Config` by
//! reference, so credential presence is decided here and nowhere else.
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::providers::ProviderKind;

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct Config {
    pub huggingface_api_key: Option<String>,
    pub huggingface_api_url: String,
    pub huggingface_model: String,
    pub replicate_api_token: Option<String>,
    pub replicate_api_url: String,
    pub replicate_model_version: String,
    pub uploads_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub public_base_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub provider_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            huggingface_api_key: None,
            huggingface_api_url: "https://api-inference.huggingface.co".to_string(),
            huggingface_model: "stabilityai/stable-diffusion-xl-base-1.0".to_string(),
            replicate_api_token: None,
            replicate_api_url: "https://api.replicate.com/v1".to_string(),
            replicate_model_version: "cuuupid/idm-vton".to_string(),
            uploads_dir: PathBuf::from("./uploads"),
            generated_dir: PathBuf::from("./generated"),
            public_base_url: format!("http://localhost:{}", DEFAULT_PORT),
            api_host: "127.0.0.1".to_string(),
            api_port: DEFAULT_PORT,
            provider_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn from_env() -> AppResult<Self> {
        let defaults = Config::default();

        let api_port = match env::var("API_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("Invalid API_PORT '{}'", raw)))?,
            Err(_) => defaults.api_port,
        };
        let provider_timeout = match env::var("PROVIDER_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| AppError::Config(format!("Invalid PROVIDER_TIMEOUT_SECS '{}'", raw)))?,
            Err(_) => defaults.provider_timeout,
        };

        Ok(Config {
            huggingface_api_key: credential("HUGGINGFACE_API_KEY"),
            huggingface_api_url: env::var("HUGGINGFACE_API_URL").unwrap_or(defaults.huggingface_api_url),
            huggingface_model: env::var("HUGGINGFACE_MODEL").unwrap_or(defaults.huggingface_model),
            replicate_api_token: credential("REPLICATE_API_TOKEN"),
            replicate_api_url: env::var("REPLICATE_API_URL").unwrap_or(defaults.replicate_api_url),
            replicate_model_version: env::var("REPLICATE_MODEL_VERSION").unwrap_or(defaults.replicate_model_version),
            uploads_dir: env::var("UPLOADS_DIR").map(PathBuf::from).unwrap_or(defaults.uploads_dir),
            generated_dir: env::var("GENERATED_DIR").map(PathBuf::from).unwrap_or(defaults.generated_dir),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", api_port)),
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port,
            provider_timeout,
        })
    }

    /// Whether the credential for `provider` is present.
    pub fn is_configured(&self, provider: ProviderKind) -> bool {
        match provider {
            ProviderKind::HuggingFace => self.huggingface_api_key.is_some(),
            ProviderKind::Replicate => self.replicate_api_token.is_some(),
        }
    }

    /// Whether `public_base_url` points at this machine only. Service B has to
    /// fetch uploads through that URL, so a loopback address is unreachable
    /// for it.
    pub fn public_base_url_is_loopback(&self) -> bool {
        let Ok(url) = reqwest::Url::parse(&self.public_base_url) else {
            return false;
        };
        match url.host_str() {
            Some(host) if host.eq_ignore_ascii_case("localhost") => true,
            Some(host) => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false),
            None => false,
        }
    }

    pub fn print_env_vars(&self) {
        tracing::info!("HUGGINGFACE_API_KEY: {}", mask(&self.huggingface_api_key));
        tracing::info!("HUGGINGFACE_API_URL: {}", self.huggingface_api_url);
        tracing::info!("HUGGINGFACE_MODEL: {}", self.huggingface_model);
        tracing::info!("REPLICATE_API_TOKEN: {}", mask(&self.replicate_api_token));
        tracing::info!("REPLICATE_API_URL: {}", self.replicate_api_url);
        tracing::info!("REPLICATE_MODEL_VERSION: {}", self.replicate_model_version);
        tracing::info!("UPLOADS_DIR: {}", self.uploads_dir.display());
        tracing::info!("GENERATED_DIR: {}", self.generated_dir.display());
        tracing::info!("PUBLIC_BASE_URL: {}", self.public_base_url);
        tracing::info!("PROVIDER_TIMEOUT_SECS: {}", self.provider_timeout.as_secs());
    }
}

// Empty values count as unset.
fn credential(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn mask(secret: &Option<String>) -> &'static str {
    if secret.is_some() { "<set>" } else { "<unset>" }
}
