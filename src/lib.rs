//! Image generation relay library
//!
//! Modules:
//! - `api`: Axum HTTP handlers and router setup used by the binary.
//! - `orchestrator`: Provider selection with Hugging Face primary and Replicate fallback.
//! - `providers`: Thin clients for the Hugging Face and Replicate APIs.
//! - `upload`: Allow-list validation and intake of uploaded images.
//! - `storage`: Upload and generated-output areas on disk.
//! - `prompt`: Prompt resolution with the default fashion prompt.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `Orchestrator`,
//! `GenerationRequest`, `UploadValidator` and `AssetStore`.
pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod storage;
pub mod upload;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{GenerationRequest, GenerationResult, Orchestrator};
pub use providers::ProviderKind;
pub use storage::AssetStore;
pub use upload::UploadValidator;
