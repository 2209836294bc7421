//! Axum request handlers for the HTTP API.
use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::routes::AppState;
use crate::error::{AppError, AppResult};
use crate::orchestrator::GenerationRequest;
use crate::providers::ProviderKind;
use crate::upload::{UploadError, UploadedAsset};

const IMAGE_FIELD: &str = "image";

pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "services": provider_flags(&state),
        "endpoints": {
            "health": "GET /health",
            "upload": "POST /upload",
            "generateSimple": "POST /generate-simple",
            "generate": "POST /generate",
        },
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut body = json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let (Some(obj), Value::Object(flags)) = (body.as_object_mut(), provider_flags(&state)) {
        obj.extend(flags);
    }
    Json(body)
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Value>> {
    let multipart = multipart.map_err(|r| AppError::BadRequest(r.body_text()))?;
    let form = read_form(multipart).await?;
    let file = form.image.ok_or(UploadError::MissingFile)?;
    let asset = accept_upload(&state, file).await?;

    Ok(Json(json!({
        "message": "File uploaded successfully",
        "file": {
            "filename": asset.storage_name,
            "originalName": asset.original_name,
            "path": asset.absolute_path.display().to_string(),
            "size": asset.size_bytes,
            "mimetype": asset.declared_media_type,
            "url": state.orchestrator.store().upload_url(&asset.storage_name),
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SimpleGenerateBody {
    pub prompt: Option<String>,
}

/// Text-to-image through Hugging Face only; never falls back.
pub async fn generate_simple(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SimpleGenerateBody>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = body.map_err(|r| AppError::BadRequest(format!("Invalid request body: {}", r.body_text())))?;
    let prompt = body
        .prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Prompt is required".to_string()))?;

    let request = GenerationRequest::new(Some(prompt)).prefer(Some(ProviderKind::HuggingFace));
    let result = state.orchestrator.generate(request).await?;

    Ok(Json(json!({
        "success": true,
        "generatedImage": result.output_location,
        "prompt": result.prompt_used,
        "service": result.used_provider.label(),
    })))
}

/// Full path: optional upload, optional prompt, optional `service` preference.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Value>> {
    let multipart = multipart.map_err(|r| AppError::BadRequest(r.body_text()))?;
    let form = read_form(multipart).await?;

    // Checked before the upload is stored so a bad request leaves nothing behind.
    let preferred = form
        .service
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<ProviderKind>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let asset = match form.image {
        Some(file) => Some(accept_upload(&state, file).await?),
        None => None,
    };
    let uploaded_url = asset
        .as_ref()
        .map(|a| state.orchestrator.store().upload_url(&a.storage_name));

    let request = GenerationRequest::new(form.prompt)
        .with_asset(asset)
        .prefer(preferred);
    let result = state.orchestrator.generate(request).await?;

    let mut body = json!({
        "success": true,
        "uploadedImage": uploaded_url,
        "generatedImage": result.output_location,
        "prompt": result.prompt_used,
        "service": result.used_provider.label(),
        "status": result.status,
    });
    if let (Some(obj), Some(prediction)) = (body.as_object_mut(), result.prediction) {
        obj.insert("prediction".to_string(), json!(prediction));
    }
    Ok(Json(body))
}

fn provider_flags(state: &AppState) -> Value {
    let flags: serde_json::Map<String, Value> = ProviderKind::ALL
        .iter()
        .map(|p| (p.id().to_string(), Value::Bool(state.orchestrator.is_configured(*p))))
        .collect();
    Value::Object(flags)
}

struct FilePart {
    file_name: String,
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
struct GenerateForm {
    image: Option<FilePart>,
    prompt: Option<String>,
    service: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> AppResult<GenerateForm> {
    let mut form = GenerateForm::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            IMAGE_FIELD => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(malformed)?;
                // Browsers send an empty, nameless part when no file was chosen.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                form.image = Some(FilePart { file_name, content_type, data });
            }
            "prompt" => form.prompt = Some(field.text().await.map_err(malformed)?),
            "service" => form.service = Some(field.text().await.map_err(malformed)?),
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }
    Ok(form)
}

async fn accept_upload(state: &AppState, file: FilePart) -> AppResult<UploadedAsset> {
    state
        .validator
        .accept(
            state.orchestrator.store(),
            IMAGE_FIELD,
            &file.file_name,
            &file.content_type,
            &file.data,
        )
        .await
}

fn malformed(err: MultipartError) -> AppError {
    AppError::Upload(UploadError::Malformed(err.to_string()))
}
