//! # Request Body Helpers
//!
//! Browser frontends send the prompt either as `application/x-www-form-urlencoded`,
//! as `multipart/form-data` (a `FormData` object), or as JSON. The text-field
//! extractor accepts all three. Audio always arrives as a multipart file field.

use crate::adapters::AudioUpload;
use crate::error::{AppError, AppResult};
use actix_multipart::{Field, Multipart};
use actix_web::error::PayloadError;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::web::Bytes;
use actix_web::HttpRequest;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;

fn content_type(req: &HttpRequest) -> String {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Read one text field from a buffered request body.
///
/// Returns `Ok(None)` when the field is absent; malformed bodies are a 400.
pub async fn text_field(req: &HttpRequest, body: Bytes, name: &str) -> AppResult<Option<String>> {
    let content_type = content_type(req);

    if content_type.starts_with("multipart/form-data") {
        let body_stream = stream::once(async move { Ok::<Bytes, PayloadError>(body) });
        let mut multipart = Multipart::new(req.headers(), body_stream);

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
            if field.name() == Some(name) {
                let bytes = collect_field(&mut field, usize::MAX).await?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| AppError::BadRequest(format!("Field '{}' is not valid UTF-8", name)))?;
                return Ok(Some(text));
            }
        }
        return Ok(None);
    }

    if content_type.starts_with("application/json") {
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        return Ok(value.get(name).and_then(|v| v.as_str()).map(str::to_string));
    }

    let fields: HashMap<String, String> = serde_urlencoded::from_bytes(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid form body: {}", e)))?;
    Ok(fields.get(name).cloned())
}

async fn collect_field(field: &mut Field, max_bytes: usize) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
        if bytes.len() + chunk.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Upload too large (max: {} bytes)",
                max_bytes
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Pull the `audio` file field out of a multipart upload.
///
/// ## Validation:
/// - the field must be present and non-empty (400 otherwise)
/// - the upload is aborted as soon as it exceeds `max_bytes` (413)
pub async fn audio_field(mut payload: Multipart, max_bytes: usize) -> AppResult<AudioUpload> {
    let mut upload: Option<AudioUpload> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::BadRequest("Missing content disposition".to_string()))?;
        let field_name = content_disposition.get_name().unwrap_or_default().to_string();
        let filename = content_disposition.get_filename().map(str::to_string);

        if field_name != "audio" {
            // Drain fields we do not care about.
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            }
            continue;
        }

        let content_type = field.content_type().map(|mime| mime.to_string());
        let bytes = collect_field(&mut field, max_bytes).await?;

        let mut audio = AudioUpload::new(bytes);
        if let Some(filename) = filename {
            audio = audio.with_filename(filename);
        }
        if let Some(content_type) = content_type {
            audio = audio.with_content_type(content_type);
        }
        upload = Some(audio);
    }

    let upload = upload.ok_or_else(|| AppError::BadRequest("No audio file provided".to_string()))?;
    if upload.bytes.is_empty() {
        return Err(AppError::BadRequest("Audio file is empty".to_string()));
    }
    Ok(upload)
}
