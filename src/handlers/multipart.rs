//! Shared multipart helper for the file-accepting endpoints.

use crate::error::{AppError, AppResult};
use actix_multipart::{Field, Multipart};
use futures_util::stream::StreamExt;

/// A file field collected fully into memory.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Collect the named file field from a multipart payload.
///
/// Other fields in the payload are drained and ignored. Returns a 400-style
/// error when the named field is missing or the payload is malformed.
pub async fn collect_file_field(mut payload: Multipart, field_name: &str) -> AppResult<UploadedFile> {
    let mut file: Option<UploadedFile> = None;

    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::BadRequest("Missing content disposition".to_string()))?;

        let name = content_disposition
            .get_name()
            .ok_or_else(|| AppError::BadRequest("Missing multipart field name".to_string()))?;

        if name != field_name {
            continue;
        }

        let filename = content_disposition
            .get_filename()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::BadRequest(format!("Multipart chunk error: {}", e)))?;
            bytes.extend_from_slice(&chunk);
        }

        file = Some(UploadedFile { filename, bytes });
    }

    file.ok_or_else(|| {
        AppError::BadRequest(format!("No '{}' field in multipart payload", field_name))
    })
}
