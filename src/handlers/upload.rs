//! # Upload Handler
//!
//! `POST /upload`: pure acknowledgment echo. The file is read fully into
//! memory and its filename and byte count are reported back; nothing is
//! persisted, scanned, or size-limited.

use crate::error::AppResult;
use crate::handlers::multipart::collect_file_field;
use actix_multipart::Multipart;
use actix_web::HttpResponse;
use serde_json::json;
use tracing::info;

/// `POST /upload` handler.
pub async fn upload_file(payload: Multipart) -> AppResult<HttpResponse> {
    let file = collect_file_field(payload, "file").await?;

    info!(
        filename = %file.filename,
        size_bytes = file.bytes.len(),
        "File received"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": format!(
            "Received file {} with {} bytes.",
            file.filename,
            file.bytes.len()
        )
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::multipart::test_support::{content_type, multipart_body};
    use actix_web::{test, web, App};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_upload_echoes_filename_and_size() {
        let app = test::init_service(
            App::new().route("/upload", web::post().to(upload_file)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/upload")
            .insert_header(("content-type", content_type()))
            .set_payload(multipart_body("file", "notes.txt", b"hello world"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["message"], "Received file notes.txt with 11 bytes.");
    }

    #[actix_web::test]
    async fn test_upload_acknowledges_zero_byte_file() {
        let app = test::init_service(
            App::new().route("/upload", web::post().to(upload_file)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/upload")
            .insert_header(("content-type", content_type()))
            .set_payload(multipart_body("file", "empty.bin", b""))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["message"], "Received file empty.bin with 0 bytes.");
    }

    #[actix_web::test]
    async fn test_upload_rejects_missing_file_field() {
        let app = test::init_service(
            App::new().route("/upload", web::post().to(upload_file)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/upload")
            .insert_header(("content-type", content_type()))
            .set_payload(multipart_body("attachment", "notes.txt", b"hello"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_client_error());
    }
}
