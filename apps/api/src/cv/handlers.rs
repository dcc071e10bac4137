use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::cv::store::{ResumeItem, StoredResume};
use crate::email::notifier::NotifyOutcome;
use crate::errors::AppError;
use crate::routes::{no_store_headers, NoStoreHeaders};
use crate::state::AppState;

const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Serialize)]
pub struct ResumeListResponse {
    pub items: Vec<ResumeItem>,
}

struct UploadedFile {
    content_type: Option<String>,
    data: Bytes,
}

/// Fields collected from the multipart body; unknown parts are ignored.
#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    name: String,
    email: String,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().map(str::to_string);
            match field_name.as_deref() {
                Some("file") => form.file = Some(read_file(field).await?),
                Some("name") => form.name = field.text().await.map_err(multipart_error)?,
                Some("email") => form.email = field.text().await.map_err(multipart_error)?,
                _ => {}
            }
        }

        Ok(form)
    }

    /// Applies the upload rules in order: presence, media type, then size.
    fn validate(self, max_bytes: usize) -> Result<ValidUpload, AppError> {
        let file = self
            .file
            .ok_or_else(|| AppError::Validation("Missing file".to_string()))?;
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Missing name".to_string()));
        }
        let email = self.email.trim().to_string();
        if email.is_empty() {
            return Err(AppError::Validation("Missing email address".to_string()));
        }
        if file.content_type.as_deref() != Some(PDF_MIME) {
            return Err(AppError::UnsupportedMediaType(
                "Only PDF files are allowed".to_string(),
            ));
        }
        if file.data.len() > max_bytes {
            return Err(AppError::PayloadTooLarge("File too large".to_string()));
        }
        Ok(ValidUpload {
            data: file.data,
            name,
            email,
        })
    }
}

struct ValidUpload {
    data: Bytes,
    name: String,
    email: String,
}

async fn read_file(field: Field<'_>) -> Result<UploadedFile, AppError> {
    let content_type = field.content_type().map(str::to_string);
    let data = field.bytes().await.map_err(multipart_error)?;
    Ok(UploadedFile { content_type, data })
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File too large".to_string())
    } else {
        AppError::Validation(e.body_text())
    }
}

/// POST /api/cv/upload
///
/// Stores an uploaded PDF résumé and notifies the uploader. Notification
/// failures are logged and do not fail the upload.
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, NoStoreHeaders, Json<StoredResume>), AppError> {
    let multipart = multipart
        .map_err(|_| AppError::Validation("Expected multipart/form-data".to_string()))?;

    let upload = UploadForm::read(multipart)
        .await?
        .validate(state.config.max_upload_bytes)?;

    let stored = state
        .store
        .save(&upload.name, &upload.email, &upload.data)
        .await?;

    match state.templates.upload_processed(&upload.email, &stored.name) {
        Ok(message) => match state.notifier.notify(message).await {
            Ok(NotifyOutcome::Sent) => info!("Notification email sent to {}", upload.email),
            Ok(NotifyOutcome::Skipped) => info!("Email not configured, skipping notification"),
            Err(e) => warn!("Failed to send notification email: {e}"),
        },
        Err(e) => warn!("Failed to render notification email: {e}"),
    }

    Ok((StatusCode::CREATED, no_store_headers(), Json(stored)))
}

/// GET /api/cv/list
pub async fn handle_list(
    State(state): State<AppState>,
) -> Result<Json<ResumeListResponse>, AppError> {
    let items = state.store.list().await?;
    Ok(Json(ResumeListResponse { items }))
}
