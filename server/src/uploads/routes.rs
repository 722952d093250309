//! REST endpoints for file upload and download.
//!
//! POST /upload — multipart form: `file` (the file) and `recipient_id`
//! GET /files/{key} — download a stored file

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::delivery::ClientId;
use crate::state::AppState;
use crate::uploads::store::StoreError;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Missing 'file' field")]
    MissingFile,

    #[error("Missing 'recipient_id' field")]
    MissingRecipient,

    #[error("File exceeds maximum upload size of {0} bytes")]
    TooLarge(usize),

    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("File not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::MissingRecipient => StatusCode::BAD_REQUEST,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Multipart(e) => e.status(),
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Store(StoreError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Upload request failed");
        } else {
            tracing::debug!(error = %self, "Upload request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// POST /upload
///
/// Stores the `file` field and returns `{"filename", "url"}`. The caller is
/// expected to send the URL to `recipient_id` over its WebSocket.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    let mut file = None;
    let mut recipient = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                if data.len() > state.max_upload_bytes {
                    return Err(UploadError::TooLarge(state.max_upload_bytes));
                }
                file = Some((filename, data));
            }
            Some("recipient_id") => {
                recipient = ClientId::new(field.text().await?);
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    let (filename, data) = file.ok_or(UploadError::MissingFile)?;
    let recipient = recipient.ok_or(UploadError::MissingRecipient)?;
    let size = data.len();

    let stored = state.store.put(&filename, data).await?;

    tracing::info!(
        recipient_id = %recipient,
        filename = %filename,
        key = %stored.key,
        size = size,
        "File uploaded"
    );

    Ok(Json(UploadResponse {
        filename,
        url: stored.url,
    }))
}

/// GET /files/{key}
///
/// Returns the stored bytes as `application/octet-stream`, 404 if unknown.
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, UploadError> {
    let data = state.store.get(&key).await?.ok_or(UploadError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}
