//! Blob containers and file-share logs.
//!
//! Successful blob uploads and log deletions leave an activity log on the
//! default `logs` share. Failing to write that log never fails the request.

use crate::{
    errors::AppError,
    models::file::{FileUpload, UploadedFile},
    services::{
        StorageResultExt,
        blob_service::URL_SEGMENT,
        file_service::{DEFAULT_SHARE, activity_log_name},
    },
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use percent_encoding::utf8_percent_encode;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::warn;

/// The parts of a multipart upload form this service understands.
#[derive(Debug)]
pub struct FileForm {
    pub file_name: String,
    pub content_type: Option<String>,
    pub content: Bytes,
    pub description: String,
    pub category: String,
}

/// Read a `file` part plus optional `description` and `category` text parts.
/// Unknown parts are skipped.
pub(crate) async fn read_file_form(mut multipart: Multipart) -> Result<FileForm, AppError> {
    let mut file = None;
    let mut description = String::new();
    let mut category = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let content = field.bytes().await?;
                file = Some((file_name, content_type, content));
            }
            Some("description") => description = field.text().await?,
            Some("category") => category = field.text().await?,
            _ => {}
        }
    }

    match file {
        Some((file_name, content_type, content)) if !file_name.is_empty() && !content.is_empty() => {
            Ok(FileForm {
                file_name,
                content_type,
                content,
                description,
                category,
            })
        }
        _ => Err(AppError::bad_request(
            "Please select a valid file to upload.",
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct ShareQuery {
    pub share: Option<String>,
}

impl ShareQuery {
    fn share(&self) -> &str {
        self.share
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SHARE)
    }
}

async fn write_activity_log(state: &AppState, action: &str, message: String) {
    let name = activity_log_name(action, Utc::now());
    if let Err(err) = state.files.upload_log(&name, &message, DEFAULT_SHARE).await {
        warn!(file_name = %name, error = %err, "could not write activity log");
    }
}

// --- Blobs ---

/// `GET /files/blobs/{container}`: empty when the container is missing or
/// unreadable.
pub async fn list_blobs(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> Json<Vec<UploadedFile>> {
    Json(
        state
            .blobs
            .list(&container)
            .await
            .or_degrade(Vec::new(), "list blobs"),
    )
}

/// `POST /files/blobs/{container}` (multipart `file`, `description`, `category`)
pub async fn upload_blob(
    State(state): State<AppState>,
    Path(container): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_file_form(multipart).await?;
    let uploaded = state
        .blobs
        .upload(FileUpload {
            file_name: form.file_name,
            container_name: container,
            content_type: form.content_type,
            description: form.description,
            category: form.category,
            content: form.content,
        })
        .await?;

    write_activity_log(
        &state,
        "upload",
        format!(
            "File uploaded: {}, Size: {} bytes, Container: {}",
            uploaded.file_name, uploaded.file_size, uploaded.container_name
        ),
    )
    .await;

    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// `PUT /files/blobs/{container}`: 201 when created, 200 when it existed.
pub async fn create_container(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> Result<StatusCode, AppError> {
    Ok(if state.blobs.create_container(&container).await? {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    })
}

/// `HEAD /files/blobs/{container}`
pub async fn head_container(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> StatusCode {
    let exists = state
        .blobs
        .container_exists(&container)
        .await
        .or_degrade(false, "container exists");
    if exists {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// `GET /files/blobs/{container}/{name}` as a streaming attachment.
pub async fn download_blob(
    State(state): State<AppState>,
    Path((container, name)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (file_info, file) = state.blobs.download(&name, &container).await?;
    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file_info.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(file_info.file_size.max(0) as u64),
    );
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(&file_info.file_name, URL_SEGMENT)
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// `DELETE /files/blobs/{container}/{name}`: 204, or 404 when nothing was
/// deleted.
pub async fn delete_blob(
    State(state): State<AppState>,
    Path((container, name)): Path<(String, String)>,
) -> StatusCode {
    let deleted = state
        .blobs
        .delete(&name, &container)
        .await
        .or_degrade(false, "delete blob");
    if deleted {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Logs ---

/// `GET /files/logs?share=`: log file names.
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<ShareQuery>,
) -> Json<Vec<String>> {
    let logs = state
        .files
        .list_logs(query.share())
        .await
        .or_degrade(Vec::new(), "list logs");
    Json(logs.into_iter().map(|log| log.file_name).collect())
}

/// `GET /files/logs/{name}?share=` as plain text.
pub async fn get_log(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ShareQuery>,
) -> Result<Response, AppError> {
    let content = state
        .files
        .download_log(&name, query.share())
        .await?
        .ok_or_else(|| AppError::not_found(format!("log `{name}` not found")))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        content,
    )
        .into_response())
}

/// `PUT /files/logs/{name}?share=`: create or replace a log with the body.
pub async fn put_log(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ShareQuery>,
    body: String,
) -> Result<StatusCode, AppError> {
    state.files.upload_log(&name, &body, query.share()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /files/logs/{name}?share=`
pub async fn delete_log(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ShareQuery>,
) -> StatusCode {
    let deleted = state
        .files
        .delete_log(&name, query.share())
        .await
        .or_degrade(false, "delete log");
    if !deleted {
        return StatusCode::NOT_FOUND;
    }

    write_activity_log(
        &state,
        "delete",
        format!(
            "File deleted: {}, Time: {}",
            name,
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ),
    )
    .await;
    StatusCode::NO_CONTENT
}
