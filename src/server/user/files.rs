use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use tokio_util::io::ReaderStream;

use crate::auth::RequireUser;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{RecentParams, RenameRequest};
use crate::server::response::{ApiError, ApiResponse};

const DEFAULT_RECENT: usize = 10;
const MAX_RECENT: usize = 100;

/// Parts of an upload form. Fields may arrive in any order.
#[derive(Default)]
struct UploadForm {
    bucket_id: Option<String>,
    bucket_name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Option<Bytes>,
}

fn multipart_error(state: &AppState, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(state.config.limits.max_file_size).into()
    } else {
        ApiError::bad_request(e.body_text())
    }
}

async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(state, e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bucket_id" => {
                form.bucket_id = Some(field.text().await.map_err(|e| multipart_error(state, e))?);
            }
            "bucket_name" => {
                form.bucket_name =
                    Some(field.text().await.map_err(|e| multipart_error(state, e))?);
            }
            "file" => {
                form.file_name = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                form.data = Some(field.bytes().await.map_err(|e| multipart_error(state, e))?);
            }
            other => {
                tracing::debug!("Ignoring unknown upload field {other}");
            }
        }
    }

    Ok(form)
}

pub async fn upload_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let form = read_form(&state, multipart).await?;

    let data = form
        .data
        .ok_or_else(|| ApiError::bad_request("No file selected"))?;
    let file_name = form
        .file_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No file selected"))?;

    let bucket_id = match (form.bucket_id, form.bucket_name) {
        (Some(id), _) if !id.trim().is_empty() => id,
        (_, Some(name)) if !name.trim().is_empty() => {
            state.service.resolve_bucket(&auth.user.id, name.trim())?.id
        }
        _ => return Err(ApiError::bad_request("bucket_id or bucket_name is required")),
    };

    let file = state
        .service
        .upload_file(
            &auth.user.id,
            &bucket_id,
            &file_name,
            form.content_type.as_deref(),
            &data,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(file))))
}

/// `attachment` disposition with an ASCII fallback name and the full name
/// percent-encoded per RFC 5987.
fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let fallback = if fallback.is_empty() {
        "download".to_string()
    } else {
        fallback
    };

    let value = format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    );
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"download\""))
}

pub async fn download_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let download = state.service.download_file(&auth.user.id, &file_id).await?;

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&download.file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(download.size));
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&download.file.name),
    );
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", download.file.checksum)) {
        headers.insert(header::ETAG, etag);
    }
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    let body = Body::from_stream(ReaderStream::new(download.reader));
    Ok((StatusCode::OK, headers, body))
}

pub async fn delete_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let file = state.service.delete_file(&auth.user.id, &file_id).await?;
    Ok(Json(ApiResponse::success(file)))
}

pub async fn rename_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let file = state
        .service
        .rename_file(&auth.user.id, &file_id, &req.new_name)?;
    Ok(Json(ApiResponse::success(file)))
}

pub async fn recent_files(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT).clamp(1, MAX_RECENT);
    let files = state.service.recent_files(&auth.user.id, limit)?;
    Ok(Json(ApiResponse::success(files)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_encodes_name() {
        let value = content_disposition("résumé 2024.pdf");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"rsum2024.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9%202024.pdf"
        );
    }

    #[test]
    fn test_content_disposition_fallback() {
        let value = content_disposition("日本");
        assert!(value.to_str().unwrap().starts_with("attachment; filename=\"download\""));
    }
}
