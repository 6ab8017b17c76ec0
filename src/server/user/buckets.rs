use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateBucketRequest, RenameRequest};
use crate::server::response::{ApiError, ApiResponse};

pub async fn create_bucket(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBucketRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bucket = state.service.create_bucket(&auth.user.id, &req.name)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(bucket))))
}

pub async fn list_buckets(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let buckets = state.service.visible_buckets(&auth.user.id)?;
    Ok(Json(ApiResponse::success(buckets)))
}

pub async fn list_shared_buckets(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let shared = state.service.list_shared_with_me(&auth.user.id)?;
    Ok(Json(ApiResponse::success(shared)))
}

pub async fn rename_bucket(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let bucket = state
        .service
        .rename_bucket(&auth.user.id, &id, &req.new_name)?;
    Ok(Json(ApiResponse::success(bucket)))
}

pub async fn delete_bucket(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let files_deleted = state.service.delete_bucket(&auth.user.id, &id).await?;
    Ok(Json(ApiResponse::success(json!({
        "id": id,
        "files_deleted": files_deleted,
    }))))
}

pub async fn list_bucket_files(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let files = state.service.list_files(&auth.user.id, &id)?;
    Ok(Json(ApiResponse::success(files)))
}
