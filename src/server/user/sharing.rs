use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{ShareRequest, ShareResponse, UpdateGrantRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::PermissionLevel;

pub async fn share_bucket(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let level: PermissionLevel = req.permission_level.parse()?;
    let (permission, created) =
        state
            .service
            .share_bucket(&auth.user.id, &id, &req.user_email, level)?;

    let message = if created {
        format!("Shared with {} ({})", req.user_email, level.display_name())
    } else {
        format!(
            "Updated access for {} to {}",
            req.user_email,
            level.display_name()
        )
    };

    Ok(Json(ApiResponse::success(ShareResponse {
        permission,
        created,
        message,
    })))
}

pub async fn list_permissions(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let grants = state.service.list_grants(&auth.user.id, &id)?;
    Ok(Json(ApiResponse::success(grants)))
}

pub async fn update_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(grant_id): Path<String>,
    Json(req): Json<UpdateGrantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let level: PermissionLevel = req.permission_level.parse()?;
    let grant = state
        .service
        .update_grant(&auth.user.id, &grant_id, level)?;
    Ok(Json(ApiResponse::success(grant)))
}

pub async fn revoke_permission(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(grant_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let grant = state.service.revoke_grant(&auth.user.id, &grant_id)?;
    Ok(Json(ApiResponse::success(grant)))
}

pub async fn permission_summary(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.service.permission_summary(&auth.user.id)?;
    Ok(Json(ApiResponse::success(summary)))
}
