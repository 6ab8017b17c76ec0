use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::{RequireAdmin, register_user};
use crate::server::AppState;
use crate::server::dto::{CreateUserRequest, CreateUserResponse, PaginationParams};
use crate::server::response::{ApiError, ApiResponse, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, paginate};

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, token) = register_user(state.service.store(), &state.tokens, &req.email)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreateUserResponse { user, token })),
    ))
}

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let cursor = params.cursor.as_deref().unwrap_or("");

    let users = state.service.store().list_users(cursor, limit + 1)?;
    let page = paginate(users, limit as usize, |u| u.id.clone());
    Ok(Json(ApiResponse::success(page)))
}
