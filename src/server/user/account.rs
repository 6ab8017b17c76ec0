use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{ConfigResponse, PermissionLevelInfo};
use crate::server::response::ApiResponse;
use crate::service::human_size;
use crate::types::{FileCategory, PermissionLevel};

pub async fn get_config(_auth: RequireUser, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let limits = state.service.limits();

    Json(ApiResponse::success(ConfigResponse {
        max_file_size: limits.max_file_size,
        max_file_size_human: human_size(i64::try_from(limits.max_file_size).unwrap_or(i64::MAX)),
        max_storage_per_user: limits.max_storage_per_user,
        blocked_extensions: limits.blocked_extensions.clone(),
        file_categories: FileCategory::ALL
            .into_iter()
            .filter(|category| *category != FileCategory::Other)
            .map(|category| (category, category.extensions()))
            .collect(),
        permission_levels: PermissionLevel::ALL
            .into_iter()
            .map(|level| PermissionLevelInfo {
                level,
                display_name: level.display_name(),
            })
            .collect(),
    }))
}

pub async fn get_me(auth: RequireUser) -> impl IntoResponse {
    Json(ApiResponse::success(auth.user))
}
