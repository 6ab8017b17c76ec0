use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{DashboardResponse, SearchParams, SearchResponse, StatsParams};
use crate::server::response::{ApiError, ApiResponse};
use crate::service::DateRange;

const DASHBOARD_RECENT: usize = 5;

pub async fn search_files(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (filter, sort, order) = params.into_query()?;
    let files = state
        .service
        .visible_files(&auth.user.id, &filter, sort, order)?;
    Ok(Json(ApiResponse::success(SearchResponse::from(files))))
}

pub async fn filter_options(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let options = state.service.filter_options(&auth.user.id)?;
    Ok(Json(ApiResponse::success(options)))
}

pub async fn storage_stats(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .service
        .storage_stats(&auth.user.id, params.range()?)?;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn dashboard(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = &auth.user.id;
    let accessible_buckets = state.service.visible_buckets(user_id)?;
    let dashboard = DashboardResponse {
        storage_stats: state.service.storage_stats(user_id, DateRange::All)?,
        recent_files: state.service.recent_files(user_id, DASHBOARD_RECENT)?,
        total_buckets: accessible_buckets.len(),
        accessible_buckets,
        permission_summary: state.service.permission_summary(user_id)?,
    };
    Ok(Json(ApiResponse::success(dashboard)))
}
