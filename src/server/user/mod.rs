mod account;
mod buckets;
mod files;
mod search;
mod sharing;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Buckets
        .route("/buckets", post(buckets::create_bucket))
        .route("/buckets", get(buckets::list_buckets))
        .route("/buckets/shared", get(buckets::list_shared_buckets))
        .route("/buckets/{id}", delete(buckets::delete_bucket))
        .route("/buckets/{id}/rename", put(buckets::rename_bucket))
        .route("/buckets/{id}/files", get(buckets::list_bucket_files))
        // Sharing
        .route("/buckets/{id}/share", post(sharing::share_bucket))
        .route("/buckets/{id}/permissions", get(sharing::list_permissions))
        .route("/permissions/summary", get(sharing::permission_summary))
        .route("/permissions/{grant_id}", put(sharing::update_permission))
        .route("/permissions/{grant_id}", delete(sharing::revoke_permission))
        // Files
        .route("/upload", post(files::upload_file))
        .route("/download/{file_id}", get(files::download_file))
        .route("/files/recent", get(files::recent_files))
        .route("/files/{file_id}", delete(files::delete_file))
        .route("/files/{file_id}/rename", put(files::rename_file))
        // Search and stats
        .route("/search", get(search::search_files))
        .route("/search/filters", get(search::filter_options))
        .route("/stats", get(search::storage_stats))
        .route("/dashboard", get(search::dashboard))
        // Account
        .route("/config", get(account::get_config))
        .route("/me", get(account::get_me))
}
