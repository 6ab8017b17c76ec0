use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::Error;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Paginated response for list endpoints
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Splits off one page from `items`, which holds up to `limit + 1` rows.
pub fn paginate<T, F>(items: Vec<T>, limit: usize, get_cursor: F) -> PaginatedResponse<T>
where
    T: Serialize,
    F: Fn(&T) -> String,
{
    let has_more = items.len() > limit;
    let items: Vec<T> = items.into_iter().take(limit).collect();
    let next_cursor = if has_more {
        items.last().map(&get_cursor)
    } else {
        None
    };
    PaginatedResponse {
        items,
        next_cursor,
        has_more,
    }
}

pub const DEFAULT_PAGE_SIZE: i32 = 50;
pub const MAX_PAGE_SIZE: i32 = 200;

/// Error envelope: `{"success": false, "error": "<Kind>", "message": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "InvalidInput",
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::NotFound | Error::UnknownUser => StatusCode::NOT_FOUND,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::DuplicateName => StatusCode::CONFLICT,
            Error::SelfShareRejected
            | Error::InvalidPermissionLevel(_)
            | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Unauthorized | Error::InvalidTokenFormat | Error::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            Error::StorageIo(_)
            | Error::Database(_)
            | Error::TokenLookupCollision
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {e}");
            match e {
                Error::StorageIo(_) => "Storage operation failed".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            capitalize(&e.to_string())
        };

        Self {
            status,
            kind: e.kind(),
            message,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": self.kind, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let cases = [
            (Error::NotFound, StatusCode::NOT_FOUND, "NotFound"),
            (Error::Forbidden, StatusCode::FORBIDDEN, "Forbidden"),
            (Error::DuplicateName, StatusCode::CONFLICT, "DuplicateName"),
            (Error::UnknownUser, StatusCode::NOT_FOUND, "UnknownUser"),
            (
                Error::SelfShareRejected,
                StatusCode::BAD_REQUEST,
                "SelfShareRejected",
            ),
            (
                Error::PayloadTooLarge(10),
                StatusCode::PAYLOAD_TOO_LARGE,
                "PayloadTooLarge",
            ),
        ];

        for (error, status, kind) in cases {
            let api: ApiError = error.into();
            assert_eq!(api.status, status);
            assert_eq!(api.kind, kind);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let api: ApiError =
            Error::StorageIo(std::io::Error::other("/srv/data/blobs/secret: EIO")).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.kind, "StorageIOError");
        assert!(!api.message.contains("/srv"));
    }

    #[test]
    fn test_paginate() {
        let page = paginate(vec![1, 2, 3], 2, |n| n.to_string());
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("2"));
    }
}
