use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::service::{
    BucketSummary, DateRange, FileFilter, FileView, PermissionSummary, SortField, SortOrder, StorageStats,
    human_size,
};
use crate::types::{FileCategory, PermissionGrant, PermissionLevel, User};

#[derive(Debug, Deserialize)]
pub struct CreateBucketRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub user_email: String,
    pub permission_level: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGrantRequest {
    pub permission_level: String,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub permission: PermissionGrant,
    pub created: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user: User,
    /// Raw token; shown once.
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub cursor: Option<String>,
    pub limit: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub range: Option<String>,
}

/// Query string of `GET /search`. Everything arrives as text and is parsed
/// by [`SearchParams::into_query`] so bad values become `InvalidInput`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub file_type: Option<String>,
    pub size_category: Option<String>,
    pub date_range: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
    pub bucket_id: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain date
/// used as an upper bound covers the whole day.
fn parse_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("invalid date: {value}")))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| Error::InvalidInput(format!("invalid date: {value}")))
}

impl SearchParams {
    pub fn into_query(self) -> Result<(FileFilter, SortField, SortOrder)> {
        let filter = FileFilter {
            query: non_empty(self.q),
            file_type: non_empty(self.file_type).map(|s| s.parse()).transpose()?,
            size_category: non_empty(self.size_category)
                .map(|s| s.parse())
                .transpose()?,
            date_range: non_empty(self.date_range).map(|s| s.parse()).transpose()?,
            date_from: non_empty(self.date_from)
                .map(|s| parse_bound(&s, false))
                .transpose()?,
            date_to: non_empty(self.date_to)
                .map(|s| parse_bound(&s, true))
                .transpose()?,
            min_size: self.min_size,
            max_size: self.max_size,
            bucket_id: non_empty(self.bucket_id),
        };

        if let (Some(min), Some(max)) = (filter.min_size, filter.max_size) {
            if min > max {
                return Err(Error::InvalidInput(
                    "min_size cannot exceed max_size".into(),
                ));
            }
        }

        let sort: SortField = non_empty(self.sort)
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();
        let order: SortOrder = non_empty(self.order)
            .map(|s| s.parse())
            .transpose()?
            .unwrap_or_default();

        Ok((filter, sort, order))
    }
}

impl StatsParams {
    pub fn range(self) -> Result<DateRange> {
        Ok(non_empty(self.range)
            .map(|s| s.parse::<DateRange>())
            .transpose()?
            .unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<FileView>,
    pub count: usize,
    pub total_size: i64,
    pub total_size_human: String,
}

impl From<Vec<FileView>> for SearchResponse {
    fn from(results: Vec<FileView>) -> Self {
        let total_size = results.iter().map(|f| f.file.size_bytes).sum();
        Self {
            count: results.len(),
            total_size,
            total_size_human: human_size(total_size),
            results,
        }
    }
}

/// Everything the landing page needs, scoped to the caller.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub storage_stats: StorageStats,
    pub recent_files: Vec<FileView>,
    pub accessible_buckets: Vec<BucketSummary>,
    pub total_buckets: usize,
    pub permission_summary: PermissionSummary,
}

#[derive(Debug, Serialize)]
pub struct PermissionLevelInfo {
    pub level: PermissionLevel,
    pub display_name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub max_file_size: u64,
    pub max_file_size_human: String,
    pub max_storage_per_user: u64,
    pub blocked_extensions: Vec<String>,
    pub file_categories: BTreeMap<FileCategory, &'static [&'static str]>,
    pub permission_levels: Vec<PermissionLevelInfo>,
}
