//! Per-user aggregation: visible buckets, file search, recent files,
//! filter options and storage statistics.
//!
//! Results only ever contain buckets the caller owns or holds a grant on.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Service;
use crate::error::{Error, Result};
use crate::types::{Access, Bucket, FileCategory, FileRecord, PermissionLevel, SizeCategory};

/// A bucket as seen by one user.
#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub owner_email: Option<String>,
    /// `owner`, or the grant level for shared buckets.
    pub access: &'static str,
    pub permission_level: PermissionLevel,
    pub permission_display: &'static str,
    pub is_owner: bool,
    pub is_shared: bool,
    pub file_count: i64,
    pub total_size: i64,
    pub total_size_human: String,
    pub created_at: DateTime<Utc>,
}

/// A file enriched for listings and search results.
#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    #[serde(flatten)]
    pub file: FileRecord,
    pub bucket_name: String,
    pub file_type: FileCategory,
    pub size_category: SizeCategory,
    pub size_human: String,
    pub permission_level: PermissionLevel,
    pub is_own_file: bool,
}

/// Search filters; every bound is inclusive and unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub query: Option<String>,
    pub file_type: Option<FileCategory>,
    pub size_category: Option<SizeCategory>,
    pub date_range: Option<DateRange>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
    pub bucket_id: Option<String>,
}

impl FileFilter {
    fn matches(&self, view: &FileView, now: DateTime<Utc>) -> bool {
        let file = &view.file;

        if let Some(q) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if !file.name.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        if self.file_type.is_some_and(|t| t != view.file_type) {
            return false;
        }
        if self.size_category.is_some_and(|c| c != view.size_category) {
            return false;
        }
        if self.date_range.is_some_and(|r| !r.contains(file.uploaded_at, now)) {
            return false;
        }
        if self.date_from.is_some_and(|from| file.uploaded_at < from)
            || self.date_to.is_some_and(|to| file.uploaded_at > to)
        {
            return false;
        }
        if self.min_size.is_some_and(|min| file.size_bytes < min)
            || self.max_size.is_some_and(|max| file.size_bytes > max)
        {
            return false;
        }
        if self
            .bucket_id
            .as_deref()
            .is_some_and(|id| id != file.bucket_id)
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Name,
    Size,
    #[default]
    Date,
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "size" => Ok(Self::Size),
            "date" => Ok(Self::Date),
            _ => Err(Error::InvalidInput(format!("unknown sort field: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(Error::InvalidInput(format!("unknown sort order: {s}"))),
        }
    }
}

/// Upload-date window used by search and storage stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
    Year,
}

impl DateRange {
    pub const ALL: [DateRange; 5] = [Self::All, Self::Today, Self::Week, Self::Month, Self::Year];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// `today` means the same UTC calendar day; the others count whole days back.
    #[must_use]
    pub fn contains(self, uploaded_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let days = (now - uploaded_at).num_days();
        match self {
            Self::All => true,
            Self::Today => uploaded_at.date_naive() == now.date_naive(),
            Self::Week => days <= 7,
            Self::Month => days <= 30,
            Self::Year => days <= 365,
        }
    }
}

impl FromStr for DateRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown date range: {s}")))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryCount {
    pub count: i64,
    pub size: i64,
    pub size_human: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub range: DateRange,
    pub total_files: i64,
    pub total_size: i64,
    pub total_size_human: String,
    pub bucket_count: usize,
    pub shared_bucket_count: usize,
    pub file_types: BTreeMap<FileCategory, CategoryCount>,
    pub storage_limit: u64,
    pub storage_limit_human: String,
    pub storage_used_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketOption {
    pub id: String,
    pub name: String,
    pub owner_email: Option<String>,
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub file_types: BTreeMap<FileCategory, usize>,
    pub size_categories: [SizeCategory; 3],
    pub date_ranges: [DateRange; 4],
    pub sort_fields: [SortField; 3],
    pub buckets: Vec<BucketOption>,
}

/// Formats a byte count the way listings show it, e.g. `1.5 MB`.
#[must_use]
pub fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes.max(0) as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes.max(0))
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// One visible bucket with the caller's access.
struct Visible {
    bucket: Bucket,
    access: Access,
}

impl Service {
    /// Owned buckets first, then shared ones; each group sorted by name.
    fn visible(&self, user_id: &str) -> Result<Vec<Visible>> {
        let mut owned: Vec<Visible> = self
            .store
            .list_owned_buckets(user_id)?
            .into_iter()
            .map(|bucket| Visible {
                bucket,
                access: Access::Owner,
            })
            .collect();
        owned.sort_by(|a, b| by_name(&a.bucket, &b.bucket));

        let mut shared = Vec::new();
        for grant in self.store.list_user_grants(user_id)? {
            if let Some(bucket) = self.store.get_bucket(&grant.bucket_id)? {
                shared.push(Visible {
                    bucket,
                    access: Access::Shared(grant.level),
                });
            }
        }
        shared.sort_by(|a, b| by_name(&a.bucket, &b.bucket));

        owned.extend(shared);
        Ok(owned)
    }

    fn owner_email(&self, owner_id: &str) -> Result<Option<String>> {
        Ok(self.store.get_user(owner_id)?.map(|u| u.email))
    }

    pub fn visible_buckets(&self, user_id: &str) -> Result<Vec<BucketSummary>> {
        self.visible(user_id)?
            .into_iter()
            .map(|Visible { bucket, access }| {
                let usage = self.store.bucket_usage(&bucket.id)?;
                let level = access.level().unwrap_or(PermissionLevel::View);
                Ok::<_, Error>(BucketSummary {
                    owner_email: self.owner_email(&bucket.owner_id)?,
                    id: bucket.id,
                    name: bucket.name,
                    owner_id: bucket.owner_id,
                    access: access.name(),
                    permission_level: level,
                    permission_display: access.display_name(),
                    is_owner: access.is_owner(),
                    is_shared: !access.is_owner(),
                    file_count: usage.file_count,
                    total_size: usage.total_size,
                    total_size_human: human_size(usage.total_size),
                    created_at: bucket.created_at,
                })
            })
            .collect()
    }

    fn visible_file_views(&self, user_id: &str) -> Result<Vec<FileView>> {
        let mut views = Vec::new();
        for Visible { bucket, access } in self.visible(user_id)? {
            let level = access.level().unwrap_or(PermissionLevel::View);
            for file in self.store.list_bucket_files(&bucket.id)? {
                views.push(FileView {
                    bucket_name: bucket.name.clone(),
                    file_type: FileCategory::from_name(&file.name),
                    size_category: SizeCategory::of(file.size_bytes),
                    size_human: human_size(file.size_bytes),
                    permission_level: level,
                    is_own_file: file.uploaded_by == user_id,
                    file,
                });
            }
        }
        Ok(views)
    }

    /// Files across every visible bucket matching `filter`, ordered by
    /// `sort`/`order` with ties broken by file id.
    pub fn visible_files(
        &self,
        user_id: &str,
        filter: &FileFilter,
        sort: SortField,
        order: SortOrder,
    ) -> Result<Vec<FileView>> {
        let now = Utc::now();
        let mut views: Vec<FileView> = self
            .visible_file_views(user_id)?
            .into_iter()
            .filter(|view| filter.matches(view, now))
            .collect();

        views.sort_by(|a, b| {
            let primary = match sort {
                SortField::Name => a.file.name.to_lowercase().cmp(&b.file.name.to_lowercase()),
                SortField::Size => a.file.size_bytes.cmp(&b.file.size_bytes),
                SortField::Date => a.file.uploaded_at.cmp(&b.file.uploaded_at),
            };
            let primary = match order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| a.file.id.cmp(&b.file.id))
        });
        Ok(views)
    }

    pub fn recent_files(&self, user_id: &str, limit: usize) -> Result<Vec<FileView>> {
        let mut views = self.visible_files(
            user_id,
            &FileFilter::default(),
            SortField::Date,
            SortOrder::Desc,
        )?;
        views.truncate(limit);
        Ok(views)
    }

    pub fn filter_options(&self, user_id: &str) -> Result<FilterOptions> {
        let views = self.visible_file_views(user_id)?;

        let mut file_types = BTreeMap::new();
        for view in &views {
            *file_types.entry(view.file_type).or_insert(0) += 1;
        }

        let mut buckets = Vec::new();
        for Visible { bucket, .. } in self.visible(user_id)? {
            let file_count = views
                .iter()
                .filter(|v| v.file.bucket_id == bucket.id)
                .count();
            buckets.push(BucketOption {
                owner_email: self.owner_email(&bucket.owner_id)?,
                id: bucket.id,
                name: bucket.name,
                file_count,
            });
        }

        Ok(FilterOptions {
            file_types,
            size_categories: [SizeCategory::Small, SizeCategory::Medium, SizeCategory::Large],
            date_ranges: [DateRange::Today, DateRange::Week, DateRange::Month, DateRange::Year],
            sort_fields: [SortField::Name, SortField::Size, SortField::Date],
            buckets,
        })
    }

    /// Usage over buckets the caller owns. Files in buckets shared with the
    /// caller are never counted, even ones the caller uploaded.
    pub fn storage_stats(&self, user_id: &str, range: DateRange) -> Result<StorageStats> {
        let now = Utc::now();
        let owned = self.store.list_owned_buckets(user_id)?;
        let shared_bucket_count = self.store.list_user_grants(user_id)?.len();

        let mut total_files = 0;
        let mut total_size = 0;
        let mut file_types: BTreeMap<FileCategory, CategoryCount> = BTreeMap::new();
        for bucket in &owned {
            for file in self.store.list_bucket_files(&bucket.id)? {
                if !range.contains(file.uploaded_at, now) {
                    continue;
                }
                total_files += 1;
                total_size += file.size_bytes;

                let entry = file_types
                    .entry(FileCategory::from_name(&file.name))
                    .or_default();
                entry.count += 1;
                entry.size += file.size_bytes;
            }
        }
        for entry in file_types.values_mut() {
            entry.size_human = human_size(entry.size);
        }

        let limit = self.limits.max_storage_per_user;
        let used = if limit > 0 {
            (total_size as f64 / limit as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        Ok(StorageStats {
            range,
            total_files,
            total_size,
            total_size_human: human_size(total_size),
            bucket_count: owned.len(),
            shared_bucket_count,
            file_types,
            storage_limit: limit,
            storage_limit_human: human_size(i64::try_from(limit).unwrap_or(i64::MAX)),
            storage_used_percentage: used,
        })
    }
}

fn by_name(a: &Bucket, b: &Bucket) -> Ordering {
    a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
}
