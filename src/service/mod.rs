//! Bucket, file, sharing and search operations.
//!
//! [`Service`] is the single entry point used by the HTTP layer. Every
//! operation resolves the caller's access through [`authz::authorize`]
//! before touching metadata or blobs.

pub mod authz;
mod buckets;
mod files;
mod search;
mod sharing;
pub mod validation;

use std::sync::Arc;

pub use authz::{Decision, DenyReason, authorize, effective_level};
pub use files::Download;
pub use search::{
    BucketOption, BucketSummary, CategoryCount, DateRange, FileFilter, FileView, FilterOptions, SortField,
    SortOrder, StorageStats, human_size,
};
pub use sharing::{GrantView, PermissionSummary, SharedBucket};

use crate::blob::BlobStore;
use crate::config::Limits;
use crate::error::Result;
use crate::store::Store;
use crate::types::{Access, Action, Bucket};

pub struct Service {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    limits: Limits,
}

impl Service {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>, limits: Limits) -> Self {
        Self {
            store,
            blobs,
            limits,
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Authorizes `action`, turning a denial into `NotFound` or `Forbidden`.
    fn authorize(&self, user_id: &str, bucket_id: &str, action: Action) -> Result<(Bucket, Access)> {
        authz::authorize(self.store(), user_id, bucket_id, action)?.into_result()
    }
}
