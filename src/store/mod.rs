mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the metadata interface.
///
/// Uniqueness (bucket name per owner, file name per bucket, one grant per
/// bucket and grantee) is enforced atomically by the implementation and
/// reported as `Error::DuplicateName`, never checked-then-written by callers.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    /// Case-insensitive lookup.
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;
    fn has_admin_token(&self) -> Result<bool>;

    // Bucket operations
    fn create_bucket(&self, bucket: &Bucket) -> Result<()>;
    fn get_bucket(&self, id: &str) -> Result<Option<Bucket>>;
    fn get_bucket_by_name(&self, owner_id: &str, name: &str) -> Result<Option<Bucket>>;
    fn list_owned_buckets(&self, owner_id: &str) -> Result<Vec<Bucket>>;
    fn rename_bucket(&self, id: &str, new_name: &str) -> Result<()>;
    /// Deletes the bucket together with its files and grants in one transaction.
    fn delete_bucket(&self, id: &str) -> Result<bool>;
    fn bucket_usage(&self, bucket_id: &str) -> Result<BucketUsage>;

    // File operations
    /// Fails with `NotFound` when the parent bucket no longer exists.
    fn create_file(&self, file: &FileRecord) -> Result<()>;
    fn get_file(&self, id: &str) -> Result<Option<FileRecord>>;
    fn list_bucket_files(&self, bucket_id: &str) -> Result<Vec<FileRecord>>;
    fn rename_file(&self, id: &str, new_name: &str) -> Result<()>;
    fn delete_file(&self, id: &str) -> Result<bool>;

    // Permission grant operations
    /// Inserts or updates the grant for `(bucket_id, grantee_id)` and returns
    /// the stored row with a flag telling whether it was newly created.
    fn upsert_grant(&self, grant: &PermissionGrant) -> Result<(PermissionGrant, bool)>;
    fn get_grant(&self, id: &str) -> Result<Option<PermissionGrant>>;
    fn get_grant_for(&self, bucket_id: &str, grantee_id: &str)
    -> Result<Option<PermissionGrant>>;
    fn update_grant_level(&self, id: &str, level: PermissionLevel) -> Result<()>;
    fn delete_grant(&self, id: &str) -> Result<bool>;
    fn list_bucket_grants(&self, bucket_id: &str) -> Result<Vec<PermissionGrant>>;
    fn list_user_grants(&self, grantee_id: &str) -> Result<Vec<PermissionGrant>>;
}
