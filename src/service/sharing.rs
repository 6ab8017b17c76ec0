use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::Service;
use crate::error::{Error, Result};
use crate::types::{Action, PermissionGrant, PermissionLevel};

/// A grant on one of the caller's buckets, with the grantee resolved.
#[derive(Debug, Clone, Serialize)]
pub struct GrantView {
    pub id: String,
    pub bucket_id: String,
    pub grantee_id: String,
    pub grantee_email: Option<String>,
    pub permission_level: PermissionLevel,
    pub permission_display: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bucket someone else shared with the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SharedBucket {
    pub grant_id: String,
    pub bucket_id: String,
    pub bucket_name: String,
    pub owner_id: String,
    pub owner_email: Option<String>,
    pub permission_level: PermissionLevel,
    pub permission_display: &'static str,
    pub file_count: i64,
    pub total_size: i64,
    pub shared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSummary {
    pub own_buckets: usize,
    pub shared_with_me: usize,
    pub shared_by_me: usize,
    pub total_accessible: usize,
}

impl Service {
    /// Grants `grantee_email` access to the bucket, or changes the level of
    /// an existing grant. Returns the stored grant and whether it is new.
    pub fn share_bucket(
        &self,
        owner_id: &str,
        bucket_id: &str,
        grantee_email: &str,
        level: PermissionLevel,
    ) -> Result<(PermissionGrant, bool)> {
        let (bucket, _) = self.authorize(owner_id, bucket_id, Action::ManageSharing)?;

        let grantee = self
            .store
            .get_user_by_email(grantee_email)?
            .ok_or(Error::UnknownUser)?;
        if grantee.id == bucket.owner_id {
            return Err(Error::SelfShareRejected);
        }

        let now = Utc::now();
        let (grant, created) = self.store.upsert_grant(&PermissionGrant {
            id: Uuid::new_v4().to_string(),
            bucket_id: bucket.id.clone(),
            grantee_id: grantee.id.clone(),
            level,
            created_at: now,
            updated_at: now,
        })?;

        tracing::info!(
            "Shared bucket {} with {} at {} ({})",
            bucket.id,
            grantee.email,
            level,
            if created { "new" } else { "updated" }
        );
        Ok((grant, created))
    }

    /// Loads a grant and checks the caller may manage its bucket.
    fn managed_grant(&self, user_id: &str, grant_id: &str) -> Result<PermissionGrant> {
        let grant = self.store.get_grant(grant_id)?.ok_or(Error::NotFound)?;
        self.authorize(user_id, &grant.bucket_id, Action::ManageSharing)?;
        Ok(grant)
    }

    pub fn update_grant(
        &self,
        user_id: &str,
        grant_id: &str,
        level: PermissionLevel,
    ) -> Result<PermissionGrant> {
        let grant = self.managed_grant(user_id, grant_id)?;
        self.store.update_grant_level(&grant.id, level)?;

        tracing::info!("Changed grant {} from {} to {}", grant.id, grant.level, level);
        self.store.get_grant(&grant.id)?.ok_or(Error::NotFound)
    }

    pub fn revoke_grant(&self, user_id: &str, grant_id: &str) -> Result<PermissionGrant> {
        let grant = self.managed_grant(user_id, grant_id)?;
        if !self.store.delete_grant(&grant.id)? {
            return Err(Error::NotFound);
        }

        tracing::info!(
            "Revoked grant {} on bucket {} for {}",
            grant.id,
            grant.bucket_id,
            grant.grantee_id
        );
        Ok(grant)
    }

    pub fn list_grants(&self, user_id: &str, bucket_id: &str) -> Result<Vec<GrantView>> {
        let (bucket, _) = self.authorize(user_id, bucket_id, Action::ManageSharing)?;

        self.store
            .list_bucket_grants(&bucket.id)?
            .into_iter()
            .map(|grant| {
                let grantee_email = self.store.get_user(&grant.grantee_id)?.map(|u| u.email);
                Ok::<_, Error>(GrantView {
                    id: grant.id,
                    bucket_id: grant.bucket_id,
                    grantee_id: grant.grantee_id,
                    grantee_email,
                    permission_level: grant.level,
                    permission_display: grant.level.display_name(),
                    created_at: grant.created_at,
                    updated_at: grant.updated_at,
                })
            })
            .collect()
    }

    /// Buckets shared with `user_id`, sorted by bucket name.
    pub fn list_shared_with_me(&self, user_id: &str) -> Result<Vec<SharedBucket>> {
        let mut shared = Vec::new();
        for grant in self.store.list_user_grants(user_id)? {
            let Some(bucket) = self.store.get_bucket(&grant.bucket_id)? else {
                continue;
            };
            let owner_email = self.store.get_user(&bucket.owner_id)?.map(|u| u.email);
            let usage = self.store.bucket_usage(&bucket.id)?;

            shared.push(SharedBucket {
                grant_id: grant.id,
                bucket_id: bucket.id,
                bucket_name: bucket.name,
                owner_id: bucket.owner_id,
                owner_email,
                permission_level: grant.level,
                permission_display: grant.level.display_name(),
                file_count: usage.file_count,
                total_size: usage.total_size,
                shared_at: grant.created_at,
            });
        }

        shared.sort_by(|a, b| {
            a.bucket_name
                .cmp(&b.bucket_name)
                .then_with(|| a.bucket_id.cmp(&b.bucket_id))
        });
        Ok(shared)
    }

    pub fn permission_summary(&self, user_id: &str) -> Result<PermissionSummary> {
        let owned = self.store.list_owned_buckets(user_id)?;
        let shared_with_me = self.store.list_user_grants(user_id)?.len();

        let mut shared_by_me = 0;
        for bucket in &owned {
            if !self.store.list_bucket_grants(&bucket.id)?.is_empty() {
                shared_by_me += 1;
            }
        }

        Ok(PermissionSummary {
            own_buckets: owned.len(),
            shared_with_me,
            shared_by_me,
            total_accessible: owned.len() + shared_with_me,
        })
    }
}
