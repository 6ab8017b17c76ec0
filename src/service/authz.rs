//! Authorization engine.
//!
//! Every bucket and file operation asks [`authorize`] first. Decisions are
//! computed from the store on each call and never cached, so a revoked grant
//! takes effect on the very next request.

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Access, Action, Bucket};

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The bucket does not exist or the caller has no relationship to it.
    NotFound,
    /// The caller can see the bucket but their tier does not allow the action.
    Forbidden,
}

impl From<DenyReason> for Error {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotFound => Error::NotFound,
            DenyReason::Forbidden => Error::Forbidden,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { bucket: Bucket, access: Access },
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    /// Converts a denial into the matching error.
    pub fn into_result(self) -> Result<(Bucket, Access)> {
        match self {
            Decision::Allow { bucket, access } => Ok((bucket, access)),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

fn access_to(store: &dyn Store, user_id: &str, bucket: &Bucket) -> Result<Access> {
    if bucket.owner_id == user_id {
        return Ok(Access::Owner);
    }
    Ok(store
        .get_grant_for(&bucket.id, user_id)?
        .map_or(Access::None, |grant| Access::Shared(grant.level)))
}

/// Relationship of `user_id` to `bucket_id`. Owners short-circuit to
/// [`Access::Owner`] without consulting grants; missing buckets are
/// [`Access::None`].
pub fn effective_level(store: &dyn Store, user_id: &str, bucket_id: &str) -> Result<Access> {
    match store.get_bucket(bucket_id)? {
        Some(bucket) => access_to(store, user_id, &bucket),
        None => Ok(Access::None),
    }
}

pub fn authorize(
    store: &dyn Store,
    user_id: &str,
    bucket_id: &str,
    action: Action,
) -> Result<Decision> {
    let Some(bucket) = store.get_bucket(bucket_id)? else {
        return Ok(Decision::Deny(DenyReason::NotFound));
    };

    let access = access_to(store, user_id, &bucket)?;
    let decision = if access.permits(action) {
        Decision::Allow { bucket, access }
    } else if access.is_visible() {
        Decision::Deny(DenyReason::Forbidden)
    } else {
        Decision::Deny(DenyReason::NotFound)
    };

    if let Decision::Deny(reason) = &decision {
        tracing::debug!(
            "Denied {} on bucket {} for user {}: {:?}",
            action,
            bucket_id,
            user_id,
            reason
        );
    }

    Ok(decision)
}
