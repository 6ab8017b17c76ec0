use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Tier granted to a non-owner on a bucket. Ordered: each tier implies
/// every capability of the tiers below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    View,
    Upload,
    Full,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 3] = [Self::View, Self::Upload, Self::Full];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Upload => "upload",
            Self::Full => "full",
        }
    }

    /// Human-readable label shown next to shared buckets.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::View => "View Only",
            Self::Upload => "Upload Access",
            Self::Full => "Full Access",
        }
    }

    pub fn parse(s: &str) -> Option<PermissionLevel> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Some(Self::View),
            "upload" => Some(Self::Upload),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidPermissionLevel(s.to_string()))
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every operation the authorization engine can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Download,
    Upload,
    DeleteFile,
    RenameFile,
    RenameBucket,
    DeleteBucket,
    ManageSharing,
}

impl Action {
    /// Minimum grant tier that allows this action, or `None` when only the
    /// bucket owner may perform it.
    #[must_use]
    pub const fn required_level(self) -> Option<PermissionLevel> {
        match self {
            Self::List | Self::Download => Some(PermissionLevel::View),
            Self::Upload => Some(PermissionLevel::Upload),
            Self::DeleteFile | Self::RenameFile => Some(PermissionLevel::Full),
            Self::RenameBucket | Self::DeleteBucket | Self::ManageSharing => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Download => "download",
            Self::Upload => "upload",
            Self::DeleteFile => "delete_file",
            Self::RenameFile => "rename_file",
            Self::RenameBucket => "rename_bucket",
            Self::DeleteBucket => "delete_bucket",
            Self::ManageSharing => "manage_sharing",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a user relates to a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No ownership and no grant: the bucket is invisible.
    None,
    Shared(PermissionLevel),
    Owner,
}

impl Access {
    /// Effective tier; owners count as `full`.
    #[must_use]
    pub const fn level(self) -> Option<PermissionLevel> {
        match self {
            Access::None => None,
            Access::Shared(level) => Some(level),
            Access::Owner => Some(PermissionLevel::Full),
        }
    }

    #[must_use]
    pub const fn is_owner(self) -> bool {
        matches!(self, Access::Owner)
    }

    #[must_use]
    pub const fn is_visible(self) -> bool {
        !matches!(self, Access::None)
    }

    #[must_use]
    pub fn permits(self, action: Action) -> bool {
        match self {
            Access::Owner => true,
            Access::None => false,
            Access::Shared(level) => action.required_level().is_some_and(|req| level >= req),
        }
    }

    /// Value reported as `permission_level` in listings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Access::None => "none",
            Access::Shared(level) => level.as_str(),
            Access::Owner => "owner",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Access::None => "No Access",
            Access::Shared(level) => level.display_name(),
            Access::Owner => "Owner",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVERY_ACTION: [Action; 8] = [
        Action::List,
        Action::Download,
        Action::Upload,
        Action::DeleteFile,
        Action::RenameFile,
        Action::RenameBucket,
        Action::DeleteBucket,
        Action::ManageSharing,
    ];

    fn allowed(access: Access) -> Vec<Action> {
        EVERY_ACTION
            .into_iter()
            .filter(|a| access.permits(*a))
            .collect()
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(PermissionLevel::View < PermissionLevel::Upload);
        assert!(PermissionLevel::Upload < PermissionLevel::Full);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(PermissionLevel::parse("view"), Some(PermissionLevel::View));
        assert_eq!(PermissionLevel::parse(" FULL "), Some(PermissionLevel::Full));
        assert_eq!(PermissionLevel::parse("owner"), None);
        assert!(matches!(
            "admin".parse::<PermissionLevel>(),
            Err(Error::InvalidPermissionLevel(s)) if s == "admin"
        ));
    }

    #[test]
    fn test_view_grants_read_only() {
        assert_eq!(
            allowed(Access::Shared(PermissionLevel::View)),
            vec![Action::List, Action::Download]
        );
    }

    #[test]
    fn test_upload_adds_upload() {
        assert_eq!(
            allowed(Access::Shared(PermissionLevel::Upload)),
            vec![Action::List, Action::Download, Action::Upload]
        );
    }

    #[test]
    fn test_full_never_administers_bucket() {
        let full = Access::Shared(PermissionLevel::Full);
        assert!(full.permits(Action::DeleteFile));
        assert!(full.permits(Action::RenameFile));
        assert!(!full.permits(Action::RenameBucket));
        assert!(!full.permits(Action::DeleteBucket));
        assert!(!full.permits(Action::ManageSharing));
    }

    #[test]
    fn test_owner_and_none() {
        assert_eq!(allowed(Access::Owner).len(), EVERY_ACTION.len());
        assert!(allowed(Access::None).is_empty());
        assert_eq!(Access::Owner.level(), Some(PermissionLevel::Full));
        assert_eq!(Access::None.level(), None);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&PermissionLevel::Upload).unwrap();
        assert_eq!(json, "\"upload\"");
    }
}
