use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Coarse file type derived from the file name's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Video,
    Audio,
    Archive,
    Code,
    Other,
}

const IMAGE: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico"];
const DOCUMENT: &[&str] = &[
    "pdf", "doc", "docx", "txt", "rtf", "odt", "xls", "xlsx", "ppt", "pptx", "csv",
];
const VIDEO: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "webm", "mkv", "m4v"];
const AUDIO: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "wma", "m4a"];
const ARCHIVE: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2"];
const CODE: &[&str] = &[
    "py", "js", "html", "css", "json", "xml", "sql", "php", "java", "cpp", "c", "h",
];

impl FileCategory {
    pub const ALL: [FileCategory; 7] = [
        Self::Image,
        Self::Document,
        Self::Video,
        Self::Audio,
        Self::Archive,
        Self::Code,
        Self::Other,
    ];

    #[must_use]
    pub fn from_name(name: &str) -> FileCategory {
        let Some(ext) = extension(name) else {
            return Self::Other;
        };
        let ext = ext.as_str();
        [
            (IMAGE, Self::Image),
            (DOCUMENT, Self::Document),
            (VIDEO, Self::Video),
            (AUDIO, Self::Audio),
            (ARCHIVE, Self::Archive),
            (CODE, Self::Code),
        ]
        .into_iter()
        .find(|(exts, _)| exts.contains(&ext))
        .map_or(Self::Other, |(_, category)| category)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Archive => "archive",
            Self::Code => "code",
            Self::Other => "other",
        }
    }

    /// Extensions belonging to this category, without the leading dot.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Image => IMAGE,
            Self::Document => DOCUMENT,
            Self::Video => VIDEO,
            Self::Audio => AUDIO,
            Self::Archive => ARCHIVE,
            Self::Code => CODE,
            Self::Other => &[],
        }
    }
}

impl FromStr for FileCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown file type: {s}")))
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MIB: i64 = 1024 * 1024;

/// Size bucket used by the search filter: small < 1 MiB <= medium < 10 MiB <= large.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
}

impl SizeCategory {
    #[must_use]
    pub const fn of(size_bytes: i64) -> SizeCategory {
        if size_bytes < MIB {
            Self::Small
        } else if size_bytes < 10 * MIB {
            Self::Medium
        } else {
            Self::Large
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl FromStr for SizeCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            _ => Err(Error::InvalidInput(format!("unknown size category: {s}"))),
        }
    }
}

/// Lowercased extension of `name` without the dot, if any.
#[must_use]
pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_name() {
        assert_eq!(FileCategory::from_name("img.PNG"), FileCategory::Image);
        assert_eq!(FileCategory::from_name("report.pdf"), FileCategory::Document);
        assert_eq!(FileCategory::from_name("main.c"), FileCategory::Code);
        assert_eq!(FileCategory::from_name("backup.tar.gz"), FileCategory::Archive);
        assert_eq!(FileCategory::from_name("README"), FileCategory::Other);
        assert_eq!(FileCategory::from_name("blob.xyz"), FileCategory::Other);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Video".parse::<FileCategory>().unwrap(), FileCategory::Video);
        assert!("spreadsheet".parse::<FileCategory>().is_err());
    }

    #[test]
    fn test_size_category_boundaries() {
        assert_eq!(SizeCategory::of(0), SizeCategory::Small);
        assert_eq!(SizeCategory::of(MIB - 1), SizeCategory::Small);
        assert_eq!(SizeCategory::of(MIB), SizeCategory::Medium);
        assert_eq!(SizeCategory::of(10 * MIB), SizeCategory::Large);
    }
}
