use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::extension;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Holds `stashbox.db`, the blob tree and `.admin_token`.
    pub data_dir: PathBuf,
    pub limits: Limits,
}

impl ServerConfig {
    /// Reads a TOML config file. Missing keys fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: ServerConfig =
            toml::from_str(&content).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;
        config.limits.validate()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("stashbox.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            limits: Limits::default(),
        }
    }
}

/// Upload and quota limits enforced by the file manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_file_size: u64,
    /// Reported against owned-bucket usage in storage stats.
    pub max_storage_per_user: u64,
    /// Extensions (with leading dot, lowercase) rejected at upload.
    pub blocked_extensions: Vec<String>,
}

impl Limits {
    #[must_use]
    pub fn is_blocked(&self, file_name: &str) -> bool {
        let Some(ext) = extension(file_name) else {
            return false;
        };
        self.blocked_extensions
            .iter()
            .any(|blocked| blocked.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }

    fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(Error::Config("max_file_size must be positive".into()));
        }
        if self.max_storage_per_user < self.max_file_size {
            return Err(Error::Config(
                "max_storage_per_user must be at least max_file_size".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: 100 * MIB,
            max_storage_per_user: 5 * 1024 * MIB,
            blocked_extensions: [
                ".exe", ".sh", ".bat", ".cmd", ".msi", ".dll", ".scr", ".pif", ".vb", ".vbs",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.db_path(), PathBuf::from("./data/stashbox.db"));
        assert_eq!(config.limits.max_file_size, 100 * MIB);
        assert_eq!(config.limits.blocked_extensions.len(), 10);
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stashbox.toml");
        std::fs::write(
            &path,
            "port = 9000\n\n[limits]\nmax_file_size = 2048\nblocked_extensions = [\".iso\"]\n",
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.limits.max_file_size, 2048);
        assert_eq!(config.limits.max_storage_per_user, 5 * 1024 * MIB);
        assert!(config.limits.is_blocked("disk.ISO"));
        assert!(!config.limits.is_blocked("run.exe"));
    }

    #[test]
    fn test_load_rejects_bad_limits() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stashbox.toml");
        std::fs::write(&path, "[limits]\nmax_file_size = 0\n").unwrap();

        assert!(matches!(ServerConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_blocked_extensions() {
        let limits = Limits::default();
        assert!(limits.is_blocked("setup.EXE"));
        assert!(limits.is_blocked("script.sh"));
        assert!(!limits.is_blocked("notes.txt"));
        assert!(!limits.is_blocked("Makefile"));
    }
}
