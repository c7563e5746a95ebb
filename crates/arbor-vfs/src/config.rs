use std::fs;
use std::path::Path;

use arbor_index::ImportOptions;
use arbor_refs::HEAD;
use arbor_store::disk::DEFAULT_COMPRESSION_LEVEL;
use serde::{Deserialize, Serialize};

use crate::error::{VfsError, VfsResult};

/// Identity recorded on commits when the caller does not supply one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: "Arbor".into(),
            email: "arbor@localhost".into(),
        }
    }
}

/// Settings for views, overlays and repositories.
///
/// Every field has a default, so a `config.toml` only needs the keys it
/// changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Reference that views open and commits advance.
    pub reference: String,
    /// Branch `HEAD` points at in a fresh repository.
    pub default_branch: String,
    /// Extra attempts after a concurrent reference update.
    pub max_ref_update_retries: u32,
    /// When set, a commit fails with `StaleBase` if the reference moved since
    /// the overlay was opened, instead of re-parenting onto the new target.
    pub require_fresh_base: bool,
    /// zstd level for objects a disk repository writes.
    pub compression_level: i32,
    pub author: AuthorConfig,
    pub import: ImportOptions,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            reference: HEAD.into(),
            default_branch: "main".into(),
            max_ref_update_retries: 3,
            require_fresh_base: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            author: AuthorConfig::default(),
            import: ImportOptions::default(),
        }
    }
}

impl VfsConfig {
    pub fn from_toml_str(text: &str) -> VfsResult<Self> {
        toml::from_str(text).map_err(|e| VfsError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> VfsResult<String> {
        toml::to_string_pretty(self).map_err(|e| VfsError::Config(e.to_string()))
    }

    /// Read `path`, or return the defaults if the file does not exist.
    pub fn load(path: &Path) -> VfsResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VfsConfig::default();
        assert_eq!(config.reference, "HEAD");
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.max_ref_update_retries, 3);
        assert!(!config.require_fresh_base);
        assert_eq!(config.compression_level, 3);
        assert!(config.import.respect_ignore_files);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = VfsConfig::from_toml_str(
            r#"
            max_ref_update_retries = 0
            require_fresh_base = true
            compression_level = 19

            [author]
            name = "Grace"

            [import]
            include_hidden = true
            "#,
        )
        .unwrap();
        assert_eq!(config.max_ref_update_retries, 0);
        assert!(config.require_fresh_base);
        assert_eq!(config.compression_level, 19);
        assert_eq!(config.author.name, "Grace");
        assert_eq!(config.author.email, "arbor@localhost");
        assert!(config.import.include_hidden);
        assert_eq!(config.import.exclude, [".arbor", ".git"]);
        assert_eq!(config.reference, "HEAD");
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = VfsConfig::default();
        config.default_branch = "trunk".into();
        let text = config.to_toml_string().unwrap();
        assert_eq!(VfsConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(
            VfsConfig::from_toml_str("max_ref_update_retries = \"many\""),
            Err(VfsError::Config(_))
        ));
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = VfsConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, VfsConfig::default());
    }
}
