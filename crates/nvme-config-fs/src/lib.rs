// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for the NVMe information tools.
//!
//! Two layouts are supported: a directory holding one `<key>.json` file per
//! key (the platform config dir by default, e.g. `~/.config/nvme-info`), or a
//! single explicit file that answers for every key (`--config FILE`).

use directories::ProjectDirs;
use nvme_info::{ConfigError, ConfigStore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
enum Layout {
    Directory(PathBuf),
    File(PathBuf),
}

/// Store configs as JSON files on disk.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    layout: Layout,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/nvme-info`).
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "nvme-info")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Ok(Self::at(proj.config_dir()))
    }

    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::Directory(dir.into()),
        }
    }

    /// Create a store backed by one file, used for every key.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::File(path.into()),
        }
    }

    /// Directory or file this store reads from.
    pub fn location(&self) -> &Path {
        match &self.layout {
            Layout::Directory(p) | Layout::File(p) => p,
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ConfigError> {
        match &self.layout {
            Layout::File(path) => Ok(path.clone()),
            Layout::Directory(base) => {
                let valid = !key.is_empty()
                    && key
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
                if !valid {
                    return Err(ConfigError::Other(format!("invalid config key `{key}`")));
                }
                Ok(base.join(format!("{key}.json")))
            }
        }
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(key, path = %path.display(), len = bytes.len(), "loaded config");
                Ok(bytes)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // An explicit file must exist.
                match self.layout {
                    Layout::File(_) => Err(ConfigError::Io(err)),
                    Layout::Directory(_) => Err(ConfigError::NotFound),
                }
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        debug!(key, path = %path.display(), "saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvme_info::config::ANALYSIS_KEY;
    use nvme_info::{AnalysisConfig, ConfigService, DriveRating};

    fn rated() -> AnalysisConfig {
        AnalysisConfig {
            rating: DriveRating {
                tbw_tb: Some(600.0),
                warranty_years: Some(5.0),
                throttle_percent_limit: None,
            },
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn directory_store_round_trips_through_service() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested");
        let service = ConfigService::new(FsConfigStore::at(&root));
        assert_eq!(service.analysis().unwrap(), AnalysisConfig::default());
        service.save(ANALYSIS_KEY, &rated()).unwrap();
        assert!(root.join("analysis.json").is_file());
        assert_eq!(service.analysis().unwrap(), rated());
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::at(dir.path());
        assert!(matches!(store.load_raw("analysis"), Err(ConfigError::NotFound)));
    }

    #[test]
    fn keys_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::at(dir.path());
        for key in ["../x", "a/b", "", "a.b"] {
            assert!(matches!(store.save_raw(key, b"{}"), Err(ConfigError::Other(_))), "{key}");
        }
    }

    #[test]
    fn explicit_file_answers_every_key_and_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.json");
        let store = FsConfigStore::file(&path);
        assert_eq!(store.location(), path.as_path());
        assert!(matches!(store.load_raw(ANALYSIS_KEY), Err(ConfigError::Io(_))));
        fs::write(&path, br#"{"rating": {"tbw_tb": 600.0, "warranty_years": 5.0}}"#).unwrap();
        let service = ConfigService::new(store);
        assert_eq!(service.analysis().unwrap(), rated());
    }

    #[test]
    fn malformed_file_is_a_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{\"rating\": 5}").unwrap();
        let service = ConfigService::new(FsConfigStore::file(path));
        assert!(matches!(service.analysis(), Err(ConfigError::Serde(_))));
    }
}
