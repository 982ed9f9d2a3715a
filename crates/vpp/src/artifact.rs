use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use walkdir::WalkDir;
use crate::error::{Result, VppError};

/// Extension of raw decoded-frame artifacts
pub const ARTIFACT_EXTENSION: &str = "yuv";

/// Directory holding transient output artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the artifact path for a name, creating the store directory on first use
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| VppError::io(&self.root, e))?;
        Ok(self.root.join(format!("{}.{}", name, ARTIFACT_EXTENSION)))
    }

    /// Delete an artifact; a missing file is not an error
    pub fn purge(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("Purged artifact: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VppError::io(path, e)),
        }
    }

    /// List every artifact currently in the store
    pub fn list(&self) -> Vec<PathBuf> {
        if !self.root.exists() {
            return Vec::new();
        }

        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!("Error reading artifact directory entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(ARTIFACT_EXTENSION))
            .collect()
    }

    /// Remove every artifact left behind by earlier runs. Returns how many were removed.
    pub fn purge_all(&self) -> Result<usize> {
        let stale = self.list();
        for path in &stale {
            self.purge(path)?;
        }
        Ok(stale.len())
    }
}
