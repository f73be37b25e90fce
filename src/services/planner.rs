//! Turns the configured path list into upload targets.
//!
//! Every local path is resolved against an explicit root and every remote key
//! is that path relative to the root, `/`-separated.

use crate::{
    errors::{PublishError, PublishResult},
    models::target::{PlannedEntry, PublishTarget},
    services::storage_service::ensure_key_safe,
};
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Planner {
    root: PathBuf,
}

impl Planner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify each path in order, expanding directories recursively.
    pub fn plan<P: AsRef<str>>(&self, paths: &[P]) -> PublishResult<Vec<PlannedEntry>> {
        paths
            .iter()
            .map(|path| self.classify(path.as_ref()))
            .collect()
    }

    fn classify(&self, path: &str) -> PublishResult<PlannedEntry> {
        let local = self.root.join(path);
        match std::fs::metadata(&local) {
            Ok(meta) if meta.is_file() => Ok(PlannedEntry::File(PublishTarget {
                key: self.key_for(&local)?,
                local_path: local,
            })),
            Ok(meta) if meta.is_dir() => Ok(PlannedEntry::Directory {
                path: path.to_string(),
                targets: self.walk(&local)?,
            }),
            _ => {
                warn!("Skipping non-file non-directory {}", path);
                Ok(PlannedEntry::Skipped(path.to_string()))
            }
        }
    }

    fn walk(&self, dir: &Path) -> PublishResult<Vec<PublishTarget>> {
        let mut targets = Vec::new();
        for entry_result in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error in walkdir: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            targets.push(PublishTarget {
                key: self.key_for(entry.path())?,
                local_path: entry.into_path(),
            });
        }
        Ok(targets)
    }

    /// Remote key for a root-joined local path.
    fn key_for(&self, local: &Path) -> PublishResult<String> {
        let relative = local
            .strip_prefix(&self.root)
            .map_err(|_| PublishError::InvalidObjectKey(local.display().to_string()))?;
        relative_key(relative)
    }
}

/// `/`-joined key for a root-relative path. `.` segments are dropped; `..`,
/// absolute and non-UTF-8 paths are rejected.
pub fn relative_key(relative: &Path) -> PublishResult<String> {
    let invalid = || PublishError::InvalidObjectKey(relative.display().to_string());

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str().ok_or_else(invalid)?),
            Component::CurDir => {}
            _ => return Err(invalid()),
        }
    }

    let key = segments.join("/");
    ensure_key_safe(&key)?;
    Ok(key)
}
