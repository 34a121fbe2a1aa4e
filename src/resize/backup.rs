//! Local copies of originals, laid out to mirror the remote library.

use std::path::PathBuf;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::BackupError;
use crate::config::ResizeConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Written(PathBuf),
    /// The file was already there and overwrite is off; left untouched.
    SkippedExisting(PathBuf),
}

/// Replace characters that are invalid in directory names, then trim
/// surrounding whitespace and dots.
pub fn sanitize_fs(name: &str) -> String {
    let mut safe = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if matches!(c, '\\' | '/' | ':' | '"' | '*' | '?' | '<' | '>' | '|') {
            if !in_run {
                safe.push('_');
            }
            in_run = true;
        } else {
            safe.push(c);
            in_run = false;
        }
    }
    safe.trim().trim_matches('.').to_string()
}

/// Folder of an item relative to the drive root, from a Graph parent path
/// such as `/drives/b!x/root:/Photos/2024`.
fn drive_relative(parent_path: &str) -> &str {
    let path = match parent_path.split_once(":/") {
        Some((_, rest)) => rest,
        None if parent_path.ends_with(':') => "",
        None => parent_path,
    };
    path.trim_start_matches('/')
}

#[derive(Debug, Clone)]
pub struct BackupWriter {
    base: PathBuf,
    start_folder: String,
    preserve_tree: bool,
    overwrite: bool,
}

impl BackupWriter {
    pub fn new(config: &ResizeConfig) -> Self {
        let backup = &config.backup;
        let mut base = backup.root.clone();
        if backup.site_root {
            base.push(sanitize_fs(&config.site));
        }
        if backup.include_library {
            base.push(sanitize_fs(&config.library));
        }
        Self {
            base,
            start_folder: config.start_folder.trim_matches('/').to_string(),
            preserve_tree: backup.preserve_tree,
            overwrite: backup.overwrite,
        }
    }

    /// Folder below the start folder (case-insensitive match), or below the
    /// drive root when the item lies outside it.
    pub fn relative_dir(&self, parent_path: &str) -> String {
        let rel = drive_relative(parent_path);
        if self.start_folder.is_empty() {
            return rel.to_string();
        }
        let start: Vec<&str> = self.start_folder.split('/').filter(|s| !s.is_empty()).collect();
        let segments: Vec<&str> = rel.split('/').collect();
        let under_start = segments.len() >= start.len()
            && start
                .iter()
                .zip(&segments)
                .all(|(s, r)| s.to_lowercase() == r.to_lowercase());
        if under_start {
            return segments[start.len()..].join("/");
        }
        rel.to_string()
    }

    pub fn target_path(&self, parent_path: &str, filename: &str) -> PathBuf {
        let mut path = self.base.clone();
        if self.preserve_tree {
            for component in self.relative_dir(parent_path).split('/') {
                if component.is_empty() || component == "." || component == ".." {
                    continue;
                }
                path.push(component);
            }
        }
        path.push(filename);
        path
    }

    /// Persist `bytes` at the mirrored location, creating directories as
    /// needed. An existing file is only replaced when overwrite is enabled.
    pub async fn write(
        &self,
        bytes: &[u8],
        parent_path: &str,
        filename: &str,
    ) -> Result<BackupOutcome, BackupError> {
        let path = self.target_path(parent_path, filename);
        let fail = |source| BackupError {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(fail)?;
        }

        let mut options = OpenOptions::new();
        options.write(true);
        if self.overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = match options.open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Ok(BackupOutcome::SkippedExisting(path.clone()));
            }
            Err(e) => return Err(fail(e)),
        };
        file.write_all(bytes).await.map_err(fail)?;
        file.flush().await.map_err(fail)?;
        Ok(BackupOutcome::Written(path))
    }
}
