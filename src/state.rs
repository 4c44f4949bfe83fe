// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::Path;

use crate::episode::is_partial_filename;
use crate::error::StateError;

/// Make sure a feed's base path exists and is a directory
pub fn prepare_base_path(base_path: &Path) -> Result<(), StateError> {
    if !base_path.exists() {
        return std::fs::create_dir_all(base_path).map_err(|e| {
            StateError::CreateDirectoryFailed {
                path: base_path.to_path_buf(),
                source: e,
            }
        });
    }

    if !base_path.is_dir() {
        return Err(StateError::NotADirectory(base_path.to_path_buf()));
    }

    Ok(())
}

/// Episodes already present in a base path, identified by filename stem
///
/// Only the name without extension counts; the content and the extension
/// of the existing file are never looked at.
#[derive(Debug, Clone, Default)]
pub struct ExistingEpisodes {
    stems: HashSet<String>,
    /// Number of partial files that were cleaned up during scan
    pub partial_files_cleaned: usize,
}

impl ExistingEpisodes {
    pub fn contains(&self, stem: &str) -> bool {
        self.stems.contains(stem)
    }

    /// Record a stem that has just been written
    pub fn insert(&mut self, stem: impl Into<String>) {
        self.stems.insert(stem.into());
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

/// Scan the immediate entries of a base path for existing episode files
///
/// Directories are ignored. Leftover temporary files from interrupted
/// downloads are deleted and do not count as present; other files ending
/// in `.partial` are treated like any episode file.
pub fn scan_base_path(base_path: &Path) -> Result<ExistingEpisodes, StateError> {
    let mut existing = ExistingEpisodes::default();

    let entries = std::fs::read_dir(base_path).map_err(|e| StateError::ReadDirectoryFailed {
        path: base_path.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| StateError::ReadDirectoryFailed {
            path: base_path.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().into_owned();
        if is_partial_filename(&filename) {
            if std::fs::remove_file(&path).is_ok() {
                existing.partial_files_cleaned += 1;
            }
            continue;
        }

        if let Some(stem) = path.file_stem() {
            existing.insert(stem.to_string_lossy().into_owned());
        }
    }

    Ok(existing)
}
