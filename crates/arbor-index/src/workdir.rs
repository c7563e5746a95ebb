//! Importing a live directory into the staging index.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path};

use arbor_store::EntryMode;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{IndexError, IndexResult};
use crate::index::StagingIndex;

/// Per-directory ignore file honored in addition to `.gitignore`.
pub const IGNORE_FILE_NAME: &str = ".arborignore";

/// Controls which files [`import_directory`] picks up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Include dot-files and dot-directories.
    pub include_hidden: bool,
    /// Honor `.gitignore`, `.ignore` and `.arborignore` files.
    pub respect_ignore_files: bool,
    /// Entry names skipped at any depth.
    pub exclude: Vec<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            include_hidden: false,
            respect_ignore_files: true,
            exclude: vec![".arbor".into(), ".git".into()],
        }
    }
}

/// What an import did to the index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files: usize,
    pub symlinks: usize,
    pub bytes: u64,
    /// Entries dropped because they no longer exist on disk.
    pub removed: usize,
}

/// Make `index` mirror the files under `root`.
///
/// Every regular file and symlink is stored as a blob and staged under its
/// slash-separated path relative to `root`. Symlinks are not followed; their
/// target path is the blob content. Each entry records the file's own
/// modification time. Index entries with no file on disk are removed. Empty
/// directories are not represented.
pub fn import_directory(
    index: &mut StagingIndex,
    root: &Path,
    options: &ImportOptions,
) -> IndexResult<ImportSummary> {
    let exclude: HashSet<String> = options.exclude.iter().cloned().collect();
    let mut walker = WalkBuilder::new(root);
    walker
        .hidden(!options.include_hidden)
        .git_ignore(options.respect_ignore_files)
        .git_exclude(options.respect_ignore_files)
        .git_global(false)
        .ignore(options.respect_ignore_files)
        .parents(false)
        .require_git(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            entry.depth() == 0 || !exclude.contains(entry.file_name().to_string_lossy().as_ref())
        });
    if options.respect_ignore_files {
        walker.add_custom_ignore_filename(IGNORE_FILE_NAME);
    }

    let mut summary = ImportSummary::default();
    let mut seen = HashSet::new();
    for result in walker.build() {
        let entry = result.map_err(|e| IndexError::Walk(e.to_string()))?;
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            continue;
        }
        let path = relative_path(root, entry.path())?;

        let meta = fs::symlink_metadata(entry.path())?;
        let (content, mode) = if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            summary.symlinks += 1;
            (target.to_string_lossy().into_owned().into_bytes(), EntryMode::Symlink)
        } else {
            let content = fs::read(entry.path())?;
            summary.files += 1;
            (content, file_mode(&meta))
        };
        summary.bytes += content.len() as u64;
        index.stage_file_at(&path, &content, mode, meta.modified()?)?;
        debug!(path = %path, %mode, size = content.len(), "imported");
        seen.insert(path);
    }

    summary.removed = index.retain(|e| seen.contains(&e.path));
    info!(
        root = %root.display(),
        files = summary.files,
        symlinks = summary.symlinks,
        removed = summary.removed,
        "directory imported"
    );
    Ok(summary)
}

fn relative_path(root: &Path, path: &Path) -> IndexResult<String> {
    let invalid = |reason: &str| IndexError::InvalidPath {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };
    let rel = path
        .strip_prefix(root)
        .map_err(|_| invalid("outside the import root"))?;
    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(name) => {
                segments.push(name.to_str().ok_or_else(|| invalid("not valid UTF-8"))?);
            }
            _ => return Err(invalid("unexpected path component")),
        }
    }
    Ok(segments.join("/"))
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> EntryMode {
    use std::os::unix::fs::PermissionsExt;
    EntryMode::from_permissions(meta.permissions().mode())
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> EntryMode {
    EntryMode::Regular
}
