//! The directory lister: one directory's immediate children, augmented with
//! metadata and VCS status, filtered and ordered for the browser UI.

use crate::vcs::{self, StatusSets};
use glob::Pattern;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Controls for filtering and ordering a listing.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Glob patterns; matching entry names are dropped.
    pub ignore_pattern: Vec<String>,
    /// Sort directories before files.
    pub dirs_first: bool,
    /// Drop dotfile entries.
    pub hide_hidden: bool,
}

/// One child of the listed directory.
#[derive(Debug, Serialize)]
pub struct DirEntryData {
    pub name: String,
    /// The directory the entry lives in, as supplied by the client.
    pub dir: String,
    pub fullpath: String,
    /// `"file"` or `"dir"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub size: u64,
    /// Seconds since the epoch; zero when the stat call failed.
    pub modified: u64,
    pub created: u64,
    /// Raw change-type code from the VCS, when known.
    pub changetype: Option<String>,
    /// `false` without a repository, otherwise `"staged"`, `"unstaged"` or
    /// `true` for a clean tracked file.
    pub gitstatus: Value,
    /// `"tracked"` or `"untracked"`.
    pub gittracked: &'static str,
}

/// The full listing payload for `/api/listdir`.
#[derive(Debug, Serialize, Default)]
pub struct Listing {
    pub content: Vec<DirEntryData>,
    pub abspath: String,
    pub parent: String,
    pub branches: Vec<String>,
    pub activebranch: Option<String>,
    pub dirty: bool,
    pub error: Option<String>,
}

impl Listing {
    /// An empty, error-flagged listing. The lister never propagates a
    /// failure as anything else.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Enumerates the immediate children of `path`.
///
/// Stat failures zero-fill the size/timestamp fields rather than failing
/// the listing; a missing repository (or any VCS error upstream of the
/// supplied status sets) simply leaves entries untagged.
pub fn list_directory(
    path: &Path,
    repo: Option<&git2::Repository>,
    options: &ListOptions,
) -> Listing {
    if !path.is_dir() {
        return Listing::error(format!("Not a directory: {}", path.display()));
    }

    let status = repo.map(|repo| vcs::collect_status(repo).unwrap_or_default());
    let summary = repo.map(vcs::summarize).unwrap_or_default();

    let names = match sorted_entry_names(path, options) {
        Ok(names) => names,
        Err(err) => return Listing::error(err.to_string()),
    };

    let patterns: Vec<Pattern> = options
        .ignore_pattern
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();

    let mut content = Vec::new();
    for name in names {
        if patterns.iter().any(|pattern| pattern.matches(&name)) {
            continue;
        }
        content.push(build_entry(path, &name, status.as_ref()));
    }

    let abspath = absolute_display(path);
    let parent = Path::new(&abspath)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| abspath.clone());

    Listing {
        content,
        abspath,
        parent,
        branches: summary.branches,
        activebranch: summary.active_branch,
        dirty: summary.dirty,
        error: None,
    }
}

fn build_entry(dir: &Path, name: &str, status: Option<&StatusSets>) -> DirEntryData {
    let fullpath = absolute_display(&dir.join(name));
    let full = PathBuf::from(&fullpath);
    let kind = if full.is_dir() { "dir" } else { "file" };

    let (size, modified, created) = match fs::metadata(&full) {
        Ok(meta) => (
            meta.len(),
            meta.modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
            meta.created()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
        ),
        Err(_) => (0, 0, 0),
    };

    let mut gitstatus = Value::Bool(status.is_some());
    let mut gittracked = "tracked";
    let mut changetype = None;
    if let Some(status) = status {
        if status.untracked.contains(&full) {
            gittracked = "untracked";
        }
        if let Some(change) = status.unstaged.get(&full) {
            gitstatus = Value::String("unstaged".to_string());
            changetype = Some(change.to_string());
        } else if let Some(change) = status.staged.get(&full) {
            gitstatus = Value::String("staged".to_string());
            changetype = Some(change.to_string());
        }
    }

    DirEntryData {
        name: name.to_string(),
        dir: dir.to_string_lossy().to_string(),
        fullpath,
        kind,
        size,
        modified,
        created,
        changetype,
        gitstatus,
        gittracked,
    }
}

/// Names of the immediate children, case-insensitively sorted, optionally
/// with directories first and dotfiles dropped.
fn sorted_entry_names(path: &Path, options: &ListOptions) -> std::io::Result<Vec<String>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if options.hide_hidden && name.starts_with('.') {
            continue;
        }
        if entry.path().is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    if options.dirs_first {
        dirs.sort_by_key(|n| n.to_lowercase());
        files.sort_by_key(|n| n.to_lowercase());
        dirs.append(&mut files);
        Ok(dirs)
    } else {
        dirs.append(&mut files);
        dirs.sort_by_key(|n| n.to_lowercase());
        Ok(dirs)
    }
}

fn absolute_display(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}
