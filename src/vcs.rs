//! Thin wrapper around `git2` for the optional VCS collaborator.
//!
//! Repositories are discovered per request with a parent-directory search
//! and never pooled. Every operation is independently failable; callers
//! degrade to "no VCS status" or an error envelope instead of failing the
//! surrounding request.

use git2::{
    BranchType, DiffFormat, DiffOptions, Repository, Status, StatusOptions, StatusShow,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Change status of the working tree relative to the index and last commit,
/// keyed by absolute path.
#[derive(Debug, Default)]
pub struct StatusSets {
    pub untracked: HashSet<PathBuf>,
    /// Index vs. HEAD, with a raw change-type letter.
    pub staged: HashMap<PathBuf, char>,
    /// Working tree vs. index.
    pub unstaged: HashMap<PathBuf, char>,
}

/// Branch overview for the listing payload.
#[derive(Debug, Default)]
pub struct RepoSummary {
    pub branches: Vec<String>,
    pub active_branch: Option<String>,
    pub dirty: bool,
}

/// Opens the repository containing `path`, searching parent directories.
pub fn discover(path: &Path) -> Result<Repository, git2::Error> {
    Repository::discover(path)
}

/// Collects untracked/staged/unstaged paths. An empty-history repository
/// reports everything as untracked or staged-new, which is what the UI
/// expects.
pub fn collect_status(repo: &Repository) -> Result<StatusSets, git2::Error> {
    let workdir = repo
        .workdir()
        .ok_or_else(|| git2::Error::from_str("bare repository"))?;
    // Keys are canonical so lookups agree with canonicalized entry paths
    // even when the workdir was reached through a symlink.
    let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
    let mut options = StatusOptions::new();
    options
        .show(StatusShow::IndexAndWorkdir)
        .include_untracked(true)
        .recurse_untracked_dirs(true);

    let mut sets = StatusSets::default();
    for entry in repo.statuses(Some(&mut options))?.iter() {
        let Some(rel) = entry.path() else { continue };
        let full = workdir.join(rel);
        let status = entry.status();
        if status.contains(Status::WT_NEW) {
            sets.untracked.insert(full.clone());
        }
        if let Some(change) = index_change_type(status) {
            sets.staged.insert(full.clone(), change);
        }
        if let Some(change) = worktree_change_type(status) {
            sets.unstaged.insert(full, change);
        }
    }
    Ok(sets)
}

/// Branch list, active branch and dirty flag. Errors (unborn HEAD, empty
/// history) degrade to the default summary.
pub fn summarize(repo: &Repository) -> RepoSummary {
    let mut summary = RepoSummary::default();
    if let Ok(branches) = repo.branches(Some(BranchType::Local)) {
        for branch in branches.flatten() {
            if let Ok(Some(name)) = branch.0.name() {
                summary.branches.push(name.to_string());
            }
        }
    }
    summary.active_branch = repo
        .head()
        .ok()
        .and_then(|head| head.shorthand().map(str::to_string));
    summary.dirty = is_dirty(repo);
    summary
}

fn is_dirty(repo: &Repository) -> bool {
    let mut options = StatusOptions::new();
    options.include_untracked(false);
    repo.statuses(Some(&mut options))
        .map(|statuses| statuses.iter().any(|e| e.status() != Status::CURRENT))
        .unwrap_or(false)
}

/// Stages one file, given by absolute path. Returns the repo-relative path.
pub fn add_path(repo: &Repository, path: &Path) -> Result<String, git2::Error> {
    let rel = relative_to_workdir(repo, path)?;
    let mut index = repo.index()?;
    index.add_path(Path::new(&rel))?;
    index.write()?;
    Ok(rel)
}

/// Patch text for one path, index vs. working tree.
pub fn diff_path(repo: &Repository, path: &Path) -> Result<String, git2::Error> {
    let rel = relative_to_workdir(repo, path)?;
    let mut options = DiffOptions::new();
    options.pathspec(&rel);
    let diff = repo.diff_index_to_workdir(None, Some(&mut options))?;
    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            '+' | '-' | ' ' => patch.push(line.origin()),
            _ => {}
        }
        patch.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(patch)
}

/// Commits the index onto HEAD with the configured signature.
pub fn commit(repo: &Repository, message: &str) -> Result<(), git2::Error> {
    let signature = repo.signature()?;
    let mut index = repo.index()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let parent = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )?;
    Ok(())
}

/// Checks out an existing local branch.
pub fn checkout_branch(repo: &Repository, branch: &str) -> Result<(), git2::Error> {
    let refname = format!("refs/heads/{}", branch);
    let object = repo.revparse_single(&refname)?;
    repo.checkout_tree(&object, None)?;
    repo.set_head(&refname)
}

/// Creates a branch at HEAD and checks it out.
pub fn create_branch(repo: &Repository, branch: &str) -> Result<(), git2::Error> {
    let head = repo.head()?.peel_to_commit()?;
    repo.branch(branch, &head, false)?;
    checkout_branch(repo, branch)
}

/// Initializes a repository at `path`.
pub fn init(path: &Path) -> Result<(), git2::Error> {
    Repository::init(path).map(|_| ())
}

/// Pushes the current branch to `origin`. Returns the remote URL pushed to.
pub fn push_origin(repo: &Repository) -> Result<String, git2::Error> {
    let mut remote = repo.find_remote("origin")?;
    let url = remote
        .url()
        .map(str::to_string)
        .ok_or_else(|| git2::Error::from_str("origin has no URL"))?;
    let head = repo.head()?;
    let refname = head
        .name()
        .ok_or_else(|| git2::Error::from_str("HEAD is not a named reference"))?
        .to_string();
    remote.push(&[&refname], None)?;
    Ok(url)
}

/// Stashes local modifications. Needs a mutable repository handle, so the
/// caller re-discovers the repo for this one operation.
pub fn stash(repo: &mut Repository) -> Result<String, git2::Error> {
    let signature = repo.signature()?;
    let oid = repo.stash_save(&signature, "confdeck stash", None)?;
    Ok(oid.to_string())
}

fn relative_to_workdir(repo: &Repository, path: &Path) -> Result<String, git2::Error> {
    let workdir = repo
        .workdir()
        .ok_or_else(|| git2::Error::from_str("bare repository"))?;
    let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let rel = path
        .strip_prefix(&workdir)
        .map_err(|_| git2::Error::from_str("path is outside the repository"))?;
    Ok(rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
}

fn index_change_type(status: Status) -> Option<char> {
    if status.contains(Status::INDEX_NEW) {
        Some('A')
    } else if status.contains(Status::INDEX_MODIFIED) {
        Some('M')
    } else if status.contains(Status::INDEX_DELETED) {
        Some('D')
    } else if status.contains(Status::INDEX_RENAMED) {
        Some('R')
    } else if status.contains(Status::INDEX_TYPECHANGE) {
        Some('T')
    } else {
        None
    }
}

fn worktree_change_type(status: Status) -> Option<char> {
    if status.contains(Status::WT_MODIFIED) {
        Some('M')
    } else if status.contains(Status::WT_DELETED) {
        Some('D')
    } else if status.contains(Status::WT_RENAMED) {
        Some('R')
    } else if status.contains(Status::WT_TYPECHANGE) {
        Some('T')
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "tester").unwrap();
        config.set_str("user.email", "tester@example.org").unwrap();
        repo
    }

    #[test]
    fn test_untracked_then_staged_then_committed() {
        let dir = tempdir().unwrap();
        let repo = init_repo(dir.path());
        let file = dir.path().join("configuration.yaml");
        fs::write(&file, "a: 1\n").unwrap();

        let status = collect_status(&repo).unwrap();
        assert!(status.untracked.contains(&file.canonicalize().unwrap()));

        add_path(&repo, &file).unwrap();
        let status = collect_status(&repo).unwrap();
        assert_eq!(status.staged.values().next(), Some(&'A'));

        commit(&repo, "initial").unwrap();
        let status = collect_status(&repo).unwrap();
        assert!(status.staged.is_empty());
        assert!(status.unstaged.is_empty());
    }

    #[test]
    fn test_unstaged_modification_detected() {
        let dir = tempdir().unwrap();
        let repo = init_repo(dir.path());
        let file = dir.path().join("automations.yaml");
        fs::write(&file, "one\n").unwrap();
        add_path(&repo, &file).unwrap();
        commit(&repo, "initial").unwrap();

        fs::write(&file, "two\n").unwrap();
        let status = collect_status(&repo).unwrap();
        assert_eq!(status.unstaged.values().next(), Some(&'M'));
        assert!(summarize(&repo).dirty);
    }

    #[test]
    fn test_summary_lists_branches() {
        let dir = tempdir().unwrap();
        let repo = init_repo(dir.path());
        let file = dir.path().join("scripts.yaml");
        fs::write(&file, "x\n").unwrap();
        add_path(&repo, &file).unwrap();
        commit(&repo, "initial").unwrap();
        create_branch(&repo, "testing").unwrap();

        let summary = summarize(&repo);
        assert!(summary.branches.contains(&"testing".to_string()));
        assert_eq!(summary.active_branch.as_deref(), Some("testing"));
    }

    #[test]
    fn test_diff_contains_changed_line() {
        let dir = tempdir().unwrap();
        let repo = init_repo(dir.path());
        let file = dir.path().join("groups.yaml");
        fs::write(&file, "old\n").unwrap();
        add_path(&repo, &file).unwrap();
        commit(&repo, "initial").unwrap();

        fs::write(&file, "new\n").unwrap();
        let patch = diff_path(&repo, &file).unwrap();
        assert!(patch.contains("-old"));
        assert!(patch.contains("+new"));
    }

    #[test]
    fn test_checkout_switches_branch() {
        let dir = tempdir().unwrap();
        let repo = init_repo(dir.path());
        let file = dir.path().join("a.yaml");
        fs::write(&file, "x\n").unwrap();
        add_path(&repo, &file).unwrap();
        commit(&repo, "initial").unwrap();
        let original = summarize(&repo).active_branch.unwrap();
        create_branch(&repo, "feature").unwrap();
        checkout_branch(&repo, &original).unwrap();
        assert_eq!(summarize(&repo).active_branch.as_deref(), Some(original.as_str()));
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let sub = dir.path().join("packages");
        fs::create_dir(&sub).unwrap();
        assert!(discover(&sub).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_status_keys_are_canonical_through_symlinked_workdir() {
        let real = tempdir().unwrap();
        let holder = tempdir().unwrap();
        let link = holder.path().join("link");
        std::os::unix::fs::symlink(real.path(), &link).unwrap();

        let repo = init_repo(&link);
        fs::write(link.join("a.yaml"), "x\n").unwrap();

        let status = collect_status(&repo).unwrap();
        let canonical = real.path().canonicalize().unwrap().join("a.yaml");
        assert!(status.untracked.contains(&canonical));

        // Staging through the symlinked path also resolves.
        add_path(&repo, &link.join("a.yaml")).unwrap();
        let status = collect_status(&repo).unwrap();
        assert_eq!(status.staged.get(&canonical), Some(&'A'));
    }

    #[test]
    fn test_push_without_remote_fails_cleanly() {
        let dir = tempdir().unwrap();
        let repo = init_repo(dir.path());
        assert!(push_origin(&repo).is_err());
    }
}
