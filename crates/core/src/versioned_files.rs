//! Versioned record files with Git history.
//!
//! Every resource directory is a local Git repository (`git2`/libgit2). Only the record
//! (`resource.yaml`) and `.gitignore` are tracked; payload blobs and bag archives are
//! ignored. This module centralises the Git plumbing so every service commits the same way:
//!
//! - **Atomic multi-file writes**: files are written and committed together, and restored
//!   if the commit fails.
//! - **Structured commit messages**: `<domain>:<action>: <summary>` followed by
//!   `Author-*` trailers and any extra trailers, sorted.
//! - **Readable history**: [`VersionedFileService::history`] walks the log for clients.
//!
//! ## Branch Policy
//!
//! All resource repositories use `refs/heads/main`.

use crate::author::CommitAuthor;
use crate::{ResourceError, ResourceResult};
use chrono::{DateTime, Utc};
use hsr_types::NonEmptyText;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

const MAIN_REF: &str = "refs/heads/main";

/// Controlled vocabulary for commit message domains.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) enum HsrCommitDomain {
    /// The record as a whole (creation, bulk updates, deletion).
    Resource,
    /// Logical files.
    Files,
    /// Science metadata (title, keywords, Dublin Core).
    Metadata,
    /// Generated bags.
    Bags,
    /// Publication and obsoletion.
    Publication,
}

impl HsrCommitDomain {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Files => "files",
            Self::Metadata => "metadata",
            Self::Bags => "bags",
            Self::Publication => "publication",
        }
    }
}

impl fmt::Display for HsrCommitDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controlled vocabulary for commit message actions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) enum HsrCommitAction {
    Create,
    Update,
    Delete,
    Publish,
    Obsolete,
}

impl HsrCommitAction {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Publish => "publish",
            Self::Obsolete => "obsolete",
        }
    }
}

impl fmt::Display for HsrCommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `Key: Value` trailer line.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct HsrCommitTrailer {
    key: String,
    value: String,
}

impl HsrCommitTrailer {
    pub(crate) fn new(key: impl Into<String>, value: impl Into<String>) -> ResourceResult<Self> {
        let key = key.into().trim().to_string();
        let value = value.into().trim().to_string();

        if key.is_empty()
            || key.contains(['\n', '\r'])
            || key.contains(':')
            || value.is_empty()
            || value.contains(['\n', '\r'])
        {
            return Err(ResourceError::InvalidInput(
                "commit trailer key/value must be non-empty and single-line (key cannot contain ':')".into(),
            ));
        }

        Ok(Self { key, value })
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn value(&self) -> &str {
        &self.value
    }
}

/// A structured commit message.
///
/// Rendering:
///
/// - Subject line: `<domain>:<action>: <summary>`
/// - Blank line, then `Author-Name` and `Author-Email`, then other trailers sorted by key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct HsrCommitMessage {
    domain: HsrCommitDomain,
    action: HsrCommitAction,
    summary: NonEmptyText,
    trailers: Vec<HsrCommitTrailer>,
}

impl HsrCommitMessage {
    pub(crate) fn new(
        domain: HsrCommitDomain,
        action: HsrCommitAction,
        summary: impl AsRef<str>,
    ) -> ResourceResult<Self> {
        let summary_str = summary.as_ref().trim();
        if summary_str.contains(['\n', '\r']) {
            return Err(ResourceError::InvalidInput(
                "commit summary must be single-line".into(),
            ));
        }
        let summary = NonEmptyText::new(summary_str)
            .map_err(|_| ResourceError::InvalidInput("commit summary must be non-empty".into()))?;

        Ok(Self {
            domain,
            action,
            summary,
            trailers: Vec::new(),
        })
    }

    /// Adds a trailer. `Author-*` keys are reserved for [`render_with_author`](Self::render_with_author).
    pub(crate) fn with_trailer(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> ResourceResult<Self> {
        let key_str = key.into();
        if key_str.trim_start().starts_with("Author-") {
            return Err(ResourceError::InvalidInput(
                "Author-* commit trailers are reserved".into(),
            ));
        }
        self.trailers.push(HsrCommitTrailer::new(key_str, value.into())?);
        Ok(self)
    }

    #[cfg(test)]
    pub(crate) fn trailers(&self) -> &[HsrCommitTrailer] {
        &self.trailers
    }

    pub(crate) fn render_with_author(&self, author: &CommitAuthor) -> ResourceResult<String> {
        let name = author.name.trim();
        let email = author.email.trim();
        if name.is_empty() || email.is_empty() || name.contains(['\n', '\r']) || email.contains(['\n', '\r']) {
            return Err(ResourceError::InvalidInput(
                "commit author name and email must be non-empty single lines".into(),
            ));
        }

        let mut rendered = format!("{}:{}: {}", self.domain, self.action, self.summary.as_str());

        let mut other = self.trailers.clone();
        other.sort_by(|a, b| (a.key(), a.value()).cmp(&(b.key(), b.value())));

        rendered.push_str("\n\n");
        rendered.push_str("Author-Name: ");
        rendered.push_str(name);
        rendered.push('\n');
        rendered.push_str("Author-Email: ");
        rendered.push_str(email);

        for trailer in other {
            rendered.push('\n');
            rendered.push_str(trailer.key());
            rendered.push_str(": ");
            rendered.push_str(trailer.value());
        }

        Ok(rendered)
    }
}

/// A file to be written and committed.
#[derive(Debug, Clone)]
pub struct FileToWrite<'a> {
    /// Path relative to the repository working directory.
    pub relative_path: &'a Path,
    pub content: &'a str,
    /// Previous content, restored on rollback. `None` if the file is new.
    pub old_content: Option<&'a str>,
}

/// One entry of a record's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub id: String,
    /// The subject line (`<domain>:<action>: <summary>`).
    pub summary: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub time: DateTime<Utc>,
}

/// Git operations on a repository rooted at `workdir`.
pub struct VersionedFileService {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl VersionedFileService {
    /// Initialise a new repository at `workdir`.
    pub(crate) fn init(workdir: &Path) -> ResourceResult<Self> {
        let repo = git2::Repository::init(workdir).map_err(ResourceError::GitInit)?;
        // git2 may canonicalise the workdir; use its view so path stripping is consistent.
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                ResourceError::GitInit(git2::Error::from_str("repository has no working directory"))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    /// Open the repository at exactly `workdir`, without searching parent directories.
    pub(crate) fn open(workdir: &Path) -> ResourceResult<Self> {
        let repo = git2::Repository::open_ext(
            workdir,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
        .map_err(ResourceError::GitOpen)?;
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                ResourceError::GitOpen(git2::Error::from_str("repository has no working directory"))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    fn ensure_main_head(&self) -> ResourceResult<()> {
        self.repo
            .set_head(MAIN_REF)
            .map_err(ResourceError::GitSetHead)?;
        Ok(())
    }

    /// Commit only the given workdir-relative paths. Paths containing `..` are rejected.
    pub(crate) fn commit_paths(
        &self,
        author: &CommitAuthor,
        message: &HsrCommitMessage,
        relative_paths: &[PathBuf],
    ) -> ResourceResult<git2::Oid> {
        let rendered = message.render_with_author(author)?;
        self.ensure_main_head()?;
        let mut index = self.repo.index().map_err(ResourceError::GitIndex)?;

        for path in relative_paths {
            let rel = if path.is_absolute() {
                path.strip_prefix(&self.workdir)
                    .map_err(|_| {
                        ResourceError::InvalidInput(
                            "path is outside the repository working directory".into(),
                        )
                    })?
                    .to_path_buf()
            } else {
                path.to_path_buf()
            };

            if rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(ResourceError::InvalidInput(
                    "path must not contain parent directory references (..)".into(),
                ));
            }

            index.add_path(&rel).map_err(ResourceError::GitAdd)?;
        }
        index.write().map_err(ResourceError::GitIndex)?;

        let tree_id = index.write_tree().map_err(ResourceError::GitWriteTree)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(ResourceError::GitFindTree)?;
        let sig = git2::Signature::now(author.name.trim(), author.email.trim())
            .map_err(ResourceError::GitSignature)?;

        let parents = self.resolve_head_parents()?;
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, &rendered, &tree, &parent_refs)
            .map_err(ResourceError::GitCommit)
    }

    /// Write several files and commit them in one commit.
    ///
    /// On failure, files that existed are restored to `old_content`, new files are removed
    /// and directories created here are removed again.
    pub(crate) fn write_and_commit_files(
        repo_path: &Path,
        author: &CommitAuthor,
        msg: &HsrCommitMessage,
        files: &[FileToWrite],
    ) -> ResourceResult<()> {
        let repo = Self::open(repo_path)?;

        let mut created_dirs: Vec<PathBuf> = Vec::new();
        let mut written_files: Vec<(PathBuf, Option<String>)> = Vec::new();

        let result: ResourceResult<()> = (|| {
            let mut dirs_needed = std::collections::HashSet::new();
            for file in files {
                let full_path = repo.workdir.join(file.relative_path);
                if let Some(parent) = full_path.parent() {
                    let mut current = parent;
                    while current != repo.workdir && !current.exists() {
                        dirs_needed.insert(current.to_path_buf());
                        match current.parent() {
                            Some(p) => current = p,
                            None => break,
                        }
                    }
                }
            }

            let mut dirs_to_create: Vec<PathBuf> = dirs_needed.into_iter().collect();
            dirs_to_create.sort_by_key(|p| p.components().count());
            for dir in &dirs_to_create {
                std::fs::create_dir(dir).map_err(ResourceError::FileWrite)?;
                created_dirs.push(dir.clone());
            }

            for file in files {
                let full_path = repo.workdir.join(file.relative_path);
                std::fs::write(&full_path, file.content).map_err(ResourceError::FileWrite)?;
                written_files.push((full_path, file.old_content.map(str::to_string)));
            }

            let paths: Vec<PathBuf> = files
                .iter()
                .map(|f| f.relative_path.to_path_buf())
                .collect();
            repo.commit_paths(author, msg, &paths)?;
            Ok(())
        })();

        if let Err(write_error) = result {
            for (full_path, old_content) in written_files.iter().rev() {
                match old_content {
                    Some(contents) => {
                        let _ = std::fs::write(full_path, contents);
                    }
                    None => {
                        let _ = std::fs::remove_file(full_path);
                    }
                }
            }
            for dir in created_dirs.iter().rev() {
                let _ = std::fs::remove_dir(dir);
            }
            return Err(write_error);
        }
        Ok(())
    }

    /// Initialise a repository in `record_dir`, write and commit the initial files, and
    /// remove `record_dir` entirely if any step fails.
    pub(crate) fn init_and_commit(
        record_dir: &Path,
        author: &CommitAuthor,
        message: &HsrCommitMessage,
        files: &[FileToWrite],
    ) -> ResourceResult<()> {
        let result: ResourceResult<()> = (|| {
            let _repo = Self::init(record_dir)?;
            Self::write_and_commit_files(record_dir, author, message, files)?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(()),
            Err(init_error) => {
                if let Err(cleanup_err) = std::fs::remove_dir_all(record_dir) {
                    return Err(ResourceError::CleanupAfterInitialiseFailed {
                        path: record_dir.to_path_buf(),
                        init_error: Box::new(init_error),
                        cleanup_error: cleanup_err,
                    });
                }
                Err(init_error)
            }
        }
    }

    /// Commits reachable from `HEAD`, newest first.
    pub(crate) fn history(&self) -> ResourceResult<Vec<CommitInfo>> {
        let mut walk = self.repo.revwalk().map_err(ResourceError::GitRevwalk)?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
            .map_err(ResourceError::GitRevwalk)?;
        match walk.push_head() {
            Ok(()) => {}
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(Vec::new()),
            Err(e) => return Err(ResourceError::GitRevwalk(e)),
        }

        let mut entries = Vec::new();
        for oid in walk {
            let oid = oid.map_err(ResourceError::GitRevwalk)?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(ResourceError::GitRevwalk)?;
            let time = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
                .ok_or(ResourceError::InvalidTimestamp)?;
            let author = commit.author();

            entries.push(CommitInfo {
                id: oid.to_string(),
                summary: commit.summary().unwrap_or_default().to_string(),
                message: commit.message().unwrap_or_default().to_string(),
                author_name: author.name().unwrap_or_default().to_string(),
                author_email: author.email().unwrap_or_default().to_string(),
                time,
            });
        }
        Ok(entries)
    }

    fn resolve_head_parents(&self) -> ResourceResult<Vec<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit().map_err(ResourceError::GitPeel)?;
                Ok(vec![commit])
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(vec![]),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(vec![]),
            Err(e) => Err(ResourceError::GitHead(e)),
        }
    }
}
