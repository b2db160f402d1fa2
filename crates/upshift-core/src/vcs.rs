//! Version-control adapters for the release workflow.
//!
//! Shells out to the backend's command-line tool so the user's configuration
//! (SSH keys, GPG signing, commit hooks) applies unchanged. All adapters take
//! their working directory explicitly rather than relying on the process-wide
//! current directory.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::exec::{self, CommandSet, ExecError, Substitutions};

/// Errors from VCS operations.
#[derive(Error, Debug)]
pub enum VcsError {
    /// The backend's command-line tool is not installed.
    #[error("{tool} is not available on PATH")]
    ToolMissing {
        /// The missing executable name.
        tool: &'static str,
    },

    /// The working directory is not a repository of the expected kind.
    #[error("{path} is not a {kind} repository")]
    NotARepository {
        /// Expected backend.
        kind: VcsKind,
        /// The directory that was checked.
        path: Utf8PathBuf,
    },

    /// Tracked files have uncommitted modifications.
    #[error("the working tree has uncommitted changes: {files}")]
    DirtyWorkingTree {
        /// The offending status entries, comma separated.
        files: String,
    },

    /// An underlying command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Result alias for VCS operations.
pub type VcsResult<T> = Result<T, VcsError>;

/// Supported VCS backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    /// Git.
    Git,
    /// Mercurial.
    #[serde(rename = "hg")]
    #[value(name = "hg")]
    Mercurial,
    /// Bazaar.
    #[serde(rename = "bzr")]
    #[value(name = "bzr")]
    Bazaar,
    /// No-op backend for workflows without VCS integration.
    Fake,
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Mercurial => write!(f, "hg"),
            Self::Bazaar => write!(f, "bzr"),
            Self::Fake => write!(f, "fake"),
        }
    }
}

/// The capability set every backend provides.
pub trait Vcs {
    /// Fail unless the working directory is a clean repository of the
    /// expected kind. Untracked files are tolerated; under `dryrun` a dirty
    /// tree degrades to a warning.
    fn validate(&self, dryrun: bool) -> VcsResult<()>;

    /// Commit all modified tracked files.
    fn commit(&self, message: &str) -> VcsResult<()>;

    /// Create a tag, annotated when the backend supports it.
    fn tag(&self, name: &str, annotation: Option<&str>) -> VcsResult<()>;

    /// Push commits (and tags, where separate) to the configured remote.
    fn push(&self) -> VcsResult<()>;
}

/// Instantiate the adapter for a configured backend.
pub fn from_kind(kind: VcsKind, workdir: &Utf8Path, verbose: bool) -> Box<dyn Vcs> {
    let workdir = workdir.to_path_buf();
    match kind {
        VcsKind::Git => Box::new(Git { workdir, verbose }),
        VcsKind::Mercurial => Box::new(Mercurial { workdir, verbose }),
        VcsKind::Bazaar => Box::new(Bazaar { workdir, verbose }),
        VcsKind::Fake => Box::new(Fake),
    }
}

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

/// Run one argv through the executor. `quiet` forces capture even when the
/// adapter is verbose (status parsing needs the output).
fn run_argv(workdir: &Utf8Path, verbose: bool, argv: &[&str]) -> VcsResult<String> {
    let commands = CommandSet::Argv(vec![argv.iter().map(|s| (*s).to_string()).collect()]);
    Ok(exec::execute(
        &commands,
        &Substitutions::none(),
        workdir,
        verbose,
        false,
    )?)
}

/// Status entries for tracked files with uncommitted modifications.
///
/// Works across git/hg/bzr short-status formats: untracked entries are the
/// ones whose status marker starts with `?`.
fn dirty_entries(status: &str) -> Vec<&str> {
    status
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.trim_start().starts_with('?'))
        .collect()
}

/// Common validate flow: tool present, status command succeeds, tree clean.
fn validate_tree(
    kind: VcsKind,
    tool: &'static str,
    status_argv: &[&str],
    workdir: &Utf8Path,
    dryrun: bool,
) -> VcsResult<()> {
    if which::which(tool).is_err() {
        return Err(VcsError::ToolMissing { tool });
    }

    let status = run_argv(workdir, false, status_argv).map_err(|_| VcsError::NotARepository {
        kind,
        path: workdir.to_path_buf(),
    })?;

    let dirty = dirty_entries(&status);
    if !dirty.is_empty() {
        let files = dirty.join(", ");
        if dryrun {
            warn!(%files, "working tree is dirty, continuing (dry run)");
        } else {
            return Err(VcsError::DirtyWorkingTree { files });
        }
    }

    debug!(%kind, "repository validated");
    Ok(())
}

// ──────────────────────────────────────────────
// Backends
// ──────────────────────────────────────────────

/// Git adapter.
pub struct Git {
    workdir: Utf8PathBuf,
    verbose: bool,
}

impl Vcs for Git {
    fn validate(&self, dryrun: bool) -> VcsResult<()> {
        validate_tree(
            VcsKind::Git,
            "git",
            &["git", "status", "--porcelain"],
            &self.workdir,
            dryrun,
        )
    }

    fn commit(&self, message: &str) -> VcsResult<()> {
        run_argv(&self.workdir, self.verbose, &["git", "commit", "-am", message])?;
        Ok(())
    }

    fn tag(&self, name: &str, annotation: Option<&str>) -> VcsResult<()> {
        match annotation {
            Some(annotation) => run_argv(
                &self.workdir,
                self.verbose,
                &["git", "tag", "-a", name, "-m", annotation],
            )?,
            None => run_argv(&self.workdir, self.verbose, &["git", "tag", name])?,
        };
        Ok(())
    }

    fn push(&self) -> VcsResult<()> {
        run_argv(&self.workdir, self.verbose, &["git", "push"])?;
        run_argv(&self.workdir, self.verbose, &["git", "push", "--tags"])?;
        Ok(())
    }
}

/// Mercurial adapter.
pub struct Mercurial {
    workdir: Utf8PathBuf,
    verbose: bool,
}

impl Vcs for Mercurial {
    fn validate(&self, dryrun: bool) -> VcsResult<()> {
        validate_tree(
            VcsKind::Mercurial,
            "hg",
            &["hg", "status"],
            &self.workdir,
            dryrun,
        )
    }

    fn commit(&self, message: &str) -> VcsResult<()> {
        run_argv(&self.workdir, self.verbose, &["hg", "commit", "-A", "-m", message])?;
        Ok(())
    }

    fn tag(&self, name: &str, annotation: Option<&str>) -> VcsResult<()> {
        // hg records the tag in a commit of its own; the annotation becomes
        // that commit's message.
        match annotation {
            Some(annotation) => run_argv(
                &self.workdir,
                self.verbose,
                &["hg", "tag", "-m", annotation, name],
            )?,
            None => run_argv(&self.workdir, self.verbose, &["hg", "tag", name])?,
        };
        Ok(())
    }

    fn push(&self) -> VcsResult<()> {
        run_argv(&self.workdir, self.verbose, &["hg", "push"])?;
        Ok(())
    }
}

/// Bazaar adapter.
pub struct Bazaar {
    workdir: Utf8PathBuf,
    verbose: bool,
}

impl Vcs for Bazaar {
    fn validate(&self, dryrun: bool) -> VcsResult<()> {
        validate_tree(
            VcsKind::Bazaar,
            "bzr",
            &["bzr", "status", "--short"],
            &self.workdir,
            dryrun,
        )
    }

    fn commit(&self, message: &str) -> VcsResult<()> {
        run_argv(&self.workdir, self.verbose, &["bzr", "commit", "-m", message])?;
        Ok(())
    }

    fn tag(&self, name: &str, annotation: Option<&str>) -> VcsResult<()> {
        if annotation.is_some() {
            warn!("bzr does not support tag annotations, tagging without one");
        }
        run_argv(&self.workdir, self.verbose, &["bzr", "tag", name])?;
        Ok(())
    }

    fn push(&self) -> VcsResult<()> {
        run_argv(&self.workdir, self.verbose, &["bzr", "push"])?;
        Ok(())
    }
}

/// No-op backend: validation always passes, operations do nothing.
pub struct Fake;

impl Vcs for Fake {
    fn validate(&self, _dryrun: bool) -> VcsResult<()> {
        Ok(())
    }

    fn commit(&self, message: &str) -> VcsResult<()> {
        debug!(message, "fake vcs: commit");
        Ok(())
    }

    fn tag(&self, name: &str, annotation: Option<&str>) -> VcsResult<()> {
        debug!(name, ?annotation, "fake vcs: tag");
        Ok(())
    }

    fn push(&self) -> VcsResult<()> {
        debug!("fake vcs: push");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_entries_tolerate_untracked() {
        let status = "?? new-file.rs\n?? scratch/\n";
        assert!(dirty_entries(status).is_empty());
    }

    #[test]
    fn dirty_entries_catch_modified_tracked_files() {
        let status = " M src/lib.rs\n?? scratch/\nA  added.rs\n";
        assert_eq!(dirty_entries(status), vec![" M src/lib.rs", "A  added.rs"]);
    }

    #[test]
    fn dirty_entries_handle_mercurial_markers() {
        assert!(dirty_entries("? notes.txt\n").is_empty());
        assert_eq!(dirty_entries("M tracked.py\n"), vec!["M tracked.py"]);
    }

    #[test]
    fn empty_status_is_clean() {
        assert!(dirty_entries("").is_empty());
    }

    #[test]
    fn fake_backend_is_inert() {
        let fake = Fake;
        assert!(fake.validate(false).is_ok());
        assert!(fake.commit("message").is_ok());
        assert!(fake.tag("1.2.3", Some("annotated")).is_ok());
        assert!(fake.push().is_ok());
    }

    #[test]
    fn kind_display_matches_config_names() {
        assert_eq!(VcsKind::Git.to_string(), "git");
        assert_eq!(VcsKind::Mercurial.to_string(), "hg");
        assert_eq!(VcsKind::Bazaar.to_string(), "bzr");
        assert_eq!(VcsKind::Fake.to_string(), "fake");
    }

    #[test]
    fn git_validate_fails_outside_a_repository() {
        if which::which("git").is_err() {
            return;
        }
        let tmp = tempfile::TempDir::new().unwrap();
        let workdir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let git = Git {
            workdir,
            verbose: false,
        };
        assert!(matches!(
            git.validate(false),
            Err(VcsError::NotARepository { .. })
        ));
    }
}
