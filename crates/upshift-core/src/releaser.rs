//! Release workflow orchestration.
//!
//! The [`Releaser`] owns version computation and drives the linear workflow:
//!
//! ```text
//! clean -> test -> bump -> publish -> prepare -> push
//! ```
//!
//! `bump_only` / `prepare_only` jump straight to their phase and stop. Every
//! phase no-ops when its configuration is absent. All three versions (prev,
//! release, next) are computed at construction and never mutated afterwards;
//! phases only read them.
//!
//! In dry-run mode file rewrites land in an in-memory buffer instead of on
//! disk, with a unified diff per file rendered at phase boundaries. The bump
//! phase clears its report so it stays separate from the prepare phase's;
//! prepare leaves its report in place for the caller to consume.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{self, Config, ConfigError};
use crate::diff;
use crate::exec::{self, CommandSet, ExecError, Substitutions};
use crate::hooks::{self, Hook, HookError, ReplacementSet};
use crate::vcs::{self, Vcs, VcsError};
use crate::version::{Version, VersionError};

/// Errors from the release workflow.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The extraction regex found no version in the target file.
    #[error("version not found in {file}")]
    VersionNotFound {
        /// The target file that was searched.
        file: Utf8PathBuf,
    },

    /// The matched version string does not parse.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to read a file.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The offending path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The offending path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A file's bytes do not decode in the configured encoding.
    #[error("{path} is not valid in the configured encoding")]
    Decode {
        /// The offending path.
        path: Utf8PathBuf,
    },

    /// An external command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// A VCS operation failed.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// A hook rejected its configuration.
    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Buffers for simulated file mutations.
#[derive(Debug, Default)]
struct DryRunState {
    /// Latest pending content per file, read back by later rewrite passes
    /// within the same release.
    pending: BTreeMap<Utf8PathBuf, String>,
    /// Unified diff per file, rendered at phase boundaries.
    diffs: BTreeMap<Utf8PathBuf, String>,
}

/// Which transition a hook pass serves.
#[derive(Clone, Copy)]
enum Phase {
    Bump,
    Prepare,
}

/// The live orchestrator for one release.
pub struct Releaser {
    config: Config,
    root: Utf8PathBuf,
    file: Utf8PathBuf,
    encoding: &'static encoding_rs::Encoding,
    /// Version parsed from the target file.
    pub prev_version: Version,
    /// Version being released (prev advanced by the bump configuration).
    pub version: Version,
    /// Next development-cycle version (release advanced by the prepare
    /// configuration).
    pub next_version: Version,
    /// Tag name formatted from the release version.
    pub tag_label: String,
    /// Annotated-tag message, when a template is configured.
    pub tag_annotation: Option<String>,
    /// Release date (`YYYY-MM-DD`), captured once at construction.
    pub timestamp: String,
    vcs: Option<Box<dyn Vcs>>,
    dry_run: Option<DryRunState>,
    hooks: Vec<Box<dyn Hook>>,
}

impl std::fmt::Debug for Releaser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Releaser")
            .field("root", &self.root)
            .field("file", &self.file)
            .field("encoding", &self.encoding.name())
            .field("prev_version", &self.prev_version)
            .field("version", &self.version)
            .field("next_version", &self.next_version)
            .field("tag_label", &self.tag_label)
            .field("tag_annotation", &self.tag_annotation)
            .field("timestamp", &self.timestamp)
            .field("vcs", &self.vcs.as_ref().map(|_| "..."))
            .field("dry_run", &self.dry_run.is_some())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Releaser {
    /// Build a releaser from a validated configuration.
    ///
    /// Reads the current version out of the target file, computes the
    /// release and next-cycle versions, validates the repository state when
    /// a VCS is configured, and constructs the enabled hooks. Any failure
    /// here aborts before a single phase runs.
    #[instrument(skip(config), fields(file = ?config.file))]
    pub fn new(config: Config, root: &Utf8Path) -> ReleaseResult<Self> {
        config.validate()?;
        let file = config.file.clone().ok_or(ConfigError::MissingFile)?;
        let pattern =
            Regex::new(&config.regex).map_err(|e| ConfigError::InvalidRegex(Box::new(e)))?;
        let encoding = config::resolve_encoding(&config.encoding)?;
        let root = root.to_path_buf();

        let resolved = root.join(&file);
        let bytes = fs::read(&resolved).map_err(|source| ReleaseError::Read {
            path: resolved.clone(),
            source,
        })?;
        let (content, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            return Err(ReleaseError::Decode { path: resolved });
        }

        let matched = pattern
            .captures(&content)
            .and_then(|caps| caps.name("version"))
            .ok_or_else(|| ReleaseError::VersionNotFound { file: file.clone() })?;
        let prev_version = Version::parse(matched.as_str())?;

        let version = prev_version.bumped(
            config.bump.part,
            config.bump.unsuffix,
            config.bump.suffix.as_deref(),
        );
        let next_version = version.bumped(
            config.prepare.part,
            config.prepare.unsuffix,
            config.prepare.suffix.as_deref(),
        );
        debug!(%prev_version, %version, %next_version, "versions computed");

        let timestamp = civil_date_today();
        let base = version_substitutions(&version, &timestamp);
        let tag_label = base.apply(&config.tag_format);
        let tag_annotation = config
            .tag_annotation
            .as_ref()
            .map(|template| base.apply(template));

        // Repository cleanliness is a fail-fast gate: checked once, here,
        // before any phase runs.
        let vcs = match config.vcs {
            Some(kind) => {
                let adapter = vcs::from_kind(kind, &root, config.verbose);
                adapter.validate(config.dryrun)?;
                Some(adapter)
            }
            None => None,
        };

        let dry_run = config.dryrun.then(DryRunState::default);
        let hooks = hooks::build_hooks(&config, &root)?;

        Ok(Self {
            config,
            root,
            file,
            encoding,
            prev_version,
            version,
            next_version,
            tag_label,
            tag_annotation,
            timestamp,
            vcs,
            dry_run,
            hooks,
        })
    }

    /// Run the release workflow.
    #[instrument(skip(self), fields(version = %self.version))]
    pub fn release(&mut self) -> ReleaseResult<()> {
        info!(prev = %self.prev_version, version = %self.version, "performing release");
        if self.config.bump_only {
            self.bump()
        } else if self.config.prepare_only {
            self.prepare()
        } else {
            self.clean()?;
            self.test()?;
            self.bump()?;
            self.publish()?;
            self.prepare()?;
            self.push()
        }
    }

    // ──────────────────────────────────────────────
    // Phases
    // ──────────────────────────────────────────────

    /// Run the configured clean command, if any.
    pub fn clean(&self) -> ReleaseResult<()> {
        if let Some(ref clean) = self.config.clean {
            info!("cleaning");
            self.execute(clean)?;
        }
        Ok(())
    }

    /// Run the configured test command, if any.
    ///
    /// Tests always run in verbose mode; their output should be visible.
    pub fn test(&self) -> ReleaseResult<()> {
        if let Some(ref tests) = self.config.tests {
            if self.config.skip_tests {
                info!("skipping tests");
                return Ok(());
            }
            info!("running tests");
            exec::execute(
                &CommandSet::Shell(tests.clone()),
                &self.substitutions_for(&self.version),
                &self.root,
                true,
                self.config.dryrun,
            )?;
        }
        Ok(())
    }

    /// Rewrite files from the previous version to the release version,
    /// commit and tag.
    #[instrument(skip(self))]
    pub fn bump(&mut self) -> ReleaseResult<()> {
        info!(version = %self.version, "bump version");

        let mut replacements =
            ReplacementSet::seeded(self.prev_version.to_string(), self.version.to_string());
        self.run_hooks(Phase::Bump, &mut replacements)?;

        let (from, to) = (self.prev_version.clone(), self.version.clone());
        self.bump_version_file(&from, &to)?;
        self.rewrite_files(&replacements)?;
        self.commit_bump()?;

        // Cleared after rendering; the prepare phase reports separately.
        self.render_diffs(true);
        Ok(())
    }

    /// Run the configured publish command, if any.
    pub fn publish(&self) -> ReleaseResult<()> {
        if let Some(ref publish) = self.config.publish {
            info!("publishing");
            self.execute(publish)?;
        }
        Ok(())
    }

    /// Rewrite files from the release version to the next development
    /// version and commit.
    #[instrument(skip(self))]
    pub fn prepare(&mut self) -> ReleaseResult<()> {
        if self.version == self.next_version {
            info!("version unchanged, nothing to prepare");
            return Ok(());
        }
        info!(version = %self.next_version, "prepare next development cycle");

        let mut replacements =
            ReplacementSet::seeded(self.version.to_string(), self.next_version.to_string());
        self.run_hooks(Phase::Prepare, &mut replacements)?;

        let (from, to) = (self.version.clone(), self.next_version.clone());
        self.bump_version_file(&from, &to)?;
        self.rewrite_files(&replacements)?;
        self.commit_prepare()?;

        // Not cleared: the caller inspects the prepare report after
        // release() returns.
        self.render_diffs(false);
        Ok(())
    }

    /// Push commits and tags; requires commit and push to both be enabled.
    pub fn push(&self) -> ReleaseResult<()> {
        if let Some(ref vcs) = self.vcs
            && self.config.commit
            && self.config.push
        {
            if self.config.dryrun {
                info!("dry run, not pushing");
                return Ok(());
            }
            info!("pushing");
            vcs.push()?;
        }
        Ok(())
    }

    // ──────────────────────────────────────────────
    // Services used by phases and hooks
    // ──────────────────────────────────────────────

    /// Substitution values for command and message templates: `{version}`,
    /// `{tag}`, `{date}` and the version's own fields.
    pub fn substitutions_for(&self, version: &Version) -> Substitutions {
        version_substitutions(version, &self.timestamp).set("tag", self.tag_label.as_str())
    }

    /// Run a templated shell command block with the release context,
    /// honoring the configured verbosity and dry-run flags.
    pub fn execute(&self, commands: &str) -> ReleaseResult<()> {
        exec::execute(
            &CommandSet::Shell(commands.to_owned()),
            &self.substitutions_for(&self.version),
            &self.root,
            self.config.verbose,
            self.config.dryrun,
        )?;
        Ok(())
    }

    /// Current content of a file: the pending dry-run content when present,
    /// the on-disk content otherwise.
    pub fn read_file(&self, path: &Utf8Path) -> ReleaseResult<String> {
        if let Some(ref state) = self.dry_run
            && let Some(pending) = state.pending.get(path)
        {
            return Ok(pending.clone());
        }

        let resolved = self.root.join(path);
        let bytes = fs::read(&resolved).map_err(|source| ReleaseError::Read {
            path: resolved.clone(),
            source,
        })?;
        let (text, _, had_errors) = self.encoding.decode(&bytes);
        if had_errors {
            return Err(ReleaseError::Decode { path: resolved });
        }
        Ok(text.into_owned())
    }

    /// Apply one file mutation.
    ///
    /// Identical before/after content is a no-op: no write, no diff. In
    /// dry-run mode the new content is buffered so later passes in the same
    /// phase see it instead of stale on-disk content.
    pub fn perform(&mut self, path: &Utf8Path, before: &str, after: &str) -> ReleaseResult<()> {
        if before == after {
            debug!(%path, "content unchanged, skipping");
            return Ok(());
        }

        if let Some(ref mut state) = self.dry_run {
            state.pending.insert(path.to_path_buf(), after.to_owned());
            state
                .diffs
                .insert(path.to_path_buf(), diff::unified(before, after));
            return Ok(());
        }

        let resolved = self.root.join(path);
        let (bytes, _, _) = self.encoding.encode(after);
        fs::write(&resolved, bytes).map_err(|source| ReleaseError::Write {
            path: resolved,
            source,
        })?;
        debug!(%path, "rewritten");
        Ok(())
    }

    /// Pending dry-run diffs, keyed by file. `None` outside dry-run mode.
    pub fn diffs(&self) -> Option<&BTreeMap<Utf8PathBuf, String>> {
        self.dry_run.as_ref().map(|state| &state.diffs)
    }

    // ──────────────────────────────────────────────
    // Internal helpers
    // ──────────────────────────────────────────────

    /// Invoke every hook's callback for the phase, in registration order.
    fn run_hooks(&mut self, phase: Phase, replacements: &mut ReplacementSet) -> ReleaseResult<()> {
        let mut hooks = std::mem::take(&mut self.hooks);
        let result = hooks.iter_mut().try_for_each(|hook| match phase {
            Phase::Bump => hook.bump(self, replacements),
            Phase::Prepare => hook.prepare(self, replacements),
        });
        self.hooks = hooks;
        result
    }

    /// Rewrite the version string in the target file.
    fn bump_version_file(&mut self, from: &Version, to: &Version) -> ReleaseResult<()> {
        let file = self.file.clone();
        let before = self.read_file(&file)?;
        let after = before.replace(&from.to_string(), &to.to_string());
        self.perform(&file, &before, &after)
    }

    /// Sweep the target and every auxiliary file with the full replacement
    /// list, in order.
    fn rewrite_files(&mut self, replacements: &ReplacementSet) -> ReleaseResult<()> {
        let mut files = vec![self.file.clone()];
        files.extend(self.config.files.iter().cloned());
        for file in files {
            let before = self.read_file(&file)?;
            let after = replacements.apply(&before);
            self.perform(&file, &before, &after)?;
        }
        Ok(())
    }

    fn commit_bump(&mut self) -> ReleaseResult<()> {
        if self.vcs.is_none() || !self.config.commit {
            return Ok(());
        }
        let message = self
            .substitutions_for(&self.version)
            .apply(&self.config.bump.message);
        self.vcs_commit(&message)?;
        // The tag rides on the bump commit; without a commit there is
        // nothing to tag.
        if self.config.tag {
            self.vcs_tag()?;
        }
        Ok(())
    }

    fn commit_prepare(&mut self) -> ReleaseResult<()> {
        if self.vcs.is_none() || !self.config.commit {
            return Ok(());
        }
        let message = self
            .substitutions_for(&self.next_version)
            .apply(&self.config.prepare.message);
        self.vcs_commit(&message)
    }

    fn vcs_commit(&self, message: &str) -> ReleaseResult<()> {
        let Some(ref vcs) = self.vcs else {
            return Ok(());
        };
        if self.config.dryrun {
            info!(message, "dry run, not committing");
            return Ok(());
        }
        info!(message, "committing");
        vcs.commit(message)?;
        Ok(())
    }

    fn vcs_tag(&self) -> ReleaseResult<()> {
        let Some(ref vcs) = self.vcs else {
            return Ok(());
        };
        if self.config.dryrun {
            info!(tag = %self.tag_label, "dry run, not tagging");
            return Ok(());
        }
        info!(tag = %self.tag_label, "tagging");
        vcs.tag(&self.tag_label, self.tag_annotation.as_deref())?;
        Ok(())
    }

    /// Print buffered diffs to stdout; stdout carries program output,
    /// logging goes to stderr.
    fn render_diffs(&mut self, clear: bool) {
        let Some(ref mut state) = self.dry_run else {
            return;
        };
        for (path, diff) in &state.diffs {
            println!("{path}");
            println!("{diff}");
            println!();
        }
        if clear {
            state.diffs.clear();
        }
    }
}

/// Substitution values derived from a version and a release date.
fn version_substitutions(version: &Version, date: &str) -> Substitutions {
    Substitutions::none()
        .set("version", version.to_string())
        .set("date", date)
        .set("major", version.major.to_string())
        .set("minor", version.minor.to_string())
        .set("patch", version.patch.to_string())
        .set("suffix", version.suffix.clone().unwrap_or_default())
}

/// Today's civil date (UTC) as `YYYY-MM-DD`, using std::time and Hinnant's
/// civil-from-days algorithm (no external calendar crate needed).
fn civil_date_today() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let days = (secs / 86400) as i64;

    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    format!("{y:04}-{m:02}-{d:02}")
}
