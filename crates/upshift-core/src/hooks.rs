//! Pluggable hooks for the bump/prepare transitions.
//!
//! Hooks contribute ordered text replacements and side effects (file edits
//! through [`Releaser::perform`], shell commands through
//! [`Releaser::execute`]) at the two version transitions. Each hook is bound
//! to its slice of the configuration and validated when it is built, before
//! any phase runs.
//!
//! # Replacement ordering
//!
//! Hooks insert their pairs at the *front* of the shared replacement list,
//! so a later-registered hook's edits are applied before an earlier one's,
//! and all hook pairs are applied before the seed version pair. Existing
//! configurations rely on this ordering; see the ordering tests below.

use std::collections::VecDeque;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::{
    ChangelogConfig, CommandsConfig, Config, ReadTheDocConfig, ReplaceConfig,
};
use crate::exec::Substitutions;
use crate::releaser::{ReleaseResult, Releaser};

/// Errors from hook construction.
#[derive(Error, Debug)]
pub enum HookError {
    /// A required hook option is missing from the configuration.
    #[error("the {hook} hook requires the {option:?} option")]
    MissingOption {
        /// The hook's configuration key.
        hook: &'static str,
        /// The missing option name.
        option: &'static str,
    },

    /// A hook option points to a file that does not exist.
    #[error("the {hook} hook references a missing file: {path}")]
    MissingResource {
        /// The hook's configuration key.
        hook: &'static str,
        /// The missing path.
        path: Utf8PathBuf,
    },
}

/// Result alias for hook construction.
pub type HookResult<T> = Result<T, HookError>;

/// An ordered set of `(old, new)` text replacements.
///
/// Application order is front to back, and each replacement operates on the
/// result of the previous one. [`ReplacementSet::push_front`] is the only
/// insertion hooks get, preserving the last-registered-first-applied rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementSet {
    entries: VecDeque<(String, String)>,
}

impl ReplacementSet {
    /// Start a set from the phase's seed pair.
    pub fn seeded(old: impl Into<String>, new: impl Into<String>) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back((old.into(), new.into()));
        Self { entries }
    }

    /// Insert a pair at the front, to be applied before existing entries.
    pub fn push_front(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.entries.push_front((old.into(), new.into()));
    }

    /// Apply every replacement in order to the given text.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for (old, new) in &self.entries {
            out = out.replace(old, new);
        }
        out
    }

    /// Number of replacement pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the pairs in application order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.entries.iter()
    }
}

/// A pluggable unit participating in the bump/prepare transitions.
///
/// Both callbacks default to no-ops.
pub trait Hook {
    /// Called once per release after version numbers are finalized, before
    /// any file is rewritten.
    fn bump(
        &mut self,
        releaser: &mut Releaser,
        replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        let _ = (releaser, replacements);
        Ok(())
    }

    /// The symmetric callback for the next-development-cycle transition.
    fn prepare(
        &mut self,
        releaser: &mut Releaser,
        replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        let _ = (releaser, replacements);
        Ok(())
    }
}

/// Build the enabled hooks in their fixed registration order:
/// readthedoc, changelog, commands, replace.
pub fn build_hooks(config: &Config, root: &Utf8Path) -> HookResult<Vec<Box<dyn Hook>>> {
    let mut hooks: Vec<Box<dyn Hook>> = Vec::new();

    if let Some(ref cfg) = config.readthedoc {
        hooks.push(Box::new(ReadTheDocHook::from_config(cfg)?));
    }
    if let Some(ref cfg) = config.changelog {
        hooks.push(Box::new(ChangelogHook::from_config(cfg, root)?));
    }
    if let Some(ref cfg) = config.commands {
        hooks.push(Box::new(CommandsHook::from_config(cfg)));
    }
    if let Some(ref cfg) = config.replace {
        hooks.push(Box::new(ReplaceHook::from_config(cfg)?));
    }

    debug!(count = hooks.len(), "hooks registered");
    Ok(hooks)
}

// ──────────────────────────────────────────────
// Documentation-URL hook
// ──────────────────────────────────────────────

/// Switches documentation page and badge URLs between the `latest` alias and
/// the concrete release tag.
pub struct ReadTheDocHook {
    config: ReadTheDocConfig,
    id: String,
}

impl ReadTheDocHook {
    /// Validate the configuration slice and build the hook.
    pub fn from_config(config: &ReadTheDocConfig) -> HookResult<Self> {
        let id = config
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(HookError::MissingOption {
                hook: "readthedoc",
                option: "id",
            })?;
        Ok(Self {
            config: config.clone(),
            id,
        })
    }

    fn url(&self, tag: &str) -> String {
        Substitutions::none()
            .set("id", self.id.as_str())
            .set("tag", tag)
            .apply(&self.config.url)
    }

    fn badge(&self, tag: &str) -> String {
        Substitutions::none()
            .set("id", self.id.as_str())
            .set("tag", tag)
            .apply(&self.config.badge)
    }

    /// The (dev alias, released tag) pair for the current release.
    fn tags(&self, releaser: &Releaser) -> (String, String) {
        let subs = releaser.substitutions_for(&releaser.version);
        (subs.apply(&self.config.prepare), subs.apply(&self.config.bump))
    }
}

impl Hook for ReadTheDocHook {
    fn bump(
        &mut self,
        releaser: &mut Releaser,
        replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        let (dev, released) = self.tags(releaser);
        replacements.push_front(self.url(&dev), self.url(&released));
        replacements.push_front(self.badge(&dev), self.badge(&released));
        Ok(())
    }

    fn prepare(
        &mut self,
        releaser: &mut Releaser,
        replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        let (dev, released) = self.tags(releaser);
        replacements.push_front(self.url(&released), self.url(&dev));
        replacements.push_front(self.badge(&released), self.badge(&dev));
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Changelog hook
// ──────────────────────────────────────────────

/// Finalizes the in-development changelog section on bump and re-inserts a
/// fresh one on prepare.
pub struct ChangelogHook {
    config: ChangelogConfig,
    file: Utf8PathBuf,
}

impl ChangelogHook {
    /// Validate the configuration slice and build the hook.
    ///
    /// The changelog file must exist on disk before the release starts.
    pub fn from_config(config: &ChangelogConfig, root: &Utf8Path) -> HookResult<Self> {
        let file = config.file.clone().ok_or(HookError::MissingOption {
            hook: "changelog",
            option: "file",
        })?;
        if !root.join(&file).exists() {
            return Err(HookError::MissingResource {
                hook: "changelog",
                path: file,
            });
        }
        Ok(Self {
            config: config.clone(),
            file,
        })
    }

    /// Underline a header with the configured separator; an empty separator
    /// disables underlining.
    fn underline(&self, text: &str) -> String {
        if self.config.separator.is_empty() {
            text.to_owned()
        } else {
            format!("{text}\n{}", self.config.separator.repeat(text.chars().count()))
        }
    }

    fn dev_header(&self) -> String {
        self.underline(&self.config.prepare)
    }

    fn bumped_header(&self, releaser: &Releaser) -> String {
        let title = releaser
            .substitutions_for(&releaser.version)
            .apply(&self.config.bump);
        self.underline(&title)
    }
}

impl Hook for ChangelogHook {
    fn bump(
        &mut self,
        releaser: &mut Releaser,
        _replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        let before = releaser.read_file(&self.file)?;
        let after = before.replace(&self.dev_header(), &self.bumped_header(releaser));
        releaser.perform(&self.file, &before, &after)
    }

    fn prepare(
        &mut self,
        releaser: &mut Releaser,
        _replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        let bumped = self.bumped_header(releaser);
        let next_section = format!(
            "{}\n\n- {}\n\n{}",
            self.dev_header(),
            self.config.empty,
            bumped
        );
        let before = releaser.read_file(&self.file)?;
        let after = before.replace(&bumped, &next_section);
        releaser.perform(&self.file, &before, &after)
    }
}

// ──────────────────────────────────────────────
// Commands hook
// ──────────────────────────────────────────────

/// Runs arbitrary templated shell commands at the transitions.
pub struct CommandsHook {
    config: CommandsConfig,
}

impl CommandsHook {
    /// Build the hook; there is nothing to validate.
    pub fn from_config(config: &CommandsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Hook for CommandsHook {
    fn bump(
        &mut self,
        releaser: &mut Releaser,
        _replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        if let Some(ref commands) = self.config.bump {
            releaser.execute(commands)?;
        }
        Ok(())
    }

    fn prepare(
        &mut self,
        releaser: &mut Releaser,
        _replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        if let Some(ref commands) = self.config.prepare {
            releaser.execute(commands)?;
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Generic replace hook
// ──────────────────────────────────────────────

/// Substitutes a templated development pattern for a templated stable
/// pattern on bump, and the reverse on prepare. A generalized version of the
/// documentation hook for arbitrary text.
pub struct ReplaceHook {
    dev: String,
    stable: String,
}

impl ReplaceHook {
    /// Validate the configuration slice and build the hook.
    pub fn from_config(config: &ReplaceConfig) -> HookResult<Self> {
        let dev = config.dev.clone().ok_or(HookError::MissingOption {
            hook: "replace",
            option: "dev",
        })?;
        let stable = config.stable.clone().ok_or(HookError::MissingOption {
            hook: "replace",
            option: "stable",
        })?;
        Ok(Self { dev, stable })
    }
}

impl Hook for ReplaceHook {
    fn bump(
        &mut self,
        releaser: &mut Releaser,
        replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        // The dev pattern matches text written for the outgoing version; the
        // stable pattern is rendered for the version being released.
        let old = releaser
            .substitutions_for(&releaser.prev_version)
            .apply(&self.dev);
        let new = releaser
            .substitutions_for(&releaser.version)
            .apply(&self.stable);
        replacements.push_front(old, new);
        Ok(())
    }

    fn prepare(
        &mut self,
        releaser: &mut Releaser,
        replacements: &mut ReplacementSet,
    ) -> ReleaseResult<()> {
        let old = releaser
            .substitutions_for(&releaser.version)
            .apply(&self.stable);
        let new = releaser
            .substitutions_for(&releaser.next_version)
            .apply(&self.dev);
        replacements.push_front(old, new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacements_apply_front_to_back() {
        let mut set = ReplacementSet::seeded("1.2.3.dev", "1.2.3");
        set.push_front("docs/1.2.3.dev", "docs/stable");
        // The front pair must run first: after the seed pair has fired, the
        // longer dev-docs pattern would no longer match.
        let out = set.apply("see docs/1.2.3.dev and 1.2.3.dev");
        assert_eq!(out, "see docs/stable and 1.2.3");
    }

    #[test]
    fn later_replacements_see_earlier_results() {
        let mut set = ReplacementSet::seeded("b", "c");
        set.push_front("a", "b");
        assert_eq!(set.apply("a"), "c");
    }

    #[test]
    fn later_hooks_insertions_leapfrog_earlier_ones() {
        // Two hooks each pushing to the front: the second hook's pair ends up
        // applied before the first hook's.
        let mut set = ReplacementSet::seeded("seed-old", "seed-new");
        set.push_front("hook-a", "a");
        set.push_front("hook-b", "b");
        let pairs: Vec<&(String, String)> = set.iter().collect();
        assert_eq!(pairs[0].0, "hook-b");
        assert_eq!(pairs[1].0, "hook-a");
        assert_eq!(pairs[2].0, "seed-old");
    }

    #[test]
    fn empty_set_is_identity() {
        let set = ReplacementSet::default();
        assert!(set.is_empty());
        assert_eq!(set.apply("unchanged"), "unchanged");
    }

    #[test]
    fn readthedoc_requires_an_id() {
        let config = ReadTheDocConfig::default();
        assert!(matches!(
            ReadTheDocHook::from_config(&config),
            Err(HookError::MissingOption { option: "id", .. })
        ));
    }

    #[test]
    fn readthedoc_formats_urls() {
        let config = ReadTheDocConfig {
            id: Some("upshift".into()),
            ..ReadTheDocConfig::default()
        };
        let hook = ReadTheDocHook::from_config(&config).unwrap();
        assert_eq!(hook.url("latest"), "https://upshift.readthedocs.io/en/latest");
        assert_eq!(
            hook.badge("1.2.3"),
            "https://readthedocs.org/projects/upshift/badge/?version=1.2.3"
        );
    }

    #[test]
    fn changelog_requires_an_existing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        let config = ChangelogConfig::default();
        assert!(matches!(
            ChangelogHook::from_config(&config, &root),
            Err(HookError::MissingOption { option: "file", .. })
        ));

        let config = ChangelogConfig {
            file: Some("CHANGELOG.rst".into()),
            ..ChangelogConfig::default()
        };
        assert!(matches!(
            ChangelogHook::from_config(&config, &root),
            Err(HookError::MissingResource { .. })
        ));

        std::fs::write(root.join("CHANGELOG.rst"), "Current\n-------\n").unwrap();
        assert!(ChangelogHook::from_config(&config, &root).is_ok());
    }

    #[test]
    fn changelog_underline_matches_header_length() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        std::fs::write(root.join("CHANGELOG"), "Dev\n###\n").unwrap();

        let config = ChangelogConfig {
            file: Some("CHANGELOG".into()),
            separator: "#".into(),
            prepare: "Dev".into(),
            ..ChangelogConfig::default()
        };
        let hook = ChangelogHook::from_config(&config, &root).unwrap();
        assert_eq!(hook.dev_header(), "Dev\n###");
        assert_eq!(hook.underline("1.2.3 2020-01-01"), "1.2.3 2020-01-01\n################");
    }

    #[test]
    fn changelog_empty_separator_disables_underlining() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        std::fs::write(root.join("CHANGELOG.md"), "## Current\n").unwrap();

        let config = ChangelogConfig {
            file: Some("CHANGELOG.md".into()),
            separator: String::new(),
            prepare: "## Current".into(),
            ..ChangelogConfig::default()
        };
        let hook = ChangelogHook::from_config(&config, &root).unwrap();
        assert_eq!(hook.dev_header(), "## Current");
    }

    #[test]
    fn replace_requires_both_patterns() {
        let config = ReplaceConfig {
            dev: Some("{version}.dev".into()),
            stable: None,
        };
        assert!(matches!(
            ReplaceHook::from_config(&config),
            Err(HookError::MissingOption { option: "stable", .. })
        ));
    }

    #[test]
    fn build_hooks_skips_absent_tables() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let config = Config::default();
        let hooks = build_hooks(&config, &root).unwrap();
        assert!(hooks.is_empty());
    }
}
