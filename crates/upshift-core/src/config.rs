//! Configuration loading and discovery.
//!
//! Configuration merges in layers (lowest precedence first): built-in
//! defaults, user config from the XDG config directory, a project file
//! discovered by walking up from the working directory, then any explicitly
//! supplied files. CLI flags are applied on top of the extracted [`Config`]
//! by the binary.
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.upshift.<ext>` in the working directory or any parent
//! - `upshift.<ext>` in the working directory or any parent
//! - `~/.config/upshift/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vcs::VcsKind;
use crate::version::Part;

/// Errors from configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// No target file was configured.
    #[error("a target file is required, from the configuration file or the command line")]
    MissingFile,

    /// The version-extraction pattern does not compile.
    #[error("invalid version-extraction regex: {0}")]
    InvalidRegex(#[from] Box<regex::Error>),

    /// The configured encoding label is not recognized.
    #[error("unknown encoding label: {0:?}")]
    UnknownEncoding(String),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default pattern for extracting the version string from the target file.
///
/// Recognizes `__version__ = "X.Y.Z"` and `VERSION = "X.Y.Z"` assignments
/// with either quote style; the named `version` group carries the value.
pub const DEFAULT_VERSION_REGEX: &str =
    r#"(__version__|VERSION)\s*=\s*['"](?P<version>.+?)['"]"#;

/// The release configuration.
///
/// Field defaults mirror the long-standing behavior of version-bump tools:
/// commit and tag are on, push is off, and the prepare phase keeps whatever
/// suffix it is given rather than clearing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// The version-bearing target file.
    pub file: Option<Utf8PathBuf>,
    /// Version-extraction regex with a named `version` capture group.
    pub regex: String,
    /// Text encoding for every file read/written during the release.
    pub encoding: String,
    /// VCS backend; `None` disables VCS integration entirely.
    pub vcs: Option<VcsKind>,
    /// Commit the rewritten files after each of bump/prepare.
    pub commit: bool,
    /// Tag the release (requires `commit`).
    pub tag: bool,
    /// Push commits and tags after the prepare phase.
    pub push: bool,
    /// Template for the tag name (`{version}`, `{date}`, version fields).
    pub tag_format: String,
    /// Optional template for an annotated-tag message.
    pub tag_annotation: Option<String>,
    /// Stream child-process output instead of capturing it.
    pub verbose: bool,
    /// Simulate the release: collect diffs, execute nothing.
    pub dryrun: bool,
    /// Shell command template run during the clean phase.
    pub clean: Option<String>,
    /// Shell command template run during the test phase.
    pub tests: Option<String>,
    /// Shell command template run during the publish phase.
    pub publish: Option<String>,
    /// Skip the test phase even when `tests` is configured.
    pub skip_tests: bool,
    /// Run only the bump phase.
    pub bump_only: bool,
    /// Run only the prepare phase.
    pub prepare_only: bool,
    /// Auxiliary files swept by the replacement pass alongside the target.
    pub files: Vec<Utf8PathBuf>,
    /// Bump-phase version transition.
    pub bump: PhaseConfig,
    /// Prepare-phase version transition.
    pub prepare: PhaseConfig,
    /// Documentation-URL hook; present enables it.
    pub readthedoc: Option<ReadTheDocConfig>,
    /// Changelog hook; present enables it.
    pub changelog: Option<ChangelogConfig>,
    /// Commands hook; present enables it.
    pub commands: Option<CommandsConfig>,
    /// Generic replace hook; present enables it.
    pub replace: Option<ReplaceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file: None,
            regex: DEFAULT_VERSION_REGEX.to_owned(),
            encoding: "utf-8".to_owned(),
            vcs: None,
            commit: true,
            tag: true,
            push: false,
            tag_format: "{version}".to_owned(),
            tag_annotation: None,
            verbose: false,
            dryrun: false,
            clean: None,
            tests: None,
            publish: None,
            skip_tests: false,
            bump_only: false,
            prepare_only: false,
            files: Vec::new(),
            bump: PhaseConfig::bump_defaults(),
            prepare: PhaseConfig::prepare_defaults(),
            readthedoc: None,
            changelog: None,
            commands: None,
            replace: None,
        }
    }
}

impl Config {
    /// Fail fast on settings the release cannot run without.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.file.is_none() {
            return Err(ConfigError::MissingFile);
        }
        Ok(())
    }
}

/// How one phase (bump or prepare) advances the version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseConfig {
    /// Numeric component to advance; `None` leaves the numbers untouched.
    pub part: Option<Part>,
    /// Clear the suffix after the numeric step.
    pub unsuffix: bool,
    /// Suffix to set (wins over `unsuffix`).
    pub suffix: Option<String>,
    /// Commit-message template for the phase.
    pub message: String,
}

impl PhaseConfig {
    /// Defaults for the bump phase: drop the dev suffix, no numeric change.
    pub fn bump_defaults() -> Self {
        Self {
            part: None,
            unsuffix: true,
            suffix: None,
            message: "Bump version {version}".to_owned(),
        }
    }

    /// Defaults for the prepare phase: keep whatever suffix is configured.
    pub fn prepare_defaults() -> Self {
        Self {
            part: None,
            unsuffix: false,
            suffix: None,
            message: "Update to version {version} for next development cycle".to_owned(),
        }
    }
}

/// Options for the documentation-URL hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReadTheDocConfig {
    /// Project identifier on the documentation host (required).
    pub id: Option<String>,
    /// Page URL template with `{id}` and `{tag}` placeholders.
    pub url: String,
    /// Badge URL template with `{id}` and `{tag}` placeholders.
    pub badge: String,
    /// Tag template for the released state.
    pub bump: String,
    /// Tag template for the development state.
    pub prepare: String,
}

impl Default for ReadTheDocConfig {
    fn default() -> Self {
        Self {
            id: None,
            url: "https://{id}.readthedocs.io/en/{tag}".to_owned(),
            badge: "https://readthedocs.org/projects/{id}/badge/?version={tag}".to_owned(),
            bump: "{version}".to_owned(),
            prepare: "latest".to_owned(),
        }
    }
}

/// Options for the changelog hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChangelogConfig {
    /// The changelog file (required, must exist).
    pub file: Option<Utf8PathBuf>,
    /// Underline character(s) for section headers; empty disables underlining.
    pub separator: String,
    /// Header template for the released section.
    pub bump: String,
    /// Header text of the in-development section.
    pub prepare: String,
    /// Placeholder line inserted under a fresh in-development section.
    pub empty: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            file: None,
            separator: "-".to_owned(),
            bump: "{version} ({date})".to_owned(),
            prepare: "Current".to_owned(),
            empty: "Nothing yet".to_owned(),
        }
    }
}

/// Options for the commands hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Shell command block run during the bump phase.
    pub bump: Option<String>,
    /// Shell command block run during the prepare phase.
    pub prepare: Option<String>,
}

/// Options for the generic replace hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReplaceConfig {
    /// Template of the development-state text (required).
    pub dev: Option<String>,
    /// Template of the released-state text (required).
    pub stable: Option<String>,
}

/// Resolve an encoding label against the WHATWG registry.
pub fn resolve_encoding(label: &str) -> ConfigResult<&'static encoding_rs::Encoding> {
    encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| ConfigError::UnknownEncoding(label.to_owned()))
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "upshift";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from the XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for `--config` or tests).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/upshift/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Disable the boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file, loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit files (in order added via `with_file`)
    /// 2. Project config (closest to search root)
    /// 3. User config (`~/.config/upshift/config.<ext>`)
    /// 4. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = find_user_config()
        {
            figment = merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        Ok(config)
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            if let Some(ref marker) = self.boundary_marker {
                let marker_path = dir.join(marker);
                if marker_path.exists() && dir != start {
                    break;
                }
            }

            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }
}

/// Find user config in the XDG config directory.
fn find_user_config() -> Option<Utf8PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    let config_dir = proj_dirs.config_dir();

    for ext in CONFIG_EXTENSIONS {
        let config_path = config_dir.join(format!("config.{ext}"));
        if config_path.is_file() {
            return Utf8PathBuf::from_path_buf(config_path).ok();
        }
    }

    None
}

/// Merge a config file into the figment, detecting format from extension.
fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}
