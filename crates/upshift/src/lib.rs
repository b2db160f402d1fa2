//! Library interface for the `upshift` CLI.
//!
//! This crate exposes the argument parser as a library so the binary stays a
//! thin wire-up layer and the flag-to-configuration mapping can be tested
//! directly. The actual entry point is in `main.rs`.

use camino::Utf8PathBuf;
use clap::Parser;
use upshift_core::config::Config;
use upshift_core::vcs::VcsKind;
use upshift_core::version::Part;

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG    Log filter (e.g., debug, upshift_core=trace)
";

/// Command-line interface definition for upshift.
#[derive(Debug, Parser)]
#[command(name = "upshift")]
#[command(about = "Version bump and release automation", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// Version-bearing file to release
    pub file: Option<Utf8PathBuf>,

    /// Additional files to update
    pub files: Vec<Utf8PathBuf>,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Compute and display the changes without applying them
    #[arg(short, long)]
    pub dryrun: bool,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long)]
    pub quiet: bool,

    /// More detail, and stream child-process output (repeatable; e.g. -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only perform the bump phase
    #[arg(short, long, conflicts_with = "prepare_only")]
    pub bump_only: bool,

    /// Only perform the prepare phase
    #[arg(short, long)]
    pub prepare_only: bool,

    /// Bump the major version
    #[arg(short = 'M', long, group = "part")]
    pub major: bool,

    /// Bump the minor version
    #[arg(short = 'm', long, group = "part")]
    pub minor: bool,

    /// Bump the patch version
    #[arg(short = 'P', long, group = "part")]
    pub patch: bool,

    /// Set the released version's suffix
    #[arg(short, long)]
    pub suffix: Option<String>,

    /// Clear the released version's suffix
    #[arg(short, long)]
    pub unsuffix: bool,

    /// Bump the major version during prepare
    #[arg(long, group = "prepare_part")]
    pub prepare_major: bool,

    /// Bump the minor version during prepare
    #[arg(long, group = "prepare_part")]
    pub prepare_minor: bool,

    /// Bump the patch version during prepare
    #[arg(long, group = "prepare_part")]
    pub prepare_patch: bool,

    /// Set the next development version's suffix
    #[arg(long)]
    pub prepare_suffix: Option<String>,

    /// Clear the next development version's suffix
    #[arg(long)]
    pub prepare_unsuffix: bool,

    /// VCS backend
    #[arg(long, value_enum)]
    pub vcs: Option<VcsKind>,

    /// Do not commit (disables tagging too)
    #[arg(long)]
    pub no_commit: bool,

    /// Push commits and tags after the release
    #[arg(long)]
    pub push: bool,

    /// Skip the test phase
    #[arg(long)]
    pub skip_tests: bool,
}

impl Cli {
    /// Overlay the parsed flags onto a loaded configuration.
    ///
    /// Only flags the user actually passed override the file-derived values.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref file) = self.file {
            config.file = Some(file.clone());
        }
        if !self.files.is_empty() {
            config.files.clone_from(&self.files);
        }
        if self.verbose > 0 {
            config.verbose = true;
        }
        if self.dryrun {
            config.dryrun = true;
        }
        if self.bump_only {
            config.bump_only = true;
        }
        if self.prepare_only {
            config.prepare_only = true;
        }
        if let Some(vcs) = self.vcs {
            config.vcs = Some(vcs);
        }
        if self.no_commit {
            config.commit = false;
        }
        if self.push {
            config.push = true;
        }
        if self.skip_tests {
            config.skip_tests = true;
        }

        if let Some(part) = self.bump_part() {
            config.bump.part = Some(part);
        }
        if let Some(ref suffix) = self.suffix {
            config.bump.suffix = Some(suffix.clone());
        }
        if self.unsuffix {
            config.bump.unsuffix = true;
        }

        if let Some(part) = self.prepare_part() {
            config.prepare.part = Some(part);
        }
        if let Some(ref suffix) = self.prepare_suffix {
            config.prepare.suffix = Some(suffix.clone());
        }
        if self.prepare_unsuffix {
            config.prepare.unsuffix = true;
        }
    }

    fn bump_part(&self) -> Option<Part> {
        if self.major {
            Some(Part::Major)
        } else if self.minor {
            Some(Part::Minor)
        } else if self.patch {
            Some(Part::Patch)
        } else {
            None
        }
    }

    fn prepare_part(&self) -> Option<Part> {
        if self.prepare_major {
            Some(Part::Major)
        } else if self.prepare_minor {
            Some(Part::Minor)
        } else if self.prepare_patch {
            Some(Part::Patch)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("upshift").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn positional_file_and_files() {
        let cli = parse(&["module.py", "README.rst", "docs/conf.py"]);
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config.file.as_deref().unwrap(), "module.py");
        assert_eq!(config.files.len(), 2);
    }

    #[test]
    fn part_flags_map_to_bump_config() {
        let mut config = Config::default();
        parse(&["-M"]).apply_to(&mut config);
        assert_eq!(config.bump.part, Some(Part::Major));

        let mut config = Config::default();
        parse(&["--minor"]).apply_to(&mut config);
        assert_eq!(config.bump.part, Some(Part::Minor));

        let mut config = Config::default();
        parse(&["-P"]).apply_to(&mut config);
        assert_eq!(config.bump.part, Some(Part::Patch));
    }

    #[test]
    fn part_flags_are_mutually_exclusive() {
        let result = Cli::try_parse_from(["upshift", "-M", "-m"]);
        assert!(result.is_err());
    }

    #[test]
    fn bump_and_prepare_only_conflict() {
        let result = Cli::try_parse_from(["upshift", "-b", "-p"]);
        assert!(result.is_err());
    }

    #[test]
    fn prepare_flags_map_to_prepare_config() {
        let mut config = Config::default();
        parse(&["--prepare-patch", "--prepare-suffix", "dev"]).apply_to(&mut config);
        assert_eq!(config.prepare.part, Some(Part::Patch));
        assert_eq!(config.prepare.suffix.as_deref(), Some("dev"));
    }

    #[test]
    fn no_commit_disables_commit() {
        let mut config = Config::default();
        assert!(config.commit);
        parse(&["--no-commit"]).apply_to(&mut config);
        assert!(!config.commit);
    }

    #[test]
    fn unset_flags_leave_config_untouched() {
        let mut config = Config {
            file: Some("from-config.py".into()),
            push: true,
            ..Config::default()
        };
        parse(&[]).apply_to(&mut config);
        assert_eq!(config.file.as_deref().unwrap(), "from-config.py");
        assert!(config.push);
    }

    #[test]
    fn vcs_flag_accepts_backend_names() {
        let mut config = Config::default();
        parse(&["--vcs", "git"]).apply_to(&mut config);
        assert_eq!(config.vcs, Some(VcsKind::Git));

        let mut config = Config::default();
        parse(&["--vcs", "fake"]).apply_to(&mut config);
        assert_eq!(config.vcs, Some(VcsKind::Fake));
    }
}
