//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--config <path>`: Explicit config file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//!
//! Every behavioral flag mirrors a field of the configuration file; a flag
//! given on the command line overrides the file value.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Srisync - reconcile CDN references and subresource integrity hashes
#[derive(Parser, Debug)]
#[command(name = "srisync")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Files or file globs to update; repeat for each
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,

    /// Path(s) to save output to if different from the input; globs are
    /// disabled when given
    #[arg(short = 'o', long = "output-path", value_name = "PATH")]
    pub output_paths: Vec<PathBuf>,

    /// Path to the config file (defaults to `srisync.toml` in the working
    /// directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run as if srisync was started in this directory
    #[arg(long, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// Rewrite references to local dependency-cache paths instead of CDN
    /// URLs
    #[arg(long)]
    pub local: bool,

    /// Insert a local-copy fallback snippet after each markup reference
    #[arg(long)]
    pub fallback: bool,

    /// Treat FILE arguments as literal paths, not globs
    #[arg(long)]
    pub no_globs: bool,

    /// Tolerate a missing local copy (degraded verification)
    #[arg(long)]
    pub force_integrity_checks: bool,

    /// `crossorigin` value to set on references that carry integrity
    #[arg(long, value_name = "VALUE")]
    pub add_crossorigin: Option<String>,

    /// Omit integrity attributes when rewriting to local paths
    #[arg(long)]
    pub no_local_integrity: bool,

    /// Skip reachability probes for rewritten URLs
    #[arg(long)]
    pub ignore_url_fetches: bool,

    /// Fetch the full body of each rewritten URL and cross-check every
    /// digest against it
    #[arg(long)]
    pub url_integrity_check: bool,

    /// Algorithm whitelist; repeat for each (sha256, sha384, sha512)
    #[arg(long = "algorithm", value_name = "ALGORITHM")]
    pub algorithms: Vec<String>,

    /// Global-check expression as `package=script|link=expression`;
    /// repeat for each
    #[arg(long = "global-check", value_name = "DIRECTIVE")]
    pub global_checks: Vec<String>,

    /// Reconcile and report without writing any file
    #[arg(long)]
    pub dry_run: bool,

    /// Indent width for rewritten JSON documents (0 = compact)
    #[arg(long, value_name = "N")]
    pub json_space: Option<usize>,

    /// Comment prepended to rewritten markup documents
    #[arg(long, value_name = "TEXT")]
    pub disclaimer: Option<String>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate shell completion scripts
    #[command(name = "completion")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_files_and_flags() {
        let cli = Cli::try_parse_from([
            "srisync",
            "index.html",
            "docs/*.html",
            "--local",
            "--algorithm",
            "sha384",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.files.len(), 2);
        assert!(cli.local);
        assert!(cli.dry_run);
        assert_eq!(cli.algorithms, vec!["sha384".to_string()]);
    }

    #[test]
    fn parses_completion_subcommand() {
        let cli = Cli::try_parse_from(["srisync", "completion", "bash"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Completion { .. })));
    }

    #[test]
    fn output_paths_repeatable() {
        let cli = Cli::try_parse_from([
            "srisync",
            "a.html",
            "b.html",
            "-o",
            "out/a.html",
            "-o",
            "out/b.html",
        ])
        .unwrap();
        assert_eq!(cli.output_paths.len(), 2);
    }
}
