//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and the configuration file
//! - Resolve them into the engine's [`Options`] (CLI flags win)
//! - Load the version sources, build the engine, and emit diagnostics
//!
//! The CLI layer is thin: all reconciliation flows through
//! [`crate::engine`].

pub mod args;

pub use args::{Cli, Command};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::CommandFactory;

use crate::core::catalog::PatternCatalog;
use crate::core::config::{self, ConfigFile, Options};
use crate::core::sources::VersionSources;
use crate::engine::{Engine, RunContext};
use crate::probe::HttpProbe;
use crate::ui::output::{self, Verbosity};

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    if let Some(Command::Completion { shell }) = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "srisync", &mut std::io::stdout());
        return Ok(());
    }

    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    let cwd = match &cli.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("could not determine working directory")?,
    };

    let loaded = config::load(cli.config.as_deref(), &cwd)?;
    if let Some(path) = &loaded.path {
        output::debug(format!("loaded config from {}", path.display()), verbosity);
    }

    let options = resolve_options(&cli, loaded.file, cwd.clone())?;
    let catalog = PatternCatalog::from_options(&options)?;

    let (sources, source_diags) = VersionSources::load(&cwd)?;
    for diagnostic in source_diags.iter() {
        output::emit(diagnostic, verbosity);
    }

    let engine = Engine::new(RunContext {
        options,
        catalog,
        sources,
        probe: Arc::new(HttpProbe::new()),
    });

    let outcome = engine.run().await?;
    for diagnostic in &outcome.diagnostics {
        output::emit(diagnostic, verbosity);
    }
    if outcome.dry_run {
        output::print("dry run: no files were written", verbosity);
    }

    Ok(())
}

/// Layer CLI flags over the config file over defaults.
fn resolve_options(cli: &Cli, file: ConfigFile, cwd: PathBuf) -> Result<Options> {
    let mut global_checks: BTreeMap<String, BTreeMap<String, String>> =
        file.global_checks.unwrap_or_default();
    for directive in &cli.global_checks {
        let (package, kind, expression) = config::parse_global_check(directive)?;
        global_checks
            .entry(package)
            .or_default()
            .insert(kind, expression);
    }

    let files = if cli.files.is_empty() {
        file.files.unwrap_or_default()
    } else {
        cli.files.clone()
    };
    let output_paths = if cli.output_paths.is_empty() {
        file.output_paths.unwrap_or_default()
    } else {
        cli.output_paths.clone()
    };
    let algorithms = if cli.algorithms.is_empty() {
        file.algorithms.unwrap_or_default()
    } else {
        cli.algorithms.clone()
    };

    Ok(Options {
        files,
        output_paths,
        cdn_base_paths: file.cdn_base_paths,
        cdn_base_path_replacements: file.cdn_base_path_replacements,
        node_modules_replacements: file.node_modules_replacements,
        cdn_names: file.cdn_names,
        packages_to_cdns: file.packages_to_cdns,
        algorithms,
        local: cli.local || file.local.unwrap_or(false),
        fallback: cli.fallback || file.fallback.unwrap_or(false),
        global_checks,
        no_globs: cli.no_globs || file.no_globs.unwrap_or(false),
        force_integrity_checks: cli.force_integrity_checks
            || file.force_integrity_checks.unwrap_or(false),
        add_crossorigin: cli.add_crossorigin.clone().or(file.add_crossorigin),
        no_local_integrity: cli.no_local_integrity || file.no_local_integrity.unwrap_or(false),
        ignore_url_fetches: cli.ignore_url_fetches || file.ignore_url_fetches.unwrap_or(false),
        url_integrity_check: cli.url_integrity_check || file.url_integrity_check.unwrap_or(false),
        dry_run: cli.dry_run || file.dry_run.unwrap_or(false),
        json_space: cli.json_space.or(file.json_space),
        disclaimer: cli.disclaimer.clone().or(file.disclaimer),
        cwd,
    })
}
