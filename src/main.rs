//! `license-compat`: check dependency licenses against a project license and policy.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load policy config ([`config::load_config`]).
//! 3. Build the license graph, bundled or with a user override table.
//! 4. Load the dependency inventory ([`inventory`]).
//! 5. Run the deny check and the compatibility check ([`policy`]).
//! 6. Render the requested report ([`report`]).
//! 7. Exit `0` (pass), `1` (policy failure) or `2` (fatal error).

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use license_compat::config::{self, Config};
use license_compat::inventory;
use license_compat::report;
use license_compat::{LicenseGraph, PolicyChecker};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(2);
        }
    }
}

/// Logs go to stderr so `--report json` output stays parseable.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// Returns whether the policy check passed.
fn run(cli: Cli) -> Result<bool> {
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let config = config::load_config(&path, cli.config.as_deref())?;
    info!(config = ?config.source, "policy loaded");
    let graph = load_graph(&cli, &config)?;

    let raw_project = cli
        .project_license
        .as_deref()
        .or(config.project.license.as_deref())
        .ok_or_else(|| {
            anyhow!("no project license: pass --project-license or set [project] license in the config")
        })?;

    let checker = PolicyChecker::new(graph, &config.policy);
    let project_id = checker
        .resolve(raw_project)
        .ok_or_else(|| anyhow!("unknown project license '{}'", raw_project))?;

    let deps_path = cli
        .deps
        .clone()
        .unwrap_or_else(|| path.join(".license-compat").join("dependencies.toml"));
    let deps = inventory::load_inventory(&deps_path)?;
    info!(
        project = %project_id,
        dependencies = deps.len(),
        "checking dependencies"
    );

    let report = checker.check(&project_id, &deps);

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&report, &path, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", report::json::render(&report)?);
        }
    }

    Ok(report.passed())
}

fn load_graph(cli: &Cli, config: &Config) -> Result<Arc<LicenseGraph>> {
    let data_path = cli.license_data.as_deref().or(config.license_data.as_deref());
    match data_path {
        Some(path) => load_override_graph(path),
        None => Ok(LicenseGraph::builtin()?),
    }
}

fn load_override_graph(path: &Path) -> Result<Arc<LicenseGraph>> {
    let table = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read license data {}", path.display()))?;
    LicenseGraph::with_overrides(&table)
        .with_context(|| format!("invalid license data in {}", path.display()))
}
