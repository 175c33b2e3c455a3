use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "license-compat",
    about = "Check dependency licenses against the project license and an organizational policy",
    version
)]
pub struct Cli {
    /// Project path to check
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Policy config file [default: ./.license-compat/config.toml, fallback ~/.config/license-compat/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Project license as an SPDX identifier; overrides `[project] license` from the config
    #[arg(long, value_name = "SPDX")]
    pub project_license: Option<String>,

    /// Dependency inventory [default: ./.license-compat/dependencies.toml]
    #[arg(long, value_name = "FILE")]
    pub deps: Option<PathBuf>,

    /// Extra license table merged on top of the bundled license data
    #[arg(long, value_name = "FILE")]
    pub license_data: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Show all dependencies (not just failures) and enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
