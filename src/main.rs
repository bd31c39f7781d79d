//! prefbak CLI
//!
//! Runs the backup rules defined in a machine's config file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgGroup, Parser};

use prefbak::backup::{BackupRunner, RuleSelection};
use prefbak::config::{Config, ProjectLayout};
use prefbak::manifest::{Equivalence, EquivalenceChecker};

#[derive(Debug, Parser)]
#[command(name = "prefbak")]
#[command(about = "Per-machine backup routines driven by a rule config", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["list_rules", "run_rules", "run_all", "compare", "show_config"])))]
struct Cli {
    /// Config file, as a path or a name inside the project's machine-config directory
    config: PathBuf,

    /// Project directory holding machine-config, machine-scripts and ~logs
    #[arg(long, env = "PREFBAK_HOME", default_value = ".")]
    project_dir: PathBuf,

    /// Print the rule names from the config file
    #[arg(short = 'l', long)]
    list_rules: bool,

    /// Run the named rules
    #[arg(short = 'r', long, num_args = 1..)]
    run_rules: Vec<String>,

    /// Run every rule in the config file
    #[arg(short = 'a', long)]
    run_all: bool,

    /// Check whether ARCHIVE is an up to date backup of SOURCE
    #[arg(short = 'x', long, num_args = 2, value_names = ["SOURCE", "ARCHIVE"])]
    compare: Vec<PathBuf>,

    /// Print the effective configuration as TOML
    #[arg(long)]
    show_config: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let layout = ProjectLayout::new(&cli.project_dir);

    let log_file = match layout.ensure_log_file() {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {}", e);
            None
        }
    };
    if let Err(e) = prefbak::logging::init(log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli, &layout) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            tracing::error!("process ended with errors");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, layout: &ProjectLayout) -> anyhow::Result<bool> {
    let config_path = layout.resolve_config(&cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    if cli.list_rules {
        for name in config.rule_names() {
            println!("{}", name);
        }
        return Ok(true);
    }

    if cli.show_config {
        print!("{}", config.to_toml_string()?);
        return Ok(true);
    }

    if let [source, archive] = cli.compare.as_slice() {
        let checker = EquivalenceChecker::seven_zip(
            &config.manifest.seven_zip_filepath,
            config.manifest.hash_algorithm,
        );
        return match checker.check(source, archive)? {
            Equivalence::Equivalent => {
                println!("Archive matches source");
                Ok(true)
            }
            Equivalence::Different(report) => {
                print!("{}", report);
                Ok(false)
            }
        };
    }

    let selection =
        if cli.run_all { RuleSelection::All } else { RuleSelection::Named(cli.run_rules) };

    let runner = BackupRunner::new(config, layout);
    let summary = runner.run(&selection)?;

    for failure in &summary.failed {
        tracing::error!("Rule '{}' failed: {}", failure.rule, failure.errors.join("; "));
    }

    if summary.is_success() {
        tracing::info!("All processes complete: prefbak operation finished successfully");
    } else {
        tracing::error!("process ended with errors");
    }

    Ok(summary.is_success())
}
