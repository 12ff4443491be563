//! SWMA CLI
//!
//! Command-line tool for applying declarative ship changes to Empire at War
//! game data and restoring the pristine files.

use clap::{Parser, Subcommand};
use swma_core::{Project, RunOptions, RunStatus, Severity, STARTER_CONFIG};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swma")]
#[command(about = "Idempotent ship modifications for Empire at War", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file (YAML or JSON)
    #[arg(short, long, global = true, default_value = "swma.yaml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore all files from their baselines and apply the configuration
    Apply {
        /// Resolve and report without writing anything
        #[arg(long)]
        preview: bool,

        /// Write the diff summary as CSV
        #[arg(long)]
        diff_csv: Option<PathBuf>,

        /// Write the full run report as JSON
        #[arg(long)]
        report_json: Option<PathBuf>,
    },

    /// Restore pristine files without applying anything
    Reset {
        /// Only restore the files this unit's directives touch
        #[arg(short, long)]
        unit: Option<String>,

        /// Also discard the run history of the restored files
        #[arg(long)]
        clear_history: bool,
    },

    /// Capture the current files as the new pristine baselines
    Rebaseline {
        /// Confirm that the existing baselines should be discarded
        #[arg(long)]
        yes: bool,

        /// File ids to rebaseline (default: all)
        #[arg(short, long)]
        file: Vec<String>,
    },

    /// Show baseline history
    History {
        /// Only show this file id
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Create a starter configuration file
    InitConfig {
        /// Output path for the configuration
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG, when set, replaces the -v level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(cli.verbose)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn default_filter(verbose: u8) -> EnvFilter {
    EnvFilter::new(match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    })
}

fn run(cli: Cli) -> swma_core::Result<i32> {
    match cli.command {
        Commands::Apply {
            preview,
            diff_csv,
            report_json,
        } => cmd_apply(&cli.config, preview, diff_csv.as_deref(), report_json.as_deref()),
        Commands::Reset { unit, clear_history } => cmd_reset(&cli.config, unit.as_deref(), clear_history),
        Commands::Rebaseline { yes, file } => cmd_rebaseline(&cli.config, yes, &file),
        Commands::History { file } => cmd_history(&cli.config, file.as_deref()),
        Commands::InitConfig { output } => cmd_init_config(&output),
    }
}

fn cmd_apply(
    config: &Path,
    preview: bool,
    diff_csv: Option<&Path>,
    report_json: Option<&Path>,
) -> swma_core::Result<i32> {
    let project = Project::open(config)?;
    let mut engine = project.engine()?;
    let plan = project.config().plan();
    println!(
        "Loaded {} units, {} managed files ({:?} mode)",
        plan.units.len(),
        project.config().files.len(),
        plan.game_mode
    );

    let inputs = project.read_managed_files()?;
    let outcome = engine.run(&inputs, &plan, RunOptions { preview })?;
    let written = project.write_outcome(&outcome)?;

    println!();
    for file in &outcome.files {
        let marker = match (&file.failed, file.is_modified()) {
            (Some(_), _) => " [failed, left pristine]",
            (None, true) => "",
            (None, false) => " [pristine]",
        };
        println!("  {} ({} changes){}", file.file_id, file.changes.len(), marker);
        if preview {
            for change in &file.changes {
                println!(
                    "    {}/{}: {} -> {}",
                    change.entity,
                    change.attribute,
                    change.old.as_deref().unwrap_or("(none)"),
                    change.new.as_deref().unwrap_or("(removed)")
                );
            }
        }
    }

    if !outcome.report.issues.is_empty() {
        println!("\nSkipped ({}):", outcome.report.issues.len());
        for issue in &outcome.report.issues {
            let severity = match issue.severity {
                Severity::Warning => "warning",
                Severity::StageFailure => "failure",
            };
            println!("  [{}] {}: {}", severity, issue.scope, issue.message);
        }
    }

    if let Some(path) = diff_csv {
        outcome.report.save_csv(path)?;
        println!("\nDiff summary written to {}", path.display());
    }
    if let Some(path) = report_json {
        outcome.report.save_json(path)?;
        println!("Report written to {}", path.display());
    }

    let status = outcome.status();
    println!();
    match status {
        RunStatus::Success => println!("Applied {} changes, wrote {} files", outcome.report.applied.len(), written),
        RunStatus::PartialSuccess { warnings } => println!(
            "Applied {} changes with {} skipped, wrote {} files",
            outcome.report.applied.len(),
            warnings,
            written
        ),
        RunStatus::NothingChanged { warnings } if preview => {
            println!("Preview only: {} changes, {} skipped, nothing written", outcome.report.applied.len(), warnings)
        }
        RunStatus::NothingChanged { warnings } => println!("Nothing changed ({} skipped)", warnings),
    }

    Ok(status.exit_code())
}

fn cmd_reset(config: &Path, unit: Option<&str>, clear_history: bool) -> swma_core::Result<i32> {
    let project = Project::open(config)?;
    let mut engine = project.engine()?;
    let restored = engine.reset(&project.config().plan(), unit)?;
    let written = project.write_files(&restored)?;

    match unit {
        Some(unit) => println!("Restored {} files touched by '{}'", restored.len(), unit),
        None => println!("Restored {} files", restored.len()),
    }
    println!("  {} files rewritten", written);

    if clear_history {
        let mut removed = 0;
        for file in &restored {
            removed += engine.store_mut().reset(&file.file_id)?;
        }
        println!("  {} history snapshots discarded", removed);
    }

    Ok(0)
}

fn cmd_rebaseline(config: &Path, yes: bool, files: &[String]) -> swma_core::Result<i32> {
    if !yes {
        eprintln!("Rebaselining discards the pristine copies of the game files.");
        eprintln!("Make sure the files on disk are unmodified, then rerun with --yes.");
        return Ok(1);
    }

    let project = Project::open(config)?;
    let mut engine = project.engine()?;
    let ids: Vec<String> = if files.is_empty() {
        project.config().files.ids().map(str::to_string).collect()
    } else {
        files.to_vec()
    };

    let current = ids
        .iter()
        .map(|id| project.read_file(id))
        .collect::<swma_core::Result<Vec<_>>>()?;
    engine.rebaseline(&current)?;

    println!("Captured new baselines for {} files:", current.len());
    for file in &current {
        println!("  {} ({} bytes)", file.file_id, file.content.len());
    }

    Ok(0)
}

fn cmd_history(config: &Path, file: Option<&str>) -> swma_core::Result<i32> {
    let project = Project::open(config)?;
    let engine = project.engine()?;
    let ids = match file {
        Some(id) => vec![id.to_string()],
        None => engine.store().file_ids()?,
    };

    if ids.is_empty() {
        println!("No baselines captured yet.");
        return Ok(0);
    }

    for id in &ids {
        let pristine = engine.store().pristine(id)?;
        let history = engine.store().history(id)?;
        match pristine {
            Some(content) => println!("{} (pristine: {} bytes, {} snapshots)", id, content.len(), history.len()),
            None => println!("{} (no baseline, {} snapshots)", id, history.len()),
        }
        for snapshot in &history {
            println!("  {}  {} bytes", snapshot.taken_at.to_rfc3339(), snapshot.content.len());
        }
    }

    Ok(0)
}

fn cmd_init_config(output: &Path) -> swma_core::Result<i32> {
    if output.exists() {
        return Err(swma_core::Error::Config(format!(
            "'{}' already exists",
            output.display()
        )));
    }
    std::fs::write(output, STARTER_CONFIG).map_err(|source| swma_core::Error::FileWrite {
        path: output.to_path_buf(),
        source,
    })?;

    println!("Created configuration file: {}", output.display());
    println!();
    println!("Edit the file paths and units, then run:");
    println!("  swma --config {} apply --preview", output.display());

    Ok(0)
}
