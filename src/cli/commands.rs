use clap::{ArgAction, Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use crate::admin::{self, AddOutcome, RemoveOutcome};
use crate::cli::error::{user_error, warn_item};
use crate::cli::output::{format_dump_json, format_dump_report, format_dump_table, format_pass_report, get_terminal_width, is_tty, stage_label, status_label};
use crate::config::PipelineConfig;
use crate::db::DbConnection;
use crate::engine::Engine;
use crate::repo::RecordRepo;
use crate::scheduler::SlurmScheduler;
use crate::stages::Pipeline;
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "fepdb")]
#[command(about = "Stage/status ledger and driver for batch free-energy pipelines")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Ledger database file; work item directories live next to it
    #[arg(long, value_name = "FILE")]
    pub db: PathBuf,
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Track directories, starting each at the paired stage
    Add {
        /// Directories (comma-separated)
        #[arg(value_delimiter = ',', required = true)]
        directories: Vec<String>,
        /// Starting stage per directory, 1-5 (comma-separated)
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        stage: Vec<String>,
        /// Reset directories that are already tracked, cancelling their jobs
        #[arg(long)]
        force: bool,
    },
    /// Stop tracking directories
    Remove {
        /// Directories (comma-separated)
        #[arg(value_delimiter = ',', required = true)]
        directories: Vec<String>,
        /// Remove even if jobs are running, cancelling them
        #[arg(long)]
        force: bool,
    },
    /// Advance every tracked directory by one step
    Run,
    /// Show all tracked directories
    Dump {
        /// Write a `directory ; stage ; status ; jobIDs` report to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show one tracked directory
    Show {
        directory: String,
    },
}

/// Initialize logging from -v flags, letting RUST_LOG take precedence
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .try_init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run_with_cli(cli)
}

pub fn run_with_cli(cli: Cli) -> Result<()> {
    let conn = DbConnection::open(&cli.db)
        .context("Failed to connect to database")?;
    let root = DbConnection::pipeline_root(&cli.db)?;
    log::debug!("Pipeline root: {}", root.display());

    match cli.command {
        Commands::Add { directories, stage, force } => handle_add(&conn, &cli.db, directories, stage, force),
        Commands::Remove { directories, force } => handle_remove(&conn, directories, force),
        Commands::Run => handle_run(&conn, &root),
        Commands::Dump { output, json } => handle_dump(&conn, output, json),
        Commands::Show { directory } => handle_show(&conn, &directory),
    }
}

fn handle_add(conn: &Connection, db: &Path, directories: Vec<String>, stages: Vec<String>, force: bool) -> Result<()> {
    // Whole request is rejected before anything is written
    let requests = admin::parse_add_requests(&directories, &stages)?;
    let scheduler = SlurmScheduler::new();
    let mut refused = 0;

    for request in &requests {
        match admin::add(conn, &scheduler, request, force)? {
            AddOutcome::Added => {
                println!("Added '{}' at stage {}", request.directory, request.stage);
            }
            AddOutcome::Reset { cancelled } => {
                if !cancelled.is_empty() {
                    println!("Cancelled jobs {} of '{}'", cancelled, request.directory);
                }
                println!("Reset '{}' to stage {}", request.directory, request.stage);
            }
            AddOutcome::Exists => {
                refused += 1;
                warn_item(&format!("'{}' is already tracked.", request.directory));
                eprintln!(
                    "  Run `fepdb --db {} add {} --stage {} --force` to reset it,",
                    db.display(), request.directory, request.stage
                );
                eprintln!(
                    "  or remove it first with `fepdb --db {} remove {}`.",
                    db.display(), request.directory
                );
            }
            AddOutcome::InvalidStage(raw) => {
                refused += 1;
                warn_item(&format!(
                    "stage '{}' for '{}' is out of range (expected 1-5), skipping",
                    raw, request.directory
                ));
            }
            AddOutcome::InvalidDirectory(message) => {
                refused += 1;
                warn_item(&format!("{}, skipping", message));
            }
        }
    }

    if refused > 0 {
        user_error(&format!("{} of {} request(s) not applied", refused, requests.len()));
    }
    Ok(())
}

fn handle_remove(conn: &Connection, directories: Vec<String>, force: bool) -> Result<()> {
    let scheduler = SlurmScheduler::new();
    let mut refused = 0;

    for directory in directories.iter().map(|d| d.trim()) {
        match admin::remove(conn, &scheduler, directory, force)? {
            RemoveOutcome::Removed { cancelled } => {
                if !cancelled.is_empty() {
                    println!("Cancelled jobs {} of '{}'", cancelled, directory);
                }
                println!("Removed '{}'", directory);
            }
            RemoveOutcome::NotFound => {
                refused += 1;
                warn_item(&format!("'{}' is not tracked", directory));
            }
            RemoveOutcome::InProgress => {
                refused += 1;
                warn_item(&format!("'{}' is in progress. Use --force to cancel its jobs and remove it.", directory));
            }
        }
    }

    if refused > 0 {
        user_error(&format!("{} of {} removal(s) not applied", refused, directories.len()));
    }
    Ok(())
}

fn handle_run(conn: &Connection, root: &Path) -> Result<()> {
    let config = PipelineConfig::load(root)?;
    let scheduler = SlurmScheduler::new();
    let pipeline = Pipeline::new(&config, &scheduler);

    let report = Engine::new(conn, &pipeline, root).run_pass()?;

    print!("{}", format_pass_report(&report));
    for failure in &report.errors {
        eprintln!("Error: {}: {}", failure.directory, failure.message);
    }
    Ok(())
}

fn handle_dump(conn: &Connection, output: Option<PathBuf>, json: bool) -> Result<()> {
    let rows = RecordRepo::list_all(conn)?;

    let content = if json {
        let mut json = format_dump_json(&rows)?;
        json.push('\n');
        json
    } else if output.is_some() {
        format_dump_report(&rows)
    } else {
        format_dump_table(&rows, is_tty(), get_terminal_width())
    };

    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            println!("Wrote {} record(s) to {}", rows.len(), path.display());
        }
        None if json => print!("{}", content),
        None => println!("{}", content.trim_end()),
    }
    Ok(())
}

fn handle_show(conn: &Connection, directory: &str) -> Result<()> {
    let row = match RecordRepo::get_row(conn, directory)? {
        Some(row) => row,
        None => user_error(&format!("'{}' is not tracked", directory)),
    };

    println!("Directory: {}", row.directory);
    println!("Stage:     {} ({})", stage_label(row.stage), row.stage);
    println!("Status:    {} ({})", status_label(row.status), row.status);
    if !row.job_ids.is_empty() {
        println!("Job IDs:   {}", row.job_ids);
    }
    Ok(())
}
