//! fepdb - stage/status ledger and driver for batch free-energy pipelines
//!
//! Each tracked directory is one ligand/protein work item moving through five
//! stages (MD preparation, MD, FEP preparation, FEP, result processing). Its
//! progress is kept in a single SQLite table, and every invocation of `run`
//! advances each item by at most one step, so the tool is meant to be called
//! periodically (e.g. from cron). Runs must not overlap on the same database.
//!
//! This library provides:
//! - Database connection and migrations
//! - Record models and the record repository
//! - The Slurm scheduler client
//! - Stage handlers that write and launch GROMACS scripts
//! - The orchestration engine
//! - Administrative operations and the CLI
//!
//! # Example
//!
//! ```no_run
//! use fepdb::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod db;
pub mod models;
pub mod repo;
pub mod config;
pub mod scheduler;
pub mod stages;
pub mod engine;
pub mod admin;
pub mod cli;
pub mod utils;
