// Integration tests for the fepdb CLI
// These run the binary end-to-end against a database in a temp directory

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use fepdb::db::DbConnection;
use fepdb::models::{Stage, Status, TaskRecord};
use fepdb::repo::RecordRepo;

fn setup_test_env() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tasks.db");
    (temp_dir, db_path)
}

/// Command against the test database, isolated from the user's config
fn new_cmd(temp_dir: &TempDir, db_path: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("fepdb").unwrap();
    cmd.env("HOME", temp_dir.path())
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(db_path);
    cmd
}

fn seed(db_path: &PathBuf, record: &TaskRecord) {
    let conn = DbConnection::open(db_path).unwrap();
    RecordRepo::upsert(&conn, record).unwrap();
}

fn stored(db_path: &PathBuf, directory: &str) -> Option<TaskRecord> {
    let conn = DbConnection::open(db_path).unwrap();
    RecordRepo::get(&conn, directory).unwrap()
}

// ============================================================================
// add / remove
// ============================================================================

#[test]
fn test_add_and_dump() {
    let (temp_dir, db_path) = setup_test_env();

    new_cmd(&temp_dir, &db_path)
        .args(["add", "lig01,lig02", "--stage", "1,3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 'lig01' at stage 1"))
        .stdout(predicate::str::contains("Added 'lig02' at stage 3"));

    new_cmd(&temp_dir, &db_path)
        .arg("dump")
        .assert()
        .success()
        .stdout(predicate::str::contains("Current status:"))
        .stdout(predicate::str::contains("lig01"))
        .stdout(predicate::str::contains("FEP preparation"))
        .stdout(predicate::str::contains("Not started"));
}

#[test]
fn test_add_mismatched_lists_writes_nothing() {
    let (temp_dir, db_path) = setup_test_env();

    new_cmd(&temp_dir, &db_path)
        .args(["add", "lig01,lig02", "--stage", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("same number of entries"));

    assert!(stored(&db_path, "lig01").is_none());
    assert!(stored(&db_path, "lig02").is_none());
}

#[test]
fn test_add_existing_requires_force() {
    let (temp_dir, db_path) = setup_test_env();
    seed(&db_path, &TaskRecord::new("lig01", Stage::Md).with_status(Status::Failed));

    new_cmd(&temp_dir, &db_path)
        .args(["add", "lig01", "--stage", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already tracked"))
        .stderr(predicate::str::contains("--force"));
    assert_eq!(stored(&db_path, "lig01").unwrap().status, Status::Failed);

    new_cmd(&temp_dir, &db_path)
        .args(["add", "lig01", "--stage", "1", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reset 'lig01' to stage 1"));
    assert_eq!(stored(&db_path, "lig01").unwrap(), TaskRecord::new("lig01", Stage::MdPreparation));
}

#[test]
fn test_add_invalid_stage_keeps_going() {
    let (temp_dir, db_path) = setup_test_env();

    new_cmd(&temp_dir, &db_path)
        .args(["add", "lig01,lig02", "--stage", "7,2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("out of range"));

    assert!(stored(&db_path, "lig01").is_none());
    assert_eq!(stored(&db_path, "lig02").unwrap(), TaskRecord::new("lig02", Stage::Md));
}

#[test]
fn test_remove() {
    let (temp_dir, db_path) = setup_test_env();
    seed(&db_path, &TaskRecord::new("lig01", Stage::Md));

    new_cmd(&temp_dir, &db_path)
        .args(["remove", "lig01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 'lig01'"));
    assert!(stored(&db_path, "lig01").is_none());

    new_cmd(&temp_dir, &db_path)
        .args(["remove", "lig01"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not tracked"));
}

// ============================================================================
// dump / show
// ============================================================================

#[test]
fn test_dump_report_file() {
    let (temp_dir, db_path) = setup_test_env();
    seed(&db_path, &TaskRecord::new("a", Stage::MdPreparation));
    seed(&db_path, &TaskRecord::new("b", Stage::FepPreparation).with_status(Status::Done));
    let report = temp_dir.path().join("status.txt");

    new_cmd(&temp_dir, &db_path)
        .args(["dump", "--output"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 record(s)"));

    let content = fs::read_to_string(&report).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec![
        "a ; MD preparation ; Not started ; ",
        "b ; FEP preparation ; Done ; ",
    ]);
}

#[test]
fn test_dump_json() {
    let (temp_dir, db_path) = setup_test_env();
    seed(&db_path, &TaskRecord::new("lig01", Stage::Md));

    let output = new_cmd(&temp_dir, &db_path)
        .args(["dump", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["directory"], "lig01");
}

#[test]
fn test_dump_empty() {
    let (temp_dir, db_path) = setup_test_env();
    new_cmd(&temp_dir, &db_path)
        .arg("dump")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks tracked."));
}

#[test]
fn test_show() {
    let (temp_dir, db_path) = setup_test_env();
    seed(&db_path, &TaskRecord::new("lig01", Stage::FepProduction));

    new_cmd(&temp_dir, &db_path)
        .args(["show", "lig01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Directory: lig01"))
        .stdout(predicate::str::contains("Stage:     FEP (4)"));

    new_cmd(&temp_dir, &db_path)
        .args(["show", "lig99"])
        .assert()
        .code(1);
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_reports_missing_work_dir() {
    let (temp_dir, db_path) = setup_test_env();
    seed(&db_path, &TaskRecord::new("lig01", Stage::MdPreparation));

    new_cmd(&temp_dir, &db_path)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 advanced"))
        .stdout(predicate::str::contains("1 error(s)"))
        .stderr(predicate::str::contains("lig01"))
        .stderr(predicate::str::contains("does not exist"));

    assert_eq!(stored(&db_path, "lig01").unwrap().status, Status::NotStarted);
}

#[test]
fn test_run_rolls_done_forward() {
    let (temp_dir, db_path) = setup_test_env();
    seed(&db_path, &TaskRecord::new("lig01", Stage::Md).with_status(Status::Done));
    seed(&db_path, &TaskRecord::new("lig02", Stage::ResultProcessing).with_status(Status::Done));

    new_cmd(&temp_dir, &db_path)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("lig01: MD / Done -> FEP preparation / Not started"))
        .stdout(predicate::str::contains("1 advanced"));

    assert_eq!(stored(&db_path, "lig01").unwrap(), TaskRecord::new("lig01", Stage::FepPreparation));
    assert_eq!(stored(&db_path, "lig02").unwrap().status, Status::Done);
}

#[test]
fn test_run_rejects_bad_config() {
    let (temp_dir, db_path) = setup_test_env();
    fs::write(temp_dir.path().join("fepdb.rc"), "fep.frames=0\n").unwrap();

    new_cmd(&temp_dir, &db_path)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("fep.frames"));
}

#[test]
fn test_run_rejects_frames_not_matching_array() {
    let (temp_dir, db_path) = setup_test_env();
    fs::write(temp_dir.path().join("fepdb.rc"), "fep.array_size=4\n").unwrap();

    new_cmd(&temp_dir, &db_path)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must equal fep.array_size"));
}

#[test]
fn test_requires_db_argument() {
    Command::cargo_bin("fepdb")
        .unwrap()
        .arg("dump")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--db"));
}
