// Admin operation tests: add/reset/remove and job cancellation

use doubles::*;

use fepdb::admin::{self, AddOutcome, AddRequest, RemoveOutcome};
use fepdb::db::DbConnection;
use fepdb::models::{JobIds, Stage, Status, TaskRecord};
use fepdb::repo::RecordRepo;
use rusqlite::Connection;

fn request(directory: &str, stage: &str) -> AddRequest {
    AddRequest {
        directory: directory.to_string(),
        stage: stage.to_string(),
    }
}

fn in_progress(conn: &Connection, directory: &str, stage: Stage, jobs: &str) {
    let mut record = TaskRecord::new(directory, stage).with_status(Status::InProgress);
    record.job_ids = JobIds::parse(jobs);
    RecordRepo::upsert(conn, &record).unwrap();
}

#[test]
fn test_add_new_record() {
    let conn = DbConnection::connect_in_memory().unwrap();
    let scheduler = FakeScheduler::new();

    let outcome = admin::add(&conn, &scheduler, &request("lig01", "2"), false).unwrap();
    assert_eq!(outcome, AddOutcome::Added);

    let record = RecordRepo::get(&conn, "lig01").unwrap().unwrap();
    assert_eq!(record, TaskRecord::new("lig01", Stage::Md));
}

#[test]
fn test_add_existing_without_force_leaves_record() {
    let conn = DbConnection::connect_in_memory().unwrap();
    let scheduler = FakeScheduler::new();
    in_progress(&conn, "lig01", Stage::FepProduction, "501;502");

    let outcome = admin::add(&conn, &scheduler, &request("lig01", "1"), false).unwrap();
    assert_eq!(outcome, AddOutcome::Exists);

    let record = RecordRepo::get(&conn, "lig01").unwrap().unwrap();
    assert_eq!(record.stage, Stage::FepProduction);
    assert_eq!(record.status, Status::InProgress);
    assert_eq!(record.job_ids.to_db_string(), "501;502");
    assert!(scheduler.cancelled.borrow().is_empty());
}

#[test]
fn test_force_add_cancels_jobs_and_resets() {
    let conn = DbConnection::connect_in_memory().unwrap();
    let scheduler = FakeScheduler::new();
    in_progress(&conn, "lig01", Stage::FepProduction, "501;502");

    let outcome = admin::add(&conn, &scheduler, &request("lig01", "3"), true).unwrap();
    assert_eq!(outcome, AddOutcome::Reset { cancelled: JobIds::parse("501;502") });
    assert_eq!(*scheduler.cancelled.borrow(), vec![JobIds::parse("501;502")]);

    let record = RecordRepo::get(&conn, "lig01").unwrap().unwrap();
    assert_eq!(record, TaskRecord::new("lig01", Stage::FepPreparation));
}

#[test]
fn test_force_add_on_failed_record_cancels_nothing() {
    let conn = DbConnection::connect_in_memory().unwrap();
    let scheduler = FakeScheduler::new();
    RecordRepo::upsert(&conn, &TaskRecord::new("lig01", Stage::Md).with_status(Status::Failed)).unwrap();

    let outcome = admin::add(&conn, &scheduler, &request("lig01", "2"), true).unwrap();
    assert_eq!(outcome, AddOutcome::Reset { cancelled: JobIds::new() });
    assert!(scheduler.cancelled.borrow().is_empty());
    assert_eq!(RecordRepo::get(&conn, "lig01").unwrap().unwrap().status, Status::NotStarted);
}

#[test]
fn test_force_add_repairs_corrupt_row() {
    let conn = DbConnection::connect_in_memory().unwrap();
    let scheduler = FakeScheduler::new();
    conn.execute(
        "INSERT INTO tasks_control (directory, stage, status, taskID) VALUES ('lig01', 0, 17, '')",
        [],
    )
    .unwrap();
    assert!(RecordRepo::get(&conn, "lig01").is_err());

    admin::add(&conn, &scheduler, &request("lig01", "1"), true).unwrap();
    let record = RecordRepo::get(&conn, "lig01").unwrap().unwrap();
    assert_eq!(record, TaskRecord::new("lig01", Stage::MdPreparation));
}

#[test]
fn test_add_rejects_bad_stage_and_directory() {
    let conn = DbConnection::connect_in_memory().unwrap();
    let scheduler = FakeScheduler::new();

    assert_eq!(
        admin::add(&conn, &scheduler, &request("lig01", "6"), false).unwrap(),
        AddOutcome::InvalidStage("6".to_string())
    );
    assert!(matches!(
        admin::add(&conn, &scheduler, &request("../lig01", "1"), false).unwrap(),
        AddOutcome::InvalidDirectory(_)
    ));
    assert!(RecordRepo::list_all(&conn).unwrap().is_empty());
}

#[test]
fn test_remove_in_progress_requires_force() {
    let conn = DbConnection::connect_in_memory().unwrap();
    let scheduler = FakeScheduler::new();
    in_progress(&conn, "lig01", Stage::Md, "77");

    let outcome = admin::remove(&conn, &scheduler, "lig01", false).unwrap();
    assert_eq!(outcome, RemoveOutcome::InProgress);
    assert!(RecordRepo::get(&conn, "lig01").unwrap().is_some());
    assert!(scheduler.cancelled.borrow().is_empty());

    let outcome = admin::remove(&conn, &scheduler, "lig01", true).unwrap();
    assert_eq!(outcome, RemoveOutcome::Removed { cancelled: JobIds::parse("77") });
    assert_eq!(*scheduler.cancelled.borrow(), vec![JobIds::parse("77")]);
    assert!(RecordRepo::get(&conn, "lig01").unwrap().is_none());
}

#[test]
fn test_remove_idle_and_missing() {
    let conn = DbConnection::connect_in_memory().unwrap();
    let scheduler = FakeScheduler::new();
    RecordRepo::upsert(&conn, &TaskRecord::new("lig01", Stage::Md)).unwrap();

    assert_eq!(
        admin::remove(&conn, &scheduler, "lig01", false).unwrap(),
        RemoveOutcome::Removed { cancelled: JobIds::new() }
    );
    assert_eq!(admin::remove(&conn, &scheduler, "lig01", false).unwrap(), RemoveOutcome::NotFound);
}
