//! Fail-fast paths terminate the process, so each scenario runs in a child
//! copy of this test binary and the parent inspects how it exited.

use std::process::{Command, ExitStatus};

use sqlkit_db::{Connection, OnError};

const CHILD_ENV: &str = "SQLKIT_FAIL_FAST_CHILD";

/// Re-runs this binary restricted to `test`, with the child gate set.
fn run_child(test: &str) -> ExitStatus {
    let exe = std::env::current_exe().expect("current test binary");
    Command::new(exe)
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, test)
        .status()
        .expect("spawn child")
}

fn is_child(test: &str) -> bool {
    std::env::var(CHILD_ENV).is_ok_and(|v| v == test)
}

fn assert_aborted(status: ExitStatus) {
    assert!(!status.success(), "child exited cleanly: {status:?}");
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // SIGABRT
        assert_eq!(status.signal(), Some(6), "{status:?}");
    }
}

fn open_with_unique_table() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(
        "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT UNIQUE);
         INSERT INTO t (v) VALUES ('dup');",
    )
    .expect("create table");
    conn
}

#[test]
fn child_step_abort_on_constraint() {
    if !is_child("child_step_abort_on_constraint") {
        return;
    }
    let conn = open_with_unique_table();
    let mut stmt = conn
        .prepare("INSERT INTO t (v) VALUES ('dup')")
        .expect("prepare");
    let _ = stmt.step_with(OnError::Abort);
    // Only reached if the failed step returned.
    std::process::exit(0);
}

#[test]
fn test_step_abort_terminates_process() {
    assert_aborted(run_child("child_step_abort_on_constraint"));
}

#[test]
fn child_step_abort_without_reset() {
    if !is_child("child_step_abort_without_reset") {
        return;
    }
    let conn = open_with_unique_table();
    let mut stmt = conn
        .prepare("INSERT INTO t (v) VALUES ('fresh')")
        .expect("prepare");
    stmt.execute().expect("insert");
    let _ = stmt.execute_with(OnError::Abort);
    std::process::exit(0);
}

#[test]
fn test_step_abort_without_reset_terminates_process() {
    assert_aborted(run_child("child_step_abort_without_reset"));
}

#[test]
fn child_savepoint_rollback_fails() {
    if !is_child("child_savepoint_rollback_fails") {
        return;
    }
    let conn = open_with_unique_table();
    let mut outer = conn.savepoint("outer").expect("begin outer");
    let inner = conn.savepoint("inner").expect("begin inner");
    // Releasing the outer savepoint also releases the inner one.
    outer.commit();
    // ROLLBACK TO "inner" now has no savepoint to roll back to.
    drop(inner);
    std::process::exit(0);
}

#[test]
fn test_failed_savepoint_rollback_terminates_process() {
    assert_aborted(run_child("child_savepoint_rollback_fails"));
}

#[test]
fn child_savepoint_commit_succeeds() {
    if !is_child("child_savepoint_commit_succeeds") {
        return;
    }
    let conn = open_with_unique_table();
    let mut outer = conn.savepoint("outer").expect("begin outer");
    {
        let mut inner = outer.savepoint("inner").expect("begin inner");
        inner.commit();
    }
    outer.commit();
}

#[test]
fn test_ordered_savepoint_resolution_exits_cleanly() {
    let status = run_child("child_savepoint_commit_succeeds");
    assert!(status.success(), "{status:?}");
}
