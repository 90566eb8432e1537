//! Integration tests against databases on disk.

use std::path::{Path, PathBuf};

use sqlkit_db::{
    params, Connection, ConnectionConfig, DbError, OpenDisposition, OpenFlags, Savepoint,
};
use tempfile::TempDir;

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn create_db(path: &Path) -> Connection {
    let conn = Connection::create(path_str(path), OpenDisposition::CreateIfMissing, OpenFlags::NONE)
        .expect("create db");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);")
        .expect("create table");
    conn
}

fn reopen(path: &Path) -> Connection {
    Connection::create(path_str(path), OpenDisposition::OpenExisting, OpenFlags::READ_WRITE)
        .expect("reopen db")
}

fn values(conn: &Connection) -> Vec<String> {
    let mut stmt = conn.prepare("SELECT v FROM t ORDER BY id").expect("prepare");
    let mut out = Vec::new();
    while stmt.step().expect("step") {
        out.push(stmt.get::<String>(0));
    }
    out
}

#[test]
fn test_open_existing_requires_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.sqlite");
    let err = Connection::create(path_str(&path), OpenDisposition::OpenExisting, OpenFlags::NONE)
        .unwrap_err();
    assert!(matches!(err, DbError::Open { .. }), "{err:?}");
    assert_eq!(err.code().map(|c| c.primary()), Some(14));
    assert!(!path.exists());
}

/// Exclusive creation refuses symlinked path components, so resolve the
/// temp dir first.
fn real_dir(dir: &TempDir) -> PathBuf {
    dir.path().canonicalize().expect("canonical temp dir")
}

#[test]
fn test_create_exclusive() {
    let dir = TempDir::new().expect("temp dir");
    let path = real_dir(&dir).join("fresh.sqlite");

    let conn = Connection::create(
        path_str(&path),
        OpenDisposition::CreateExclusive,
        OpenFlags::NONE,
    )
    .expect("create fresh db");
    conn.execute_batch("CREATE TABLE t (id INTEGER);").expect("create table");
    drop(conn);
    assert!(path.exists());

    let err = Connection::create(
        path_str(&path),
        OpenDisposition::CreateExclusive,
        OpenFlags::NONE,
    )
    .unwrap_err();
    assert_eq!(err.code().map(|c| c.primary()), Some(14));
}

#[cfg(unix)]
#[test]
fn test_create_exclusive_refuses_dangling_symlink() {
    let dir = TempDir::new().expect("temp dir");
    let root = real_dir(&dir);
    let target = root.join("target.sqlite");
    let link = root.join("link.sqlite");
    std::os::unix::fs::symlink(&target, &link).expect("symlink");

    let err = Connection::create(
        path_str(&link),
        OpenDisposition::CreateExclusive,
        OpenFlags::NONE,
    )
    .unwrap_err();
    assert!(matches!(err, DbError::Open { .. }), "{err:?}");
    assert_eq!(err.code().map(|c| c.primary()), Some(14));
    assert!(!target.exists());
}

#[test]
fn test_read_only_rejects_writes() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("ro.sqlite");
    drop(create_db(&path));

    let conn = Connection::create(path_str(&path), OpenDisposition::OpenExisting, OpenFlags::READ_ONLY)
        .expect("open read-only");
    let err = conn
        .execute("INSERT INTO t (v) VALUES (?1)", params!["nope"])
        .unwrap_err();
    assert!(matches!(err, DbError::Step { .. }), "{err:?}");
    // SQLITE_READONLY
    assert_eq!(err.code().map(|c| c.primary()), Some(8));
}

#[test]
fn test_uri_target() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("uri.sqlite");
    drop(create_db(&path));

    let uri = format!("file:{}?mode=ro", path_str(&path));
    let conn = Connection::create(&uri, OpenDisposition::OpenExisting, OpenFlags::URI)
        .expect("open uri");
    let err = conn.execute_batch("INSERT INTO t (v) VALUES ('x');").unwrap_err();
    assert_eq!(err.code().map(|c| c.primary()), Some(8));
}

#[test]
fn test_committed_savepoint_persists_across_reopen() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("commit.sqlite");
    {
        let conn = create_db(&path);
        let mut savepoint = Savepoint::begin(&conn, "write").expect("begin");
        conn.execute("INSERT INTO t (v) VALUES (?1)", params!["kept"])
            .expect("insert");
        savepoint.commit();
    }
    assert_eq!(values(&reopen(&path)), ["kept"]);
}

#[test]
fn test_dropped_savepoint_is_not_persisted() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("rollback.sqlite");
    {
        let conn = create_db(&path);
        let _savepoint = conn.savepoint("write").expect("begin");
        conn.execute("INSERT INTO t (v) VALUES (?1)", params!["lost"])
            .expect("insert");
    }
    assert!(values(&reopen(&path)).is_empty());
}

#[test]
fn test_autocommit_resumes_after_rollback() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("resume.sqlite");
    {
        let conn = create_db(&path);
        {
            let mut savepoint = conn.savepoint("discard").expect("begin");
            conn.execute("INSERT INTO t (v) VALUES (?1)", params!["lost"])
                .expect("insert");
            savepoint.rollback();
        }
        // No transaction is left open by the rolled-back savepoint.
        conn.execute("INSERT INTO t (v) VALUES (?1)", params!["after"])
            .expect("insert");
    }
    assert_eq!(values(&reopen(&path)), ["after"]);
}

#[test]
fn test_open_with_config() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.sqlite");
    drop(create_db(&path));

    let config: ConnectionConfig = serde_json::from_str(
        r#"{ "disposition": "open_existing", "read_only": true, "busy_timeout_ms": 250 }"#,
    )
    .expect("parse config");
    let conn = Connection::open_with_config(path_str(&path), &config).expect("open");
    let count = conn
        .query_row("SELECT COUNT(*) FROM t", &[], |stmt| Ok(stmt.get::<i64>(0)))
        .expect("count");
    assert_eq!(count, 0);
}

#[test]
fn test_connection_moves_between_threads() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("send.sqlite");
    let conn = create_db(&path);
    let handle = std::thread::spawn(move || {
        conn.execute("INSERT INTO t (v) VALUES (?1)", params!["moved"])
            .expect("insert");
        conn.last_insert_rowid()
    });
    assert_eq!(handle.join().expect("thread"), 1);
    assert_eq!(values(&reopen(&path)), ["moved"]);
}
