use rusqlite::Connection;
use victoweb_core::db::migrations::{latest_version, migration_status, registered_migrations};
use victoweb_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "accounts",
        "sessions",
        "posts",
        "videos",
        "media",
        "chat_messages",
        "chat_tasks",
        "chat_task_items",
    ] {
        assert_table_exists(&conn, table);
    }
    assert!(migration_status(&conn).unwrap().is_current());
}

#[test]
fn migrations_are_registered_in_order() {
    let versions: Vec<u32> = registered_migrations()
        .into_iter()
        .map(|(version, _)| version)
        .collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert_eq!(latest_version(), 3);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("victoweb.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "media");
}

#[test]
fn upgrading_from_first_schema_backfills_post_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch(
        "PRAGMA user_version = 1;
         INSERT INTO accounts (username, password_hash) VALUES ('legacy', 'x');
         INSERT INTO posts (title, content, date, created_at)
         VALUES ('Old news', 'body', '2024-05-01', 1714521600000);",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let (slug, updated_at): (String, i64) = conn
        .query_row("SELECT slug, updated_at FROM posts;", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(slug, "post-1");
    assert_eq!(updated_at, 1_714_521_600_000);
    let role: String = conn
        .query_row("SELECT admin_role FROM accounts;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(role, "none");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
    assert!(conn
        .execute(
            "INSERT INTO chat_messages (author_id, body) VALUES (42, 'orphan');",
            [],
        )
        .is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
