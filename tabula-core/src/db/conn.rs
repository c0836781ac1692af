//! Connection management.
//!
//! One [`Database`] wraps the single physical SQLite connection behind a
//! mutex. Concurrent callers queue on the lock rather than interleaving
//! statements, because the engine does not support concurrent writers on a
//! single connection. WAL mode and a busy timeout keep lock contention
//! manageable; for true pooling reach for `r2d2-rusqlite` or
//! `deadpool-sqlite` instead of this type.

use crate::config::DatabaseConfig;
use crate::db::value::{Record, Value};
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::cell::Cell;
use std::sync::{Mutex, MutexGuard};

thread_local! {
    // Set while a transaction scope runs on this thread. Re-entrant
    // Database calls inside a scope would deadlock on the mutex, so they
    // are rejected up front.
    static IN_SCOPE: Cell<bool> = Cell::new(false);
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows affected by the statement
    pub rows_affected: usize,
    /// Rowid generated by the most recent successful INSERT on the
    /// connection
    pub last_insert_id: i64,
}

/// Statement execution seam shared by [`Database`] and [`Transaction`],
/// so model operations run identically standalone or inside a scope.
pub trait Executor {
    /// Runs a non-returning statement with positional parameters.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Runs a statement expected to return at most one row.
    fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>>;

    /// Runs a statement returning zero or more rows, in store order.
    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>>;
}

/// Handle to the single embedded database file.
///
/// Construct one per process at startup and share it; all models route
/// their statements through the same handle.
pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create the database file named by the config, applying the
    /// configured pragmas. The parent directory is created if absent.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Connection(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let conn = Connection::open(&config.path).map_err(|e| {
            Error::Connection(format!("cannot open {}: {e}", config.path.display()))
        })?;
        apply_pragmas(&conn, config)?;

        tracing::info!(path = %config.path.display(), "database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::Connection(e.to_string()))?;
        apply_pragmas(&conn, &DatabaseConfig::default())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Close the handle, releasing the file. Consuming `self` makes a
    /// double close unrepresentable; dropping without calling this also
    /// releases the connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close()
            .map_err(|(_, e)| Error::Connection(e.to_string()))
    }

    /// Whether a table of the given name exists in the database.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let row = self.fetch_one(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[Value::from(table)],
        )?;
        Ok(row.is_some())
    }

    /// Runs `f` inside a transaction scope. The scope commits when `f`
    /// returns `Ok` and rolls back when it returns `Err` or panics, so
    /// every exit path ends the transaction.
    ///
    /// The connection lock is held for the whole scope; keep scopes short.
    /// Opening a scope inside another scope on the same thread fails with
    /// [`Error::State`].
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        if IN_SCOPE.with(Cell::get) {
            return Err(Error::State("transaction scopes cannot nest".to_string()));
        }

        let mut conn = self.lock();
        let tx = conn.transaction().map_err(Error::from)?;

        IN_SCOPE.with(|flag| flag.set(true));
        let _reset = ScopeReset;

        let scope = Transaction { tx };
        match f(&scope) {
            Ok(value) => {
                scope.tx.commit().map_err(Error::from)?;
                Ok(value)
            }
            Err(e) => {
                // Dropping the inner transaction rolls it back.
                drop(scope);
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A panic in a previous critical section left the mutex
                // poisoned; the connection itself is still usable.
                tracing::warn!("connection mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn check_outside_scope(&self) -> Result<()> {
        if IN_SCOPE.with(Cell::get) {
            return Err(Error::State(
                "database call inside an open transaction scope; use the scope handle"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Executor for Database {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.check_outside_scope()?;
        execute_on(&self.lock(), sql, params)
    }

    fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>> {
        self.check_outside_scope()?;
        fetch_one_on(&self.lock(), sql, params)
    }

    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        self.check_outside_scope()?;
        fetch_all_on(&self.lock(), sql, params)
    }
}

/// Scoped unit of work created by [`Database::transaction`].
pub struct Transaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl Executor for Transaction<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        execute_on(&self.tx, sql, params)
    }

    fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>> {
        fetch_one_on(&self.tx, sql, params)
    }

    fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        fetch_all_on(&self.tx, sql, params)
    }
}

struct ScopeReset;

impl Drop for ScopeReset {
    fn drop(&mut self) {
        IN_SCOPE.with(|flag| flag.set(false));
    }
}

fn apply_pragmas(conn: &Connection, config: &DatabaseConfig) -> Result<()> {
    let map = |e: rusqlite::Error| Error::Connection(e.to_string());

    if config.enforce_foreign_keys {
        conn.pragma_update(None, "foreign_keys", "ON").map_err(map)?;
    }
    conn.pragma_update(None, "busy_timeout", config.busy_timeout_ms as i64)
        .map_err(map)?;
    // journal_mode returns the resulting mode as a row; in-memory databases
    // report "memory" instead of "wal", so the result is not checked.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    Ok(())
}

fn execute_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<ExecResult> {
    let rows_affected = conn
        .execute(sql, rusqlite::params_from_iter(params.iter()))
        .map_err(Error::from)?;
    Ok(ExecResult {
        rows_affected,
        last_insert_id: conn.last_insert_rowid(),
    })
}

fn fetch_one_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<Option<Record>> {
    let mut records = fetch_all_on(conn, sql, params)?;
    if records.is_empty() {
        Ok(None)
    } else {
        Ok(Some(records.swap_remove(0)))
    }
}

fn fetch_all_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql).map_err(Error::from)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let mut rows = stmt
        .query(rusqlite::params_from_iter(params.iter()))
        .map_err(Error::from)?;

    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(Error::from)? {
        let mut record = Record::new();
        for (idx, name) in columns.iter().enumerate() {
            let value = Value::from(row.get_ref(idx).map_err(Error::from)?);
            record.set(name, value);
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn scratch() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.execute(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE)",
            &[],
        )
        .unwrap();
        db
    }

    #[test]
    fn execute_reports_rowid_and_count() {
        let db = scratch();
        let result = db
            .execute("INSERT INTO t (name) VALUES (?1)", &[Value::from("a")])
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_id, 1);
    }

    #[test]
    fn fetch_one_returns_none_when_missing() {
        let db = scratch();
        let row = db
            .fetch_one("SELECT id, name FROM t WHERE id = ?1", &[Value::from(99)])
            .unwrap();
        assert!(row.is_none());
    }

    #[test]
    fn fetch_all_preserves_store_order() {
        let db = scratch();
        for name in ["c", "a", "b"] {
            db.execute("INSERT INTO t (name) VALUES (?1)", &[Value::from(name)])
                .unwrap();
        }
        let rows = db.fetch_all("SELECT name FROM t", &[]).unwrap();
        let names: Vec<_> = rows
            .iter()
            .map(|r| r.get("name").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn malformed_sql_is_query_error() {
        let db = scratch();
        let err = db.execute("INSERT INTO nowhere VALUES (1)", &[]).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }

    #[test]
    fn unique_violation_is_constraint_error() {
        let db = scratch();
        db.execute("INSERT INTO t (name) VALUES ('a')", &[]).unwrap();
        let err = db
            .execute("INSERT INTO t (name) VALUES ('a')", &[])
            .unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn table_exists_probe() {
        let db = scratch();
        assert!(db.table_exists("t").unwrap());
        assert!(!db.table_exists("missing").unwrap());
    }

    #[test]
    fn pragmas_applied() {
        let config = DatabaseConfig::default();
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock();

        let fk: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);

        let timeout: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, config.busy_timeout_ms as i64);
    }

    #[test]
    fn transaction_commits_on_ok() {
        let db = scratch();
        db.transaction(|tx| {
            tx.execute("INSERT INTO t (name) VALUES ('a')", &[])?;
            tx.execute("INSERT INTO t (name) VALUES ('b')", &[])?;
            Ok(())
        })
        .unwrap();
        let rows = db.fetch_all("SELECT id FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let db = scratch();
        let result: Result<()> = db.transaction(|tx| {
            tx.execute("INSERT INTO t (name) VALUES ('a')", &[])?;
            tx.execute("INSERT INTO t (name) VALUES ('b')", &[])?;
            Err(Error::Query("boom".to_string()))
        });
        assert!(result.is_err());
        let rows = db.fetch_all("SELECT id FROM t", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn nested_transaction_is_state_error() {
        let db = scratch();
        let result: Result<()> = db.transaction(|_tx| db.transaction(|_inner| Ok(())));
        assert!(matches!(result, Err(Error::State(_))));
    }

    #[test]
    fn database_call_inside_scope_is_state_error() {
        let db = scratch();
        let result: Result<()> = db.transaction(|_tx| {
            db.execute("INSERT INTO t (name) VALUES ('a')", &[])?;
            Ok(())
        });
        assert!(matches!(result, Err(Error::State(_))));
    }

    #[test]
    fn concurrent_writers_queue() {
        let db = Arc::new(scratch());
        let mut handles = Vec::new();
        for i in 0..8 {
            let db = Arc::clone(&db);
            handles.push(thread::spawn(move || {
                db.execute(
                    "INSERT INTO t (name) VALUES (?1)",
                    &[Value::from(format!("worker-{i}"))],
                )
                .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let rows = db.fetch_all("SELECT id FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 8);
    }

    #[test]
    fn close_releases_connection() {
        let db = Database::open_in_memory().unwrap();
        db.close().unwrap();
    }
}
