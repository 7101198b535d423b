// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Store` — the single writer-owner for the relational database (CORE §5:
//! "Database writes are serialized through a single owner"). Every
//! mutation takes the connection mutex, runs inside a transaction, and
//! fires change listeners synchronously after commit.

use std::path::Path;
use std::sync::Arc;

use gobby_core::Result;
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::listeners::{ChangeListener, ListenerRegistry, TableOp};
use crate::schema;

/// Owns the single writable connection. Cloning a `Store` clones the `Arc`,
/// not the connection: every clone serializes through the same mutex.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Connection>>,
    listeners: Arc<ListenerRegistry>,
}

impl Store {
    /// Open (creating if absent) the database file at `path`, applying any
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        Self::configure(&mut conn)?;
        schema::run_migrations(&mut conn)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
            listeners: Arc::new(ListenerRegistry::new()),
        })
    }

    /// In-memory database, used by tests and by `gobby doctor --dry-run`.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::configure(&mut conn)?;
        schema::run_migrations(&mut conn)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
            listeners: Arc::new(ListenerRegistry::new()),
        })
    }

    fn configure(conn: &mut Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    pub fn register_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.register(listener);
    }

    /// Run `f` against the live connection inside a transaction. On success
    /// the transaction commits and any `TableOp`s pushed via
    /// [`WriteTx::notify`] are dispatched synchronously to registered
    /// listeners; on error the transaction rolls back and nothing fires.
    pub fn write<T>(&self, f: impl FnOnce(&mut WriteTx) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        let tx = guard.transaction()?;
        let mut wtx = WriteTx { tx, pending: Vec::new() };
        match f(&mut wtx) {
            Ok(value) => {
                let pending = std::mem::take(&mut wtx.pending);
                wtx.tx.commit()?;
                for op in pending {
                    self.listeners.notify(&op);
                }
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }

    /// Run `f` against the live connection with no transaction, for reads.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.inner.lock();
        f(&guard)
    }
}

/// A connection borrowed for the duration of one [`Store::write`] call.
/// Repository methods take `&mut WriteTx` and call [`WriteTx::notify`] for
/// each row they change so listeners see a consistent post-commit view.
pub struct WriteTx<'conn> {
    pub(crate) tx: rusqlite::Transaction<'conn>,
    pending: Vec<TableOp>,
}

impl<'conn> WriteTx<'conn> {
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    pub fn notify(&mut self, op: TableOp) {
        self.pending.push(op);
    }
}

/// Translate a `rusqlite` constraint violation into `gobby_core::Error::Conflict`;
/// everything else passes through the blanket `From<rusqlite::Error>` impl.
pub(crate) fn map_write_err(err: rusqlite::Error, context: &str) -> gobby_core::Error {
    use rusqlite::ffi::ErrorCode;
    if let rusqlite::Error::SqliteFailure(ref sqlite_err, _) = err {
        if sqlite_err.code == ErrorCode::ConstraintViolation {
            return gobby_core::Error::conflict(format!("{context}: {err}"));
        }
    }
    gobby_core::Error::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_migrations() {
        let store = Store::open_in_memory().unwrap();
        let count: i64 = store
            .read(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
            .unwrap();
        assert!(count > 0);
    }

    #[test]
    fn failed_write_rolls_back_and_suppresses_notify() {
        let store = Store::open_in_memory().unwrap();
        let listener = Arc::new(crate::listeners::tests::RecordingListener::default());
        store.register_listener(listener.clone());

        let result: Result<()> = store.write(|tx| {
            tx.conn().execute(
                "INSERT INTO projects (id, name, repo_path, created_at_ms) VALUES ('p1','n','/r',0)",
                [],
            )?;
            tx.notify(TableOp::Insert { table: "projects".into(), id: "p1".into() });
            Err(gobby_core::Error::internal("boom"))
        });
        assert!(result.is_err());
        assert!(listener.seen().is_empty());

        let count: i64 = store
            .read(|conn| Ok(conn.query_row("SELECT count(*) FROM projects", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn successful_write_commits_and_notifies() {
        let store = Store::open_in_memory().unwrap();
        let listener = Arc::new(crate::listeners::tests::RecordingListener::default());
        store.register_listener(listener.clone());

        store
            .write(|tx| {
                tx.conn().execute(
                    "INSERT INTO projects (id, name, repo_path, created_at_ms) VALUES ('p1','n','/r',0)",
                    [],
                )?;
                tx.notify(TableOp::Insert { table: "projects".into(), id: "p1".into() });
                Ok(())
            })
            .unwrap();

        assert_eq!(listener.seen().len(), 1);
    }
}
