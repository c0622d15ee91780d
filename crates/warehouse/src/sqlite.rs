use super::{Error, Row, Value, Warehouse};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// The embedded executor backing the file-local sandbox target.
///
/// One connection guarded by a mutex: concurrent model materializations
/// serialize at the statement boundary, which also serializes merges into
/// shared master sinks.
#[derive(Clone)]
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<rusqlite::InterruptHandle>,
}

impl std::fmt::Debug for SqliteWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWarehouse").finish_non_exhaustive()
    }
}

impl SqliteWarehouse {
    pub fn open(path: &Path) -> Result<Self, Error> {
        Self::init(Connection::open(path)?)
    }

    /// An in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        // Prefer write-ahead log over rollback journal (less amplification).
        // In-memory databases report their own journal mode; accept either.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_row| Ok(()))?;

        // The push-circuit match key hashes payloads inside the engine.
        conn.create_scalar_function(
            "md5",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let input: Option<String> = ctx.get(0)?;
                Ok(input.map(|text| format!("{:x}", md5::compute(text.as_bytes()))))
            },
        )?;

        let interrupt = Arc::new(conn.get_interrupt_handle());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        })
    }

    fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
        // A poisoned mutex means a worker panicked mid-statement; the
        // connection itself remains usable.
        conn.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, Error> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&Self::lock(&conn))).await?
    }
}

fn value_of(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

#[async_trait::async_trait]
impl Warehouse for SqliteWarehouse {
    async fn execute(&self, stmt: &str) -> Result<u64, Error> {
        let stmt = stmt.to_string();
        self.blocking(move |conn| {
            tracing::trace!(statement = %stmt, "execute");
            Ok(conn.execute(&stmt, [])? as u64)
        })
        .await
    }

    async fn query(&self, stmt: &str) -> Result<Vec<Row>, Error> {
        let stmt = stmt.to_string();
        self.blocking(move |conn| {
            tracing::trace!(statement = %stmt, "query");
            let mut prepared = conn.prepare(&stmt)?;
            let width = prepared.column_count();
            let mut rows = prepared.query([])?;

            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut scanned = Vec::with_capacity(width);
                for index in 0..width {
                    scanned.push(value_of(row.get_ref(index)?));
                }
                out.push(scanned);
            }
            Ok(out)
        })
        .await
    }

    async fn describe(&self, relation: &str) -> Result<Vec<(String, String)>, Error> {
        let relation = relation.to_string();
        self.blocking(move |conn| {
            let mut prepared =
                conn.prepare(&format!("PRAGMA table_info({})", sqlgen::quote_ident(&relation)))?;
            let mut rows = prepared.query([])?;

            let mut columns = Vec::new();
            while let Some(row) = rows.next()? {
                let name: String = row.get(1)?;
                let ty: String = row.get(2)?;
                columns.push((name, ty));
            }
            if columns.is_empty() {
                return Err(Error::UnknownRelation { relation });
            }
            Ok(columns)
        })
        .await
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, Error> {
        let prefix = format!("{schema}__");
        self.blocking(move |conn| {
            let mut prepared = conn.prepare(
                "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') ORDER BY name",
            )?;
            let mut rows = prepared.query([])?;

            // Prefix-match in process: the prefix contains `_`, which the
            // engine's LIKE treats as a wildcard.
            let mut names = Vec::new();
            while let Some(row) = rows.next()? {
                let name: String = row.get(0)?;
                if name.starts_with(&prefix) {
                    names.push(name);
                }
            }
            Ok(names)
        })
        .await
    }

    async fn transactional(&self, stmts: &[String]) -> Result<(), Error> {
        let stmts = stmts.to_vec();
        self.blocking(move |conn| {
            // The transaction rolls back on drop unless committed, which
            // covers error returns and panics alike.
            let txn = conn.unchecked_transaction()?;
            for stmt in &stmts {
                txn.execute_batch(stmt)?;
            }
            txn.commit()?;
            Ok(())
        })
        .await
    }

    fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}
