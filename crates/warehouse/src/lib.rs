//! The warehouse client: a thin, async wrapper around the target SQL
//! engine. The control plane submits statements and streams results
//! through the `Warehouse` trait; the embedded SQLite executor backs the
//! file-local `sandbox` target, and the managed `dev` target dispatches
//! through the same trait once its credential gate passes.

mod connect;
mod sqlite;

pub use connect::{connect, ConnectOpts, Target, CREDENTIAL_VAR, MANAGED_PATH_VAR};
pub use sqlite::SqliteWarehouse;

use sqlgen::Relation;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("warehouse statement failed")]
    Sqlite(#[from] rusqlite::Error),
    #[error("relation {relation:?} does not exist")]
    UnknownRelation { relation: String },
    #[error("missing required credential {var} for the managed warehouse target")]
    MissingCredential { var: &'static str },
    #[error("failed to prepare warehouse data directory {path}")]
    DataDir {
        path: String,
        #[source]
        err: std::io::Error,
    },
    #[error("warehouse worker thread failed")]
    Join(#[from] tokio::task::JoinError),
}

/// One scalar of a query result row.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(value) => Some(*value),
            Value::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

pub type Row = Vec<Value>;

/// The statement-level contract every target implements.
///
/// Statements issued by different orchestrator invocations against the same
/// warehouse must be safely serializable; the client does not add locking
/// beyond what the engine provides. Every method may block on the engine,
/// and callers wrap calls in deadlines.
#[async_trait::async_trait]
pub trait Warehouse: Send + Sync {
    /// Execute a single statement, returning affected rows.
    async fn execute(&self, stmt: &str) -> Result<u64, Error>;

    /// Execute a query, returning its rows.
    async fn query(&self, stmt: &str) -> Result<Vec<Row>, Error>;

    /// Column names and declared types of a relation.
    async fn describe(&self, relation: &str) -> Result<Vec<(String, String)>, Error>;

    /// Tables and views within a logical schema namespace.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, Error>;

    /// Run statements inside one transaction: commit on success, rollback
    /// on any failure path.
    async fn transactional(&self, stmts: &[String]) -> Result<(), Error>;

    /// The transactional merge primitive: insert `source` rows absent from
    /// `target` under `match_predicate` (aliases `t` and `s`). Layered over
    /// `execute`; the engine's statement-level atomicity applies.
    async fn merge(
        &self,
        target: &str,
        source: &str,
        match_predicate: &str,
        insert_columns: &[String],
    ) -> Result<u64, Error> {
        let sql = sqlgen::merge_sql(
            &Relation::new(target),
            &Relation::new(source),
            match_predicate,
            insert_columns,
        );
        self.execute(&sql).await
    }

    /// Best-effort abort of the in-flight statement, used on deadline
    /// expiry. Targets without abort support ignore it.
    fn interrupt(&self) {}
}
