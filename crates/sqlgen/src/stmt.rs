use super::{quote_ident, Relation, Select, SqlType};
use itertools::Itertools;

/// A typed column of a CREATE TABLE statement.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: SqlType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A query body: one SELECT, or a UNION ALL of CTE-free SELECTs.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    Select(Select),
    UnionAll(Vec<Select>),
}

impl Query {
    pub fn output_columns(&self) -> Vec<String> {
        match self {
            Query::Select(select) => select.output_columns(),
            Query::UnionAll(selects) => selects[0].output_columns(),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Query::Select(select) => select.render(),
            Query::UnionAll(selects) => selects.iter().map(Select::render).join("\nUNION ALL\n"),
        }
    }
}

/// A statement submitted to the warehouse.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    CreateTable {
        relation: Relation,
        columns: Vec<ColumnDef>,
        if_not_exists: bool,
    },
    CreateView {
        relation: Relation,
        query: Query,
    },
    DropTableIfExists {
        relation: Relation,
    },
    DropViewIfExists {
        relation: Relation,
    },
    InsertSelect {
        target: Relation,
        columns: Vec<String>,
        query: Query,
    },
    DeleteAll {
        relation: Relation,
    },
}

impl Statement {
    pub fn render(&self) -> String {
        match self {
            Statement::CreateTable {
                relation,
                columns,
                if_not_exists,
            } => {
                let head = if *if_not_exists {
                    "CREATE TABLE IF NOT EXISTS"
                } else {
                    "CREATE TABLE"
                };
                let body = columns
                    .iter()
                    .map(|c| format!("    {} {}", quote_ident(&c.name), c.ty.ddl()))
                    .join(",\n");
                format!("{head} {} (\n{body}\n)", relation.render())
            }
            Statement::CreateView { relation, query } => {
                format!("CREATE VIEW {} AS\n{}", relation.render(), query.render())
            }
            Statement::DropTableIfExists { relation } => {
                format!("DROP TABLE IF EXISTS {}", relation.render())
            }
            Statement::DropViewIfExists { relation } => {
                format!("DROP VIEW IF EXISTS {}", relation.render())
            }
            Statement::InsertSelect {
                target,
                columns,
                query,
            } => {
                let cols = columns.iter().map(|c| quote_ident(c)).join(", ");
                format!(
                    "INSERT INTO {} ({})\n{}",
                    target.render(),
                    cols,
                    query.render()
                )
            }
            Statement::DeleteAll { relation } => format!("DELETE FROM {}", relation.render()),
        }
    }
}

/// Render the push-circuit merge: an insert-only, set-oriented upsert of
/// `source` rows into `target`, keyed by `match_predicate` over aliases
/// `t` (target) and `s` (source). Re-execution against unchanged source
/// rows inserts nothing.
pub fn merge_sql(
    target: &Relation,
    source: &Relation,
    match_predicate: &str,
    insert_columns: &[String],
) -> String {
    let cols = insert_columns.iter().map(|c| quote_ident(c)).join(", ");
    let select_cols = insert_columns
        .iter()
        .map(|c| format!("\"s\".{}", quote_ident(c)))
        .join(", ");
    format!(
        "INSERT INTO {target} ({cols})\n\
         SELECT {select_cols}\n\
         FROM {source} AS \"s\"\n\
         WHERE NOT EXISTS (\n\
         \x20   SELECT 1 FROM {target} AS \"t\"\n\
         \x20   WHERE {match_predicate}\n\
         )",
        target = target.render(),
        source = source.render(),
    )
}
