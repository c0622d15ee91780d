//! A small SQL AST and deterministic renderer.
//!
//! Every statement the control plane submits to the warehouse is assembled
//! through these types rather than ad-hoc string concatenation. The renderer
//! is deliberately boring: stable column order in, byte-identical SQL out,
//! which is what lets generated artifacts be compared and snapshotted.

mod expr;
mod select;
mod stmt;

pub use expr::Expr;
pub use select::{FromItem, Join, JoinKind, OrderBy, Select, SelectColumn};
pub use stmt::{merge_sql, ColumnDef, Query, Statement};

/// Scalar types which generated columns may declare.
///
/// These are rendered as-is into DDL. The embedded engine applies its own
/// affinity rules, while managed engines take them literally.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SqlType {
    Varchar,
    Integer,
    BigInt,
    Double,
    Boolean,
    Date,
    Timestamp,
    Json,
}

impl SqlType {
    pub fn ddl(&self) -> &'static str {
        match self {
            SqlType::Varchar => "VARCHAR",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Json => "JSON",
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ddl())
    }
}

/// A named relation, optionally namespaced.
///
/// The warehouse presents a single flat namespace, so a namespaced relation
/// renders as one `{schema}__{name}` identifier. The logical address
/// `tenant.table` and the physical identifier are interconvertible.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Relation {
    schema: Option<String>,
    name: String,
}

impl Relation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn namespaced(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// The flat physical identifier of this relation.
    pub fn ident(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}__{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub(crate) fn render(&self) -> String {
        quote_ident(&self.ident())
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.ident())
    }
}

/// Quote an identifier, doubling any embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a text literal, doubling any embedded single quotes.
pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relation_idents_are_flat_and_quoted() {
        let plain = Relation::new("connector_blueprints");
        assert_eq!(plain.ident(), "connector_blueprints");
        assert_eq!(plain.render(), "\"connector_blueprints\"");

        let namespaced = Relation::namespaced("tyrell_corp", "shopify_orders");
        assert_eq!(namespaced.ident(), "tyrell_corp__shopify_orders");
        assert_eq!(namespaced.render(), "\"tyrell_corp__shopify_orders\"");
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_text("it's"), "'it''s'");
    }
}
