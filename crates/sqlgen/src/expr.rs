use super::{quote_ident, quote_text, SqlType};
use itertools::Itertools;

/// A scalar expression within a SELECT list, predicate, or cast.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A bare column reference.
    Column(String),
    /// A column reference qualified by a table alias.
    Qualified { table: String, column: String },
    /// A quoted text literal.
    Text(String),
    /// A numeric literal, carried verbatim.
    Number(String),
    /// Bare NULL.
    Null,
    /// A NULL cast to a declared type; the typed-empty building block.
    NullOf(SqlType),
    /// CAST(expr AS type).
    Cast { expr: Box<Expr>, ty: SqlType },
    /// json_extract(expr, '$.path').
    JsonExtract { expr: Box<Expr>, path: String },
    /// A function call.
    Func { name: String, args: Vec<Expr> },
    /// Infix binary operation.
    Binary {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    /// An opaque SQL fragment. Used for engine scalar logic (window frames,
    /// CASE arms) that the AST does not model; never for identifiers that
    /// originate outside the catalog.
    Raw(String),
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn qual(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Qualified {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::Text(value.into())
    }

    pub fn number(value: impl std::fmt::Display) -> Self {
        Expr::Number(value.to_string())
    }

    pub fn null_of(ty: SqlType) -> Self {
        Expr::NullOf(ty)
    }

    pub fn cast(expr: Expr, ty: SqlType) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            ty,
        }
    }

    pub fn json_extract(expr: Expr, path: impl Into<String>) -> Self {
        Expr::JsonExtract {
            expr: Box::new(expr),
            path: path.into(),
        }
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Func {
            name: name.into(),
            args,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op: "=".to_string(),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op: "AND".to_string(),
            right: Box::new(right),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Expr::Column(name) => quote_ident(name),
            Expr::Qualified { table, column } => {
                format!("{}.{}", quote_ident(table), quote_ident(column))
            }
            Expr::Text(value) => quote_text(value),
            Expr::Number(value) => value.clone(),
            Expr::Null => "NULL".to_string(),
            Expr::NullOf(ty) => format!("CAST(NULL AS {})", ty.ddl()),
            Expr::Cast { expr, ty } => format!("CAST({} AS {})", expr.render(), ty.ddl()),
            Expr::JsonExtract { expr, path } => {
                format!("json_extract({}, {})", expr.render(), quote_text(path))
            }
            Expr::Func { name, args } => format!(
                "{}({})",
                name,
                args.iter().map(Expr::render).join(", ")
            ),
            Expr::Binary { left, op, right } => {
                format!("{} {} {}", left.render(), op, right.render())
            }
            Expr::Raw(sql) => sql.clone(),
        }
    }
}
