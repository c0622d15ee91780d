use super::{quote_ident, Expr, Relation};
use itertools::Itertools;

/// One column of a SELECT list.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectColumn {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectColumn {
    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    pub fn bare(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    fn render(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.expr.render(), quote_ident(alias)),
            None => self.expr.render(),
        }
    }
}

/// The source of a FROM clause or JOIN.
#[derive(Clone, Debug, PartialEq)]
pub enum FromItem {
    Relation(Relation),
    /// A reference to a named CTE.
    Named(String),
    Subquery(Box<Select>),
}

impl FromItem {
    fn render(&self) -> String {
        match self {
            FromItem::Relation(relation) => relation.render(),
            FromItem::Named(name) => quote_ident(name),
            FromItem::Subquery(select) => format!("({})", select.render()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub item: FromItem,
    pub alias: String,
    pub on: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub desc: bool,
}

/// A single SELECT statement, with optional CTE prelude.
///
/// UNION ALL composition happens in `Statement`, not here: common table
/// expressions are legal only at the head of a statement, so compound
/// queries are restricted to CTE-free arms and the builder enforces that
/// shape by construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Select {
    pub with: Vec<(String, Select)>,
    pub columns: Vec<SelectColumn>,
    pub from: Option<(FromItem, String)>,
    pub joins: Vec<Join>,
    pub where_: Vec<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cte(mut self, name: impl Into<String>, body: Select) -> Self {
        self.with.push((name.into(), body));
        self
    }

    pub fn column(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.columns.push(SelectColumn::aliased(expr, alias));
        self
    }

    pub fn column_bare(mut self, expr: Expr) -> Self {
        self.columns.push(SelectColumn::bare(expr));
        self
    }

    pub fn from(mut self, item: FromItem, alias: impl Into<String>) -> Self {
        self.from = Some((item, alias.into()));
        self
    }

    pub fn from_relation(self, relation: Relation, alias: impl Into<String>) -> Self {
        self.from(FromItem::Relation(relation), alias)
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.where_.push(predicate);
        self
    }

    pub fn group(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn order(mut self, expr: Expr, desc: bool) -> Self {
        self.order_by.push(OrderBy { expr, desc });
        self
    }

    /// The output column names, in declaration order.
    /// Unaliased columns must be bare or qualified references.
    pub fn output_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| match (&c.alias, &c.expr) {
                (Some(alias), _) => alias.clone(),
                (None, Expr::Column(name)) => name.clone(),
                (None, Expr::Qualified { column, .. }) => column.clone(),
                (None, other) => panic!("unaliased select column {other:?} has no name"),
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.with.is_empty() {
            out.push_str("WITH ");
            let ctes = self
                .with
                .iter()
                .map(|(name, body)| format!("{} AS (\n{}\n)", quote_ident(name), body.render()))
                .join(",\n");
            out.push_str(&ctes);
            out.push('\n');
        }

        out.push_str("SELECT\n");
        out.push_str(
            &self
                .columns
                .iter()
                .map(|c| format!("    {}", c.render()))
                .join(",\n"),
        );

        if let Some((item, alias)) = &self.from {
            out.push_str(&format!("\nFROM {} AS {}", item.render(), quote_ident(alias)));
        }
        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            out.push_str(&format!(
                "\n{} {} AS {} ON {}",
                kind,
                join.item.render(),
                quote_ident(&join.alias),
                join.on.render()
            ));
        }
        if !self.where_.is_empty() {
            out.push_str(&format!(
                "\nWHERE {}",
                self.where_.iter().map(Expr::render).join(" AND ")
            ));
        }
        if !self.group_by.is_empty() {
            out.push_str(&format!(
                "\nGROUP BY {}",
                self.group_by.iter().map(Expr::render).join(", ")
            ));
        }
        if !self.order_by.is_empty() {
            out.push_str(&format!(
                "\nORDER BY {}",
                self.order_by
                    .iter()
                    .map(|o| if o.desc {
                        format!("{} DESC", o.expr.render())
                    } else {
                        o.expr.render()
                    })
                    .join(", ")
            ));
        }

        out
    }
}
