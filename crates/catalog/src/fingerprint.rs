use itertools::Itertools;

/// ETL-internal columns stripped before fingerprinting: bookkeeping the
/// ingestion layer appends to every landed table, carrying no schema
/// contract.
pub const ETL_COLUMNS: &[&str] = &[
    "_dlt_load_id",
    "_dlt_id",
    "_etl_loaded_at",
    "_row_id",
    "_ingested_at",
];

pub fn is_etl_column(name: &str) -> bool {
    let name = normalize_name(name);
    ETL_COLUMNS.contains(&name.as_str())
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().split_whitespace().join("_")
}

/// Map a declared type through the fixed equivalence table to its
/// canonical token. Unknown types pass through lower-cased, so two landed
/// tables disagreeing on an exotic type still disagree on fingerprint.
pub fn normalize_type(ty: &str) -> String {
    // Strip parameterization: VARCHAR(255) fingerprints as VARCHAR.
    let base = ty.split('(').next().unwrap_or(ty);
    let base = base.trim().to_ascii_uppercase();

    match base.as_str() {
        "BIGINT" | "INT8" | "LONG" => "bigint",
        "INTEGER" | "INT" | "INT4" | "SMALLINT" | "TINYINT" => "integer",
        "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "FLOAT8" | "REAL" | "NUMERIC" | "DECIMAL" => {
            "double"
        }
        "VARCHAR" | "TEXT" | "STRING" | "CHAR" | "CHARACTER VARYING" => "varchar",
        "BOOLEAN" | "BOOL" => "boolean",
        "DATE" => "date",
        "TIMESTAMP" | "DATETIME" | "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => "timestamp",
        "JSON" | "JSONB" | "VARIANT" | "OBJECT" => "json",
        _ => return base.to_ascii_lowercase(),
    }
    .to_string()
}

/// Fingerprint a column set: normalize, strip ETL columns, sort
/// lexicographically by name, serialize as `name:type|...`, and digest.
///
/// The hash depends only on the canonical column multiset. Column order,
/// sample data, and row count do not affect it; any non-excluded column
/// add, remove, or retype does.
pub fn fingerprint<'a, I>(columns: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let serialized = columns
        .into_iter()
        .map(|(name, ty)| (normalize_name(name), normalize_type(ty)))
        .filter(|(name, _)| !ETL_COLUMNS.contains(&name.as_str()))
        .sorted()
        .map(|(name, ty)| format!("{name}:{ty}"))
        .join("|");

    format!("{:x}", md5::compute(serialized.as_bytes()))
}

/// The deterministic tenant surrogate key carried by every master row.
pub fn fingerprint_tenant(slug: &str) -> String {
    format!("{:x}", md5::compute(slug.as_bytes()))
}
