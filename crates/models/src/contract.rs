use sqlgen::{ColumnDef, SqlType};

/// Column names of the master-sink contract, in declaration order.
pub const TENANT_SLUG: &str = "tenant_slug";
pub const TENANT_SKEY: &str = "tenant_skey";
pub const SOURCE_PLATFORM: &str = "source_platform";
pub const SOURCE_SCHEMA_HASH: &str = "source_schema_hash";
pub const SOURCE_SCHEMA: &str = "source_schema";
pub const RAW_DATA_PAYLOAD: &str = "raw_data_payload";
pub const LOADED_AT: &str = "loaded_at";

/// The seven-column master-sink contract. Any violation is fatal: master
/// sinks are logic-free shells, created idempotently and hydrated only by
/// the push circuit.
pub const CONTRACT_COLUMNS: [(&str, SqlType); 7] = [
    (TENANT_SLUG, SqlType::Varchar),
    (TENANT_SKEY, SqlType::Varchar),
    (SOURCE_PLATFORM, SqlType::Varchar),
    (SOURCE_SCHEMA_HASH, SqlType::Varchar),
    (SOURCE_SCHEMA, SqlType::Json),
    (RAW_DATA_PAYLOAD, SqlType::Json),
    (LOADED_AT, SqlType::Timestamp),
];

/// The contract as DDL column definitions.
pub fn master_contract() -> Vec<ColumnDef> {
    CONTRACT_COLUMNS
        .iter()
        .map(|(name, ty)| ColumnDef::new(*name, *ty))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn contract_is_seven_columns_ending_in_loaded_at() {
        let contract = master_contract();
        assert_eq!(contract.len(), 7);
        assert_eq!(contract[0].name, "tenant_slug");
        assert_eq!(contract[6].name, "loaded_at");
        assert_eq!(contract[6].ty, SqlType::Timestamp);
    }
}
