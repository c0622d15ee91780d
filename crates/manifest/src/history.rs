use super::Error;
use models::TenantConfig;
use sqlgen::quote_text;
use warehouse::Warehouse;

/// Governance table recording every accepted manifest write.
pub const HISTORY_TABLE: &str = "tenant_config_history";

/// Append a config revision to the governance table. Failures here are
/// surfaced but the manifest write itself has already been accepted.
pub async fn record_history(wh: &dyn Warehouse, config: &TenantConfig) -> Result<(), Error> {
    wh.execute(&format!(
        "CREATE TABLE IF NOT EXISTS \"{HISTORY_TABLE}\" (\n\
         \x20   \"tenant_slug\" VARCHAR,\n\
         \x20   \"revision\" JSON,\n\
         \x20   \"changed_at\" TIMESTAMP\n\
         )"
    ))
    .await?;

    let revision = serde_json::to_string(config).unwrap_or_default();
    wh.execute(&format!(
        "INSERT INTO \"{HISTORY_TABLE}\" VALUES ({}, {}, {})",
        quote_text(config.tenant_slug.as_str()),
        quote_text(&revision),
        quote_text(&chrono::Utc::now().to_rfc3339()),
    ))
    .await?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use models::{TenantConfig, TenantSlug};
    use warehouse::SqliteWarehouse;

    #[tokio::test]
    async fn records_each_revision() {
        let wh = SqliteWarehouse::open_in_memory().unwrap();
        let mut config =
            TenantConfig::new(TenantSlug::new("tyrell_corp"), "Tyrell Corp");

        record_history(&wh, &config).await.unwrap();
        config.status = models::TenantStatus::Active;
        record_history(&wh, &config).await.unwrap();

        let rows = wh
            .query(&format!(
                "SELECT COUNT(*) FROM \"{HISTORY_TABLE}\" WHERE tenant_slug = 'tyrell_corp'"
            ))
            .await
            .unwrap();
        assert_eq!(rows[0][0], warehouse::Value::Integer(2));
    }
}
