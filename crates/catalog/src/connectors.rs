use models::{ObjectName, SourcePlatform};

/// One supported `(source, api_version, object)` tuple and its canonical
/// column list. The catalog is static and versioned with the release: a
/// new connector or api_version ships as a new catalog build, which is
/// then pushed into the blueprint registry.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectorEntry {
    pub source_platform: SourcePlatform,
    pub api_version: &'static str,
    pub object: ObjectName,
    /// Canonical columns as `(name, declared type)`, excluding ETL columns.
    pub columns: Vec<(&'static str, &'static str)>,
}

impl ConnectorEntry {
    /// The routing identity: one master sink per master model id.
    pub fn master_model_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.source_platform, self.api_version, self.object
        )
    }
}

type Raw = (
    &'static str,
    &'static str,
    &'static str,
    &'static [(&'static str, &'static str)],
);

// Sources in lexicographic order, objects in lexicographic order within
// each source. Column sets are pairwise distinct across the catalog; the
// registry enforces that at initialization.
const CONNECTORS: &[Raw] = &[
    // bigcommerce
    (
        "bigcommerce",
        "v3",
        "orders",
        &[
            ("id", "BIGINT"),
            ("date_created", "TIMESTAMP"),
            ("total_inc_tax", "DOUBLE"),
            ("currency_code", "VARCHAR"),
            ("status", "VARCHAR"),
            ("billing_email", "VARCHAR"),
            ("customer_id", "BIGINT"),
            ("products", "JSON"),
        ],
    ),
    (
        "bigcommerce",
        "v3",
        "products",
        &[
            ("id", "BIGINT"),
            ("name", "VARCHAR"),
            ("price", "DOUBLE"),
            ("date_created", "TIMESTAMP"),
        ],
    ),
    // facebook_ads
    (
        "facebook_ads",
        "v18",
        "ad_sets",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("status", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("daily_budget", "BIGINT"),
        ],
    ),
    (
        "facebook_ads",
        "v18",
        "ads_insights",
        &[
            ("date_start", "DATE"),
            ("account_id", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("adset_id", "VARCHAR"),
            ("ad_id", "VARCHAR"),
            ("spend", "DOUBLE"),
            ("impressions", "BIGINT"),
            ("clicks", "BIGINT"),
            ("actions_purchase", "DOUBLE"),
        ],
    ),
    (
        "facebook_ads",
        "v18",
        "campaigns",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("status", "VARCHAR"),
            ("objective", "VARCHAR"),
            ("created_time", "TIMESTAMP"),
        ],
    ),
    // google_ads
    (
        "google_ads",
        "v14",
        "ad_groups",
        &[
            ("ad_group_id", "BIGINT"),
            ("ad_group_name", "VARCHAR"),
            ("ad_group_status", "VARCHAR"),
            ("campaign_id", "BIGINT"),
        ],
    ),
    (
        "google_ads",
        "v14",
        "ad_performance_report",
        &[
            ("segments_date", "DATE"),
            ("customer_id", "BIGINT"),
            ("campaign_id", "BIGINT"),
            ("ad_group_id", "BIGINT"),
            ("ad_id", "BIGINT"),
            ("cost_micros", "BIGINT"),
            ("impressions", "BIGINT"),
            ("clicks", "BIGINT"),
            ("conversions", "DOUBLE"),
        ],
    ),
    (
        "google_ads",
        "v14",
        "campaigns",
        &[
            ("campaign_id", "BIGINT"),
            ("campaign_name", "VARCHAR"),
            ("campaign_status", "VARCHAR"),
            ("advertising_channel_type", "VARCHAR"),
        ],
    ),
    // google_analytics
    (
        "google_analytics",
        "v1",
        "events",
        &[
            ("event_date", "DATE"),
            ("event_timestamp", "BIGINT"),
            ("event_name", "VARCHAR"),
            ("user_pseudo_id", "VARCHAR"),
            ("user_id", "VARCHAR"),
            ("ga_session_id", "VARCHAR"),
            ("traffic_source_source", "VARCHAR"),
            ("traffic_source_medium", "VARCHAR"),
            ("traffic_source_name", "VARCHAR"),
            ("geo_country", "VARCHAR"),
            ("device_category", "VARCHAR"),
            ("ecommerce_purchase_revenue", "DOUBLE"),
            ("ecommerce_transaction_id", "VARCHAR"),
            ("event_params", "JSON"),
        ],
    ),
    // instagram_ads
    (
        "instagram_ads",
        "v18",
        "ad_sets",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("effective_status", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("daily_budget", "BIGINT"),
        ],
    ),
    (
        "instagram_ads",
        "v18",
        "ads_insights",
        &[
            ("date_start", "DATE"),
            ("ig_account_id", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("adset_id", "VARCHAR"),
            ("ad_id", "VARCHAR"),
            ("spend", "DOUBLE"),
            ("impressions", "BIGINT"),
            ("clicks", "BIGINT"),
            ("actions_purchase", "DOUBLE"),
        ],
    ),
    (
        "instagram_ads",
        "v18",
        "campaigns",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("effective_status", "VARCHAR"),
            ("objective", "VARCHAR"),
        ],
    ),
    // linkedin_ads
    (
        "linkedin_ads",
        "v2",
        "ad_analytics",
        &[
            ("date_range_start", "DATE"),
            ("account_urn", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("creative_id", "VARCHAR"),
            ("cost_in_usd", "DOUBLE"),
            ("impressions", "BIGINT"),
            ("clicks", "BIGINT"),
            ("external_website_conversions", "BIGINT"),
        ],
    ),
    (
        "linkedin_ads",
        "v2",
        "ad_groups",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("status", "VARCHAR"),
            ("account_id", "VARCHAR"),
            ("total_budget", "DOUBLE"),
        ],
    ),
    (
        "linkedin_ads",
        "v2",
        "campaigns",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("status", "VARCHAR"),
            ("type", "VARCHAR"),
            ("daily_budget", "DOUBLE"),
        ],
    ),
    // mixpanel
    (
        "mixpanel",
        "v1",
        "events",
        &[
            ("event", "VARCHAR"),
            ("time", "BIGINT"),
            ("distinct_id", "VARCHAR"),
            ("insert_id", "VARCHAR"),
            ("utm_source", "VARCHAR"),
            ("utm_medium", "VARCHAR"),
            ("utm_campaign", "VARCHAR"),
            ("mp_country_code", "VARCHAR"),
            ("device_type", "VARCHAR"),
            ("email", "VARCHAR"),
            ("revenue", "DOUBLE"),
            ("transaction_id", "VARCHAR"),
        ],
    ),
    // pinterest_ads
    (
        "pinterest_ads",
        "v5",
        "ad_analytics",
        &[
            ("date", "DATE"),
            ("advertiser_id", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("ad_group_id", "VARCHAR"),
            ("ad_id", "VARCHAR"),
            ("spend_in_micro_dollar", "BIGINT"),
            ("impressions", "BIGINT"),
            ("clicks", "BIGINT"),
            ("total_conversions", "BIGINT"),
        ],
    ),
    (
        "pinterest_ads",
        "v5",
        "ad_groups",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("status", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("bid_in_micro_currency", "BIGINT"),
        ],
    ),
    (
        "pinterest_ads",
        "v5",
        "campaigns",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("status", "VARCHAR"),
            ("objective_type", "VARCHAR"),
        ],
    ),
    // shopify
    (
        "shopify",
        "v1",
        "customers",
        &[
            ("id", "BIGINT"),
            ("email", "VARCHAR"),
            ("first_name", "VARCHAR"),
            ("last_name", "VARCHAR"),
            ("orders_count", "BIGINT"),
            ("total_spent", "DOUBLE"),
            ("created_at", "TIMESTAMP"),
        ],
    ),
    (
        "shopify",
        "v1",
        "orders",
        &[
            ("id", "BIGINT"),
            ("created_at", "TIMESTAMP"),
            ("total_price", "DOUBLE"),
            ("currency", "VARCHAR"),
            ("financial_status", "VARCHAR"),
            ("email", "VARCHAR"),
            ("customer_id", "BIGINT"),
            ("line_items", "JSON"),
        ],
    ),
    (
        "shopify",
        "v1",
        "products",
        &[
            ("id", "BIGINT"),
            ("title", "VARCHAR"),
            ("price", "DOUBLE"),
            ("status", "VARCHAR"),
            ("created_at", "TIMESTAMP"),
        ],
    ),
    // snapchat_ads
    (
        "snapchat_ads",
        "v1",
        "ad_squads",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("status", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("bid_micro", "BIGINT"),
        ],
    ),
    (
        "snapchat_ads",
        "v1",
        "ad_stats",
        &[
            ("start_time", "DATE"),
            ("ad_account_id", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("ad_squad_id", "VARCHAR"),
            ("ad_id", "VARCHAR"),
            ("spend", "BIGINT"),
            ("impressions", "BIGINT"),
            ("swipes", "BIGINT"),
            ("conversion_purchases", "BIGINT"),
        ],
    ),
    (
        "snapchat_ads",
        "v1",
        "campaigns",
        &[
            ("id", "VARCHAR"),
            ("name", "VARCHAR"),
            ("status", "VARCHAR"),
            ("start_time", "TIMESTAMP"),
        ],
    ),
    // stripe
    (
        "stripe",
        "v1",
        "charges",
        &[
            ("id", "VARCHAR"),
            ("amount", "BIGINT"),
            ("currency", "VARCHAR"),
            ("status", "VARCHAR"),
            ("customer", "VARCHAR"),
            ("receipt_email", "VARCHAR"),
            ("created", "BIGINT"),
        ],
    ),
    (
        "stripe",
        "v1",
        "customers",
        &[
            ("id", "VARCHAR"),
            ("email", "VARCHAR"),
            ("name", "VARCHAR"),
            ("created", "BIGINT"),
        ],
    ),
    // tiktok_ads
    (
        "tiktok_ads",
        "v1",
        "ad_groups",
        &[
            ("adgroup_id", "VARCHAR"),
            ("adgroup_name", "VARCHAR"),
            ("operation_status", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
        ],
    ),
    (
        "tiktok_ads",
        "v1",
        "ad_report_daily",
        &[
            ("stat_time_day", "DATE"),
            ("advertiser_id", "VARCHAR"),
            ("campaign_id", "VARCHAR"),
            ("adgroup_id", "VARCHAR"),
            ("ad_id", "VARCHAR"),
            ("spend", "DOUBLE"),
            ("impressions", "BIGINT"),
            ("clicks", "BIGINT"),
            ("conversions", "BIGINT"),
        ],
    ),
    (
        "tiktok_ads",
        "v1",
        "campaigns",
        &[
            ("campaign_id", "VARCHAR"),
            ("campaign_name", "VARCHAR"),
            ("operation_status", "VARCHAR"),
            ("objective_type", "VARCHAR"),
        ],
    ),
    // woocommerce
    (
        "woocommerce",
        "v3",
        "orders",
        &[
            ("id", "BIGINT"),
            ("date_created", "TIMESTAMP"),
            ("total", "DOUBLE"),
            ("currency", "VARCHAR"),
            ("status", "VARCHAR"),
            ("billing_email", "VARCHAR"),
            ("customer_id", "BIGINT"),
            ("line_items", "JSON"),
        ],
    ),
    (
        "woocommerce",
        "v3",
        "products",
        &[
            ("id", "BIGINT"),
            ("name", "VARCHAR"),
            ("price", "DOUBLE"),
            ("status", "VARCHAR"),
            ("date_created", "TIMESTAMP"),
        ],
    ),
];

/// Every supported connector entry, in deterministic order: source, then
/// api_version, then object.
pub fn list_supported() -> Vec<ConnectorEntry> {
    CONNECTORS
        .iter()
        .map(|(source, api_version, object, columns)| ConnectorEntry {
            source_platform: SourcePlatform::new(*source),
            api_version,
            object: ObjectName::new(*object),
            columns: columns.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn catalog_covers_thirteen_sources_and_thirty_two_objects() {
        let entries = list_supported();
        assert_eq!(entries.len(), 32);
        let sources: Vec<_> = entries
            .iter()
            .map(|e| e.source_platform.as_str())
            .unique()
            .collect();
        assert_eq!(sources.len(), 13);
    }

    #[test]
    fn enumeration_order_is_deterministic_and_sorted() {
        let entries = list_supported();
        let keys: Vec<_> = entries
            .iter()
            .map(|e| {
                (
                    e.source_platform.as_str().to_string(),
                    e.api_version.to_string(),
                    e.object.as_str().to_string(),
                )
            })
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn master_model_ids_are_unique() {
        let entries = list_supported();
        let ids: Vec<_> = entries.iter().map(ConnectorEntry::master_model_id).collect();
        assert_eq!(ids.len(), ids.iter().unique().count());
    }

    #[test]
    fn column_sets_are_pairwise_distinct() {
        let entries = list_supported();
        let fingerprints: Vec<_> = entries
            .iter()
            .map(|e| crate::fingerprint(e.columns.iter().copied()))
            .collect();
        assert_eq!(fingerprints.len(), fingerprints.iter().unique().count());
    }
}
