use super::registry::{Engine, EngineContext};
use models::{intermediate_name, Domain, ObjectName, SourcePlatform};
use sqlgen::{Expr, Relation, Select, SqlType};
use std::sync::Arc;

/// How a platform reports spend.
#[derive(Copy, Clone, Debug)]
enum Spend {
    /// Already a currency amount.
    Currency(&'static str),
    /// Micro-currency units; scaled to whole units.
    Micros(&'static str),
}

impl Spend {
    fn expr(&self) -> Expr {
        match self {
            Spend::Currency(column) => Expr::cast(Expr::col(*column), SqlType::Double),
            Spend::Micros(column) => Expr::raw(format!(
                "CAST({} AS DOUBLE) / 1000000.0",
                Expr::col(*column).render()
            )),
        }
    }
}

/// Column mapping of one platform's insights report onto the canonical
/// ad_performance schema.
struct AdMapping {
    source: &'static str,
    object: &'static str,
    report_date: &'static str,
    campaign_id: &'static str,
    /// None when the platform has no ad-group level (typed NULL).
    ad_group_id: Option<&'static str>,
    ad_id: &'static str,
    spend: Spend,
    impressions: &'static str,
    clicks: &'static str,
    conversions: &'static str,
}

const AD_MAPPINGS: &[AdMapping] = &[
    AdMapping {
        source: "facebook_ads",
        object: "ads_insights",
        report_date: "date_start",
        campaign_id: "campaign_id",
        ad_group_id: Some("adset_id"),
        ad_id: "ad_id",
        spend: Spend::Currency("spend"),
        impressions: "impressions",
        clicks: "clicks",
        conversions: "actions_purchase",
    },
    AdMapping {
        source: "instagram_ads",
        object: "ads_insights",
        report_date: "date_start",
        campaign_id: "campaign_id",
        ad_group_id: Some("adset_id"),
        ad_id: "ad_id",
        spend: Spend::Currency("spend"),
        impressions: "impressions",
        clicks: "clicks",
        conversions: "actions_purchase",
    },
    AdMapping {
        source: "google_ads",
        object: "ad_performance_report",
        report_date: "segments_date",
        campaign_id: "campaign_id",
        ad_group_id: Some("ad_group_id"),
        ad_id: "ad_id",
        spend: Spend::Micros("cost_micros"),
        impressions: "impressions",
        clicks: "clicks",
        conversions: "conversions",
    },
    AdMapping {
        source: "tiktok_ads",
        object: "ad_report_daily",
        report_date: "stat_time_day",
        campaign_id: "campaign_id",
        ad_group_id: Some("adgroup_id"),
        ad_id: "ad_id",
        spend: Spend::Currency("spend"),
        impressions: "impressions",
        clicks: "clicks",
        conversions: "conversions",
    },
    AdMapping {
        source: "pinterest_ads",
        object: "ad_analytics",
        report_date: "date",
        campaign_id: "campaign_id",
        ad_group_id: Some("ad_group_id"),
        ad_id: "ad_id",
        spend: Spend::Micros("spend_in_micro_dollar"),
        impressions: "impressions",
        clicks: "clicks",
        conversions: "total_conversions",
    },
    AdMapping {
        source: "linkedin_ads",
        object: "ad_analytics",
        report_date: "date_range_start",
        campaign_id: "campaign_id",
        ad_group_id: None,
        ad_id: "creative_id",
        spend: Spend::Currency("cost_in_usd"),
        impressions: "impressions",
        clicks: "clicks",
        conversions: "external_website_conversions",
    },
    AdMapping {
        source: "snapchat_ads",
        object: "ad_stats",
        report_date: "start_time",
        campaign_id: "campaign_id",
        ad_group_id: Some("ad_squad_id"),
        ad_id: "ad_id",
        spend: Spend::Micros("spend"),
        impressions: "impressions",
        clicks: "swipes",
        conversions: "conversion_purchases",
    },
];

struct AdPerformanceEngine(&'static AdMapping);

impl Engine for AdPerformanceEngine {
    fn source(&self) -> SourcePlatform {
        SourcePlatform::new(self.0.source)
    }

    fn domain(&self) -> Domain {
        Domain::AdPerformance
    }

    fn requires(&self, ctx: &EngineContext) -> Vec<String> {
        vec![intermediate_name(
            ctx.tenant(),
            &self.source(),
            &ObjectName::new(self.0.object),
        )]
    }

    fn build(&self, ctx: &EngineContext) -> Select {
        let m = self.0;
        let ad_group = match m.ad_group_id {
            Some(column) => Expr::cast(Expr::col(column), SqlType::Varchar),
            None => Expr::null_of(SqlType::Varchar),
        };

        Select::new()
            .column(Expr::col("tenant_slug"), "tenant_slug")
            .column(Expr::col("source_platform"), "source_platform")
            // Dates ride as ISO text; a numeric-affinity cast would
            // truncate them.
            .column(Expr::col(m.report_date), "report_date")
            .column(
                Expr::cast(Expr::col(m.campaign_id), SqlType::Varchar),
                "campaign_id",
            )
            .column(ad_group, "ad_group_id")
            .column(Expr::cast(Expr::col(m.ad_id), SqlType::Varchar), "ad_id")
            .column(m.spend.expr(), "spend")
            .column(
                Expr::cast(Expr::col(m.impressions), SqlType::BigInt),
                "impressions",
            )
            .column(Expr::cast(Expr::col(m.clicks), SqlType::BigInt), "clicks")
            .column(
                Expr::cast(Expr::col(m.conversions), SqlType::Double),
                "conversions",
            )
            .from_relation(Relation::new(self.requires(ctx).remove(0)), "report")
    }
}

/// Column mapping of one platform's campaign listing onto the canonical
/// campaigns schema.
struct CampaignMapping {
    source: &'static str,
    object: &'static str,
    id: &'static str,
    name: &'static str,
    status: &'static str,
}

const CAMPAIGN_MAPPINGS: &[CampaignMapping] = &[
    CampaignMapping {
        source: "facebook_ads",
        object: "campaigns",
        id: "id",
        name: "name",
        status: "status",
    },
    CampaignMapping {
        source: "instagram_ads",
        object: "campaigns",
        id: "id",
        name: "name",
        status: "effective_status",
    },
    CampaignMapping {
        source: "google_ads",
        object: "campaigns",
        id: "campaign_id",
        name: "campaign_name",
        status: "campaign_status",
    },
    CampaignMapping {
        source: "tiktok_ads",
        object: "campaigns",
        id: "campaign_id",
        name: "campaign_name",
        status: "operation_status",
    },
    CampaignMapping {
        source: "pinterest_ads",
        object: "campaigns",
        id: "id",
        name: "name",
        status: "status",
    },
    CampaignMapping {
        source: "linkedin_ads",
        object: "campaigns",
        id: "id",
        name: "name",
        status: "status",
    },
    CampaignMapping {
        source: "snapchat_ads",
        object: "campaigns",
        id: "id",
        name: "name",
        status: "status",
    },
];

struct CampaignsEngine(&'static CampaignMapping);

impl Engine for CampaignsEngine {
    fn source(&self) -> SourcePlatform {
        SourcePlatform::new(self.0.source)
    }

    fn domain(&self) -> Domain {
        Domain::Campaigns
    }

    fn requires(&self, ctx: &EngineContext) -> Vec<String> {
        vec![intermediate_name(
            ctx.tenant(),
            &self.source(),
            &ObjectName::new(self.0.object),
        )]
    }

    fn build(&self, ctx: &EngineContext) -> Select {
        let m = self.0;
        Select::new()
            .column(Expr::col("tenant_slug"), "tenant_slug")
            .column(Expr::col("source_platform"), "source_platform")
            .column(Expr::cast(Expr::col(m.id), SqlType::Varchar), "campaign_id")
            .column(Expr::cast(Expr::col(m.name), SqlType::Varchar), "campaign_name")
            .column(
                Expr::cast(Expr::col(m.status), SqlType::Varchar),
                "campaign_status",
            )
            .from_relation(Relation::new(self.requires(ctx).remove(0)), "campaigns")
    }
}

pub(crate) fn engines() -> Vec<Arc<dyn Engine>> {
    let mut out: Vec<Arc<dyn Engine>> = Vec::new();
    for mapping in AD_MAPPINGS {
        out.push(Arc::new(AdPerformanceEngine(mapping)));
    }
    for mapping in CAMPAIGN_MAPPINGS {
        out.push(Arc::new(CampaignsEngine(mapping)));
    }
    out
}
