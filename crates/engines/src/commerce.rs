use super::registry::{Engine, EngineContext};
use models::{intermediate_name, Domain, ObjectName, SourcePlatform};
use sqlgen::{Expr, Relation, Select, SqlType};
use std::sync::Arc;

/// Column mapping of one commerce platform's orders onto the canonical
/// orders schema. Also consulted by the users engine for identity
/// resolution joins.
pub(crate) struct OrdersMapping {
    pub source: &'static str,
    pub object: &'static str,
    pub order_id: &'static str,
    pub order_date: &'static str,
    pub total_price: &'static str,
    pub currency: &'static str,
    pub financial_status: &'static str,
    pub customer_email: &'static str,
    pub customer_id: &'static str,
    pub line_items: &'static str,
}

pub(crate) const ORDERS_MAPPINGS: &[OrdersMapping] = &[
    OrdersMapping {
        source: "bigcommerce",
        object: "orders",
        order_id: "id",
        order_date: "date_created",
        total_price: "total_inc_tax",
        currency: "currency_code",
        financial_status: "status",
        customer_email: "billing_email",
        customer_id: "customer_id",
        line_items: "products",
    },
    OrdersMapping {
        source: "shopify",
        object: "orders",
        order_id: "id",
        order_date: "created_at",
        total_price: "total_price",
        currency: "currency",
        financial_status: "financial_status",
        customer_email: "email",
        customer_id: "customer_id",
        line_items: "line_items",
    },
    OrdersMapping {
        source: "woocommerce",
        object: "orders",
        order_id: "id",
        order_date: "date_created",
        total_price: "total",
        currency: "currency",
        financial_status: "status",
        customer_email: "billing_email",
        customer_id: "customer_id",
        line_items: "line_items",
    },
];

pub(crate) fn orders_mapping(source: &str) -> Option<&'static OrdersMapping> {
    ORDERS_MAPPINGS.iter().find(|m| m.source == source)
}

struct OrdersEngine(&'static OrdersMapping);

impl Engine for OrdersEngine {
    fn source(&self) -> SourcePlatform {
        SourcePlatform::new(self.0.source)
    }

    fn domain(&self) -> Domain {
        Domain::Orders
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
            .column(Expr::cast(Expr::col(m.order_id), SqlType::Varchar), "order_id")
            .column(Expr::col(m.order_date), "order_date")
            .column(
                Expr::cast(Expr::col(m.total_price), SqlType::Double),
                "total_price",
            )
            .column(Expr::cast(Expr::col(m.currency), SqlType::Varchar), "currency")
            .column(
                Expr::cast(Expr::col(m.financial_status), SqlType::Varchar),
                "financial_status",
            )
            .column(
                Expr::cast(Expr::col(m.customer_email), SqlType::Varchar),
                "customer_email",
            )
            .column(
                Expr::cast(Expr::col(m.customer_id), SqlType::Varchar),
                "customer_id",
            )
            .column(Expr::col(m.line_items), "line_items_json")
            .from_relation(Relation::new(self.requires(ctx).remove(0)), "orders")
    }
}

struct ProductsMapping {
    source: &'static str,
    object: &'static str,
    product_id: &'static str,
    product_title: &'static str,
    product_price: &'static str,
    created_at: &'static str,
}

const PRODUCTS_MAPPINGS: &[ProductsMapping] = &[
    ProductsMapping {
        source: "bigcommerce",
        object: "products",
        product_id: "id",
        product_title: "name",
        product_price: "price",
        created_at: "date_created",
    },
    ProductsMapping {
        source: "shopify",
        object: "products",
        product_id: "id",
        product_title: "title",
        product_price: "price",
        created_at: "created_at",
    },
    ProductsMapping {
        source: "woocommerce",
        object: "products",
        product_id: "id",
        product_title: "name",
        product_price: "price",
        created_at: "date_created",
    },
];

struct ProductsEngine(&'static ProductsMapping);

impl Engine for ProductsEngine {
    fn source(&self) -> SourcePlatform {
        SourcePlatform::new(self.0.source)
    }

    fn domain(&self) -> Domain {
        Domain::Products
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
            .column(
                Expr::cast(Expr::col(m.product_id), SqlType::Varchar),
                "product_id",
            )
            .column(
                Expr::cast(Expr::col(m.product_title), SqlType::Varchar),
                "product_title",
            )
            .column(
                Expr::cast(Expr::col(m.product_price), SqlType::Double),
                "product_price",
            )
            .column(Expr::col(m.created_at), "created_at")
            .from_relation(Relation::new(self.requires(ctx).remove(0)), "products")
    }
}

pub(crate) fn engines() -> Vec<Arc<dyn Engine>> {
    let mut out: Vec<Arc<dyn Engine>> = Vec::new();
    for mapping in ORDERS_MAPPINGS {
        out.push(Arc::new(OrdersEngine(mapping)));
    }
    for mapping in PRODUCTS_MAPPINGS {
        out.push(Arc::new(ProductsEngine(mapping)));
    }
    out
}
