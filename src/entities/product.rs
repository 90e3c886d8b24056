use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product entity for the content catalog: one-off courses/books and
/// recurring subscription tiers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub kind: ProductKind,
    /// Billing period for subscription products ("month", "quarter", "year")
    #[sea_orm(nullable)]
    pub billing_period: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_price::Entity")]
    Prices,
    #[sea_orm(has_many = "super::purchase_record::Entity")]
    PurchaseRecords,
}

impl Related<super::product_price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prices.def()
    }
}

impl Related<super::purchase_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Product kind enumeration
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// One-off purchase (course, book)
    #[sea_orm(string_value = "course")]
    Course,
    /// Recurring subscription tier
    #[sea_orm(string_value = "subscription")]
    Subscription,
}
