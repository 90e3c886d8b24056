use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::product_price::Currency;

/// Durable entitlement link between a confirmed payment intent and a
/// customer. A row exists if and only if the provider reported the intent
/// as succeeded.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    /// Provider-issued payment intent id; unique so re-confirming the same
    /// intent cannot grant a second entitlement
    #[sea_orm(unique)]
    pub payment_intent_id: String,
    pub currency: Currency,
    /// Amount actually charged, in minor units
    pub amount_minor: i64,
    /// Pre-discount amount, in minor units
    pub original_amount_minor: i64,
    /// Discount applied, in minor units
    pub discount_minor: i64,
    #[sea_orm(nullable)]
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
