use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Per-currency price row. Prices are a static table, one row per supported
/// currency per product; there is no FX conversion.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_prices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub currency: Currency,
    /// Amount in the currency's minor unit (cents)
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The fixed set of currencies checkout supports
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(3))")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[sea_orm(string_value = "AUD")]
    Aud,
    #[sea_orm(string_value = "USD")]
    Usd,
    #[sea_orm(string_value = "GBP")]
    Gbp,
    #[sea_orm(string_value = "CAD")]
    Cad,
    #[sea_orm(string_value = "NZD")]
    Nzd,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Aud => "AUD",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Nzd => "NZD",
        }
    }

    /// Lowercase code as the payment provider's wire format expects
    pub fn provider_code(&self) -> String {
        self.code().to_ascii_lowercase()
    }

    pub fn parse(code: &str) -> Option<Currency> {
        match code.to_ascii_uppercase().as_str() {
            "AUD" => Some(Currency::Aud),
            "USD" => Some(Currency::Usd),
            "GBP" => Some(Currency::Gbp),
            "CAD" => Some(Currency::Cad),
            "NZD" => Some(Currency::Nzd),
            _ => None,
        }
    }

    /// Format a minor-unit amount for humans ("$120.00 AUD")
    pub fn format_minor(&self, amount_minor: i64) -> String {
        let major = rust_decimal::Decimal::new(amount_minor, 2);
        format!("${} {}", major, self.code())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
