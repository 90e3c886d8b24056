use crate::{
    entities::{product, product_price, Product, ProductPrice},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::product_price::Currency;

/// Resolved price for a product in a region
#[derive(Debug, Clone)]
pub struct ResolvedPrice {
    pub product: product::Model,
    pub currency: Currency,
    /// Base amount in minor units, before any discount
    pub amount_minor: i64,
    /// True when the requested region had no supported currency and the
    /// default was used
    pub fallback_applied: bool,
}

/// Maps a best-effort IP-derived country to a currency and base price.
/// Pure lookups against a static table; no FX conversion.
#[derive(Clone)]
pub struct RegionalPricingService {
    db: Arc<DatabaseConnection>,
    default_currency: Currency,
}

impl RegionalPricingService {
    pub fn new(db: Arc<DatabaseConnection>, default_currency: Currency) -> Self {
        Self {
            db,
            default_currency,
        }
    }

    pub fn default_currency(&self) -> Currency {
        self.default_currency
    }

    /// Country → currency. Unknown or missing countries fall back to the
    /// default currency.
    pub fn currency_for_country(&self, country: Option<&str>) -> (Currency, bool) {
        match country
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_ascii_uppercase)
            .as_deref()
        {
            Some("AU") => (Currency::Aud, false),
            Some("US") => (Currency::Usd, false),
            Some("GB") => (Currency::Gbp, false),
            Some("CA") => (Currency::Cad, false),
            Some("NZ") => (Currency::Nzd, false),
            _ => (self.default_currency, true),
        }
    }

    /// Resolve the charge currency and base price for a product given the
    /// request's origin country.
    #[instrument(skip(self))]
    pub async fn resolve_price(
        &self,
        product_id: Uuid,
        country: Option<&str>,
    ) -> Result<ResolvedPrice, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !product.active {
            return Err(ServiceError::InvalidOperation(format!(
                "Product {} is not available for purchase",
                product_id
            )));
        }

        let (currency, mut fallback_applied) = self.currency_for_country(country);

        let mut price = self.find_price(product_id, currency).await?;
        if price.is_none() && currency != self.default_currency {
            // Supported region but no price row for it; charge in the default
            debug!(%product_id, %currency, "no price row for currency, using default");
            fallback_applied = true;
            price = self.find_price(product_id, self.default_currency).await?;
        }

        let price = price.ok_or_else(|| {
            ServiceError::InvalidOperation(format!(
                "Product {} has no configured price",
                product_id
            ))
        })?;

        Ok(ResolvedPrice {
            product,
            currency: price.currency,
            amount_minor: price.amount_minor,
            fallback_applied,
        })
    }

    async fn find_price(
        &self,
        product_id: Uuid,
        currency: Currency,
    ) -> Result<Option<product_price::Model>, ServiceError> {
        ProductPrice::find()
            .filter(product_price::Column::ProductId.eq(product_id))
            .filter(product_price::Column::Currency.eq(currency))
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }
}
