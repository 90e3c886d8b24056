use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    provider::{CouponDiscount, PaymentProvider, ProviderCoupon, ProviderError},
};

/// Why a coupon code produced no discount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CouponRejection {
    /// No coupon with that code exists at the provider
    NotFound,
    /// The coupon exists but is expired or deactivated
    Inactive,
    /// The provider could not be reached; checkout proceeds at full price
    ProviderUnavailable,
}

/// Result of evaluating a coupon code against a base amount.
/// A missing or invalid code is not an error: the evaluation simply carries
/// no discount and checkout proceeds at full price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponEvaluation {
    pub applied: bool,
    /// Discount in minor units, always within [0, base]
    pub discount_minor: i64,
    /// Amount to charge in minor units: base - discount
    pub final_minor: i64,
    pub coupon: Option<ProviderCoupon>,
    pub rejection: Option<CouponRejection>,
}

impl CouponEvaluation {
    fn full_price(base_minor: i64, rejection: Option<CouponRejection>) -> Self {
        Self {
            applied: false,
            discount_minor: 0,
            final_minor: base_minor,
            coupon: None,
            rejection,
        }
    }
}

/// `discount = round(base * percent / 100)`, half away from zero, exact
/// integer arithmetic so large amounts cannot drift.
pub fn percent_discount(base_minor: i64, percent: u8) -> i64 {
    let scaled = base_minor as i128 * percent as i128;
    ((scaled + 50) / 100) as i64
}

/// `discount = min(amount_off, base)`; a fixed coupon never discounts below
/// zero.
pub fn amount_discount(base_minor: i64, amount_off_minor: i64) -> i64 {
    amount_off_minor.clamp(0, base_minor)
}

/// Evaluates coupon codes against the provider's registry. The engine keeps
/// no local discount rule table.
#[derive(Clone)]
pub struct CouponService {
    provider: Arc<dyn PaymentProvider>,
}

impl CouponService {
    pub fn new(provider: Arc<dyn PaymentProvider>) -> Self {
        Self { provider }
    }

    /// Evaluate an optional coupon code against a base amount in minor
    /// units. Provider outages waive the discount rather than block the
    /// checkout.
    #[instrument(skip(self))]
    pub async fn evaluate(
        &self,
        code: Option<&str>,
        base_minor: i64,
    ) -> Result<CouponEvaluation, ServiceError> {
        if base_minor < 0 {
            return Err(ServiceError::InvalidInput(
                "base amount cannot be negative".to_string(),
            ));
        }

        let code = match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => code,
            None => return Ok(CouponEvaluation::full_price(base_minor, None)),
        };

        let coupon = match self.provider.fetch_coupon(code).await {
            Ok(coupon) => coupon,
            Err(ProviderError::NotFound(_)) => {
                return Ok(CouponEvaluation::full_price(
                    base_minor,
                    Some(CouponRejection::NotFound),
                ));
            }
            Err(err) => {
                warn!(code, error = %err, "coupon lookup failed; proceeding at full price");
                return Ok(CouponEvaluation::full_price(
                    base_minor,
                    Some(CouponRejection::ProviderUnavailable),
                ));
            }
        };

        if !coupon.valid {
            return Ok(CouponEvaluation::full_price(
                base_minor,
                Some(CouponRejection::Inactive),
            ));
        }

        let discount_minor = match coupon.discount {
            CouponDiscount::PercentOff(percent) => percent_discount(base_minor, percent),
            CouponDiscount::AmountOff { amount_minor } => {
                amount_discount(base_minor, amount_minor)
            }
        }
        .clamp(0, base_minor);

        Ok(CouponEvaluation {
            applied: true,
            discount_minor,
            final_minor: base_minor - discount_minor,
            coupon: Some(coupon),
            rejection: None,
        })
    }
}
