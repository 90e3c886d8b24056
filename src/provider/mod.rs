//! Payment provider integration.
//!
//! Coupons and payment intents are owned by the external provider; this
//! module holds the typed read models and the client seam. The engine never
//! reimplements payment processing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::product_price::Currency;

pub mod http;
pub mod mock;

pub use http::HttpPaymentProvider;
pub use mock::MockPaymentProvider;

/// Metadata keys attached to every payment intent. A delayed webhook or
/// reconciliation job can rebuild the full transaction from these alone.
pub const META_ORIGINAL_AMOUNT: &str = "original_amount_minor";
pub const META_DISCOUNT_AMOUNT: &str = "discount_amount_minor";
pub const META_COUPON_ID: &str = "coupon_id";
pub const META_COUPON_NAME: &str = "coupon_name";
pub const META_PRODUCT_ID: &str = "product_id";
pub const META_PRODUCT_NAME: &str = "product_name";
pub const META_CUSTOMER_EMAIL: &str = "customer_email";
pub const META_CUSTOMER_NAME: &str = "customer_name";

/// Errors from the payment provider boundary
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The referenced resource does not exist at the provider
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The provider could not be reached or timed out
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The provider answered with an error object
    #[error("provider error {code}: {message}")]
    Api { code: String, message: String },

    /// The provider answered with a payload we could not interpret
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

impl From<ProviderError> for crate::errors::ServiceError {
    fn from(err: ProviderError) -> Self {
        crate::errors::ServiceError::ProviderError(err.to_string())
    }
}

/// Discount rule carried by a provider coupon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponDiscount {
    /// 1-100 percent off the base amount
    PercentOff(u8),
    /// Fixed amount off, in minor units
    AmountOff { amount_minor: i64 },
}

/// Read model of a coupon registered with the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCoupon {
    pub id: String,
    pub name: Option<String>,
    pub discount: CouponDiscount,
    /// Provider-side validity flag (expired/deactivated coupons are invalid)
    pub valid: bool,
}

/// Provider-reported payment intent status.
/// `succeeded` is terminal: once observed, re-querying returns it forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

impl PaymentIntentStatus {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, PaymentIntentStatus::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentIntentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentIntentStatus::RequiresAction => "requires_action",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Canceled => "canceled",
            PaymentIntentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "requires_payment_method" => Some(Self::RequiresPaymentMethod),
            "requires_confirmation" => Some(Self::RequiresConfirmation),
            "requires_action" => Some(Self::RequiresAction),
            "processing" => Some(Self::Processing),
            "succeeded" => Some(Self::Succeeded),
            "canceled" => Some(Self::Canceled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Fixed-shape metadata attached to every intent, replacing the open
/// string-keyed blobs this kind of integration tends to accumulate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub original_amount_minor: i64,
    pub discount_minor: i64,
    pub coupon_id: Option<String>,
    pub coupon_name: Option<String>,
    pub product_id: Uuid,
    pub product_name: String,
    pub customer_email: String,
    pub customer_name: String,
}

impl IntentMetadata {
    /// Flatten to the provider's string-keyed wire format
    pub fn to_wire(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            META_ORIGINAL_AMOUNT.to_string(),
            self.original_amount_minor.to_string(),
        );
        map.insert(
            META_DISCOUNT_AMOUNT.to_string(),
            self.discount_minor.to_string(),
        );
        if let Some(ref coupon_id) = self.coupon_id {
            map.insert(META_COUPON_ID.to_string(), coupon_id.clone());
        }
        if let Some(ref coupon_name) = self.coupon_name {
            map.insert(META_COUPON_NAME.to_string(), coupon_name.clone());
        }
        map.insert(META_PRODUCT_ID.to_string(), self.product_id.to_string());
        map.insert(META_PRODUCT_NAME.to_string(), self.product_name.clone());
        map.insert(
            META_CUSTOMER_EMAIL.to_string(),
            self.customer_email.clone(),
        );
        map.insert(META_CUSTOMER_NAME.to_string(), self.customer_name.clone());
        map
    }

    /// Rebuild from the wire format; absent numeric keys read as zero so a
    /// hand-edited provider record still parses
    pub fn from_wire(map: &HashMap<String, String>) -> Option<Self> {
        let product_id = map
            .get(META_PRODUCT_ID)
            .and_then(|v| Uuid::parse_str(v).ok())?;
        Some(Self {
            original_amount_minor: map
                .get(META_ORIGINAL_AMOUNT)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            discount_minor: map
                .get(META_DISCOUNT_AMOUNT)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            coupon_id: map.get(META_COUPON_ID).cloned(),
            coupon_name: map.get(META_COUPON_NAME).cloned(),
            product_id,
            product_name: map.get(META_PRODUCT_NAME).cloned().unwrap_or_default(),
            customer_email: map.get(META_CUSTOMER_EMAIL).cloned().unwrap_or_default(),
            customer_name: map.get(META_CUSTOMER_NAME).cloned().unwrap_or_default(),
        })
    }
}

/// Request to register a charge with the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    /// Amount to charge, in minor units. Always the discounted amount.
    pub amount_minor: i64,
    pub currency: Currency,
    pub description: Option<String>,
    pub receipt_email: Option<String>,
    pub metadata: IntentMetadata,
}

/// Read model of a provider payment intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPaymentIntent {
    pub id: String,
    /// Opaque token the browser uses to confirm the payment
    pub client_secret: Option<String>,
    pub status: PaymentIntentStatus,
    pub amount_minor: i64,
    pub currency: Currency,
    pub metadata: Option<IntentMetadata>,
}

/// Client seam for the external payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Look up a coupon by its code/id in the provider's registry
    async fn fetch_coupon(&self, code: &str) -> Result<ProviderCoupon, ProviderError>;

    /// Register a charge; returns the intent with its client secret
    async fn create_payment_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> Result<ProviderPaymentIntent, ProviderError>;

    /// Retrieve the current state of an intent
    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<ProviderPaymentIntent, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> IntentMetadata {
        IntentMetadata {
            original_amount_minor: 12000,
            discount_minor: 11880,
            coupon_id: Some("SLEEP99".to_string()),
            coupon_name: Some("Launch special".to_string()),
            product_id: Uuid::new_v4(),
            product_name: "Big Baby Sleep Program".to_string(),
            customer_email: "new@example.com".to_string(),
            customer_name: "Jordan Example".to_string(),
        }
    }

    #[test]
    fn metadata_round_trips_through_wire_format() {
        let metadata = sample_metadata();
        let wire = metadata.to_wire();
        let parsed = IntentMetadata::from_wire(&wire).expect("wire metadata should parse");
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn metadata_without_coupon_omits_coupon_keys() {
        let mut metadata = sample_metadata();
        metadata.coupon_id = None;
        metadata.coupon_name = None;
        let wire = metadata.to_wire();
        assert!(!wire.contains_key(META_COUPON_ID));
        assert!(!wire.contains_key(META_COUPON_NAME));
    }

    #[test]
    fn succeeded_status_round_trips() {
        let status = PaymentIntentStatus::parse("succeeded").unwrap();
        assert!(status.is_succeeded());
        assert_eq!(status.as_str(), "succeeded");
    }
}
