use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    provider::{CreateIntentRequest, IntentMetadata, PaymentProvider},
    services::{coupons::CouponEvaluation, pricing::ResolvedPrice},
};

/// Customer details collected by the checkout form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerDetails {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
}

impl CustomerDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Handle returned to the browser so it can confirm the payment directly
/// with the provider
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutIntent {
    pub intent_id: String,
    pub client_secret: String,
    pub currency: crate::entities::product_price::Currency,
    /// Amount the provider will charge, in minor units (post-discount)
    pub amount_minor: i64,
    pub original_amount_minor: i64,
    pub discount_minor: i64,
    pub coupon_code: Option<String>,
}

/// Registers charges with the payment provider. One intent per checkout
/// attempt; a creation failure is fatal to the attempt and surfaced
/// unwrapped. There is no retry layer here and nothing is persisted.
#[derive(Clone)]
pub struct PaymentIntentService {
    provider: Arc<dyn PaymentProvider>,
    event_sender: Arc<EventSender>,
}

impl PaymentIntentService {
    pub fn new(provider: Arc<dyn PaymentProvider>, event_sender: Arc<EventSender>) -> Self {
        Self {
            provider,
            event_sender,
        }
    }

    /// Build and register the payment intent for a priced, discounted
    /// checkout attempt.
    #[instrument(skip(self, price, evaluation, customer), fields(product_id = %price.product.id))]
    pub async fn create_intent(
        &self,
        price: &ResolvedPrice,
        evaluation: &CouponEvaluation,
        customer: &CustomerDetails,
    ) -> Result<CheckoutIntent, ServiceError> {
        // The provider must be told to charge the discounted amount, never
        // the original. Re-derive it here so a miswired caller cannot ship
        // the pre-discount figure.
        let amount_minor = price.amount_minor - evaluation.discount_minor;
        if amount_minor < 0 || amount_minor != evaluation.final_minor {
            return Err(ServiceError::InternalError(format!(
                "inconsistent charge amount: base {} discount {} final {}",
                price.amount_minor, evaluation.discount_minor, evaluation.final_minor
            )));
        }

        let coupon = evaluation.coupon.as_ref();
        let metadata = IntentMetadata {
            original_amount_minor: price.amount_minor,
            discount_minor: evaluation.discount_minor,
            coupon_id: coupon.map(|c| c.id.clone()),
            coupon_name: coupon.and_then(|c| c.name.clone()),
            product_id: price.product.id,
            product_name: price.product.name.clone(),
            customer_email: customer.email.clone(),
            customer_name: customer.full_name(),
        };

        let request = CreateIntentRequest {
            amount_minor,
            currency: price.currency,
            description: Some(format!("Purchase of {}", price.product.name)),
            receipt_email: Some(customer.email.clone()),
            metadata,
        };

        let intent = self.provider.create_payment_intent(&request).await?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            ServiceError::ProviderError(format!(
                "intent {} returned without a client secret",
                intent.id
            ))
        })?;

        info!(
            intent_id = %intent.id,
            amount_minor,
            original_amount_minor = price.amount_minor,
            discount_minor = evaluation.discount_minor,
            "payment intent created"
        );

        self.event_sender
            .send_logged(Event::PaymentIntentCreated {
                intent_id: intent.id.clone(),
                product_id: price.product.id,
                currency: price.currency,
                amount_minor,
                discount_minor: evaluation.discount_minor,
            })
            .await;

        Ok(CheckoutIntent {
            intent_id: intent.id,
            client_secret,
            currency: price.currency,
            amount_minor,
            original_amount_minor: price.amount_minor,
            discount_minor: evaluation.discount_minor,
            coupon_code: coupon.map(|c| c.id.clone()),
        })
    }
}
