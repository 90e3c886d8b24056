//! Stripe-wire-shaped HTTP client for the payment provider.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::{
    CouponDiscount, CreateIntentRequest, PaymentIntentStatus, PaymentProvider, ProviderCoupon,
    ProviderError, ProviderPaymentIntent,
};
use crate::config::ProviderConfig;
use crate::entities::product_price::Currency;

/// HTTP payment provider client.
/// Timeouts come from configuration; there is no retry layer here, so
/// intent creation failures surface to the caller as-is.
#[derive(Clone)]
pub struct HttpPaymentProvider {
    client: reqwest::Client,
    api_base: Url,
    secret_key: String,
}

impl HttpPaymentProvider {
    pub fn new(cfg: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_base = Url::parse(&cfg.api_base)
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid api_base: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base,
            secret_key: cfg.secret_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.api_base
            .join(path)
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid endpoint: {}", e)))
    }

    async fn handle_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return ProviderError::NotFound(status.to_string());
        }

        match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => ProviderError::Api {
                code: envelope
                    .error
                    .code
                    .or(envelope.error.error_type)
                    .unwrap_or_else(|| status.as_u16().to_string()),
                message: envelope.error.message.unwrap_or_default(),
            },
            Err(_) => ProviderError::Api {
                code: status.as_u16().to_string(),
                message: status.to_string(),
            },
        }
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    #[instrument(skip(self))]
    async fn fetch_coupon(&self, code: &str) -> Result<ProviderCoupon, ProviderError> {
        let url = self.endpoint(&format!("v1/coupons/{}", code))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let payload: CouponPayload = response.json().await.map_err(ProviderError::from)?;
        payload.try_into()
    }

    #[instrument(skip(self, request), fields(amount_minor = request.amount_minor, currency = %request.currency))]
    async fn create_payment_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> Result<ProviderPaymentIntent, ProviderError> {
        let url = self.endpoint("v1/payment_intents")?;

        // The provider expects a form-encoded body with bracketed metadata keys
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.provider_code()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        if let Some(ref description) = request.description {
            form.push(("description".to_string(), description.clone()));
        }
        if let Some(ref receipt_email) = request.receipt_email {
            form.push(("receipt_email".to_string(), receipt_email.clone()));
        }
        for (key, value) in request.metadata.to_wire() {
            form.push((format!("metadata[{}]", key), value));
        }

        debug!(url = %url, "creating payment intent");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let payload: IntentPayload = response.json().await.map_err(ProviderError::from)?;
        payload.try_into()
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<ProviderPaymentIntent, ProviderError> {
        let url = self.endpoint(&format!("v1/payment_intents/{}", intent_id))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let payload: IntentPayload = response.json().await.map_err(ProviderError::from)?;
        payload.try_into()
    }
}

// Wire payloads

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CouponPayload {
    id: String,
    name: Option<String>,
    percent_off: Option<f64>,
    amount_off: Option<i64>,
    #[serde(default)]
    valid: bool,
}

impl TryFrom<CouponPayload> for ProviderCoupon {
    type Error = ProviderError;

    fn try_from(payload: CouponPayload) -> Result<Self, Self::Error> {
        let discount = match (payload.percent_off, payload.amount_off) {
            (Some(percent), _) => {
                let percent = percent.round() as i64;
                if !(1..=100).contains(&percent) {
                    return Err(ProviderError::InvalidResponse(format!(
                        "coupon {} has percent_off outside 1-100: {}",
                        payload.id, percent
                    )));
                }
                CouponDiscount::PercentOff(percent as u8)
            }
            (None, Some(amount_minor)) => CouponDiscount::AmountOff { amount_minor },
            (None, None) => {
                return Err(ProviderError::InvalidResponse(format!(
                    "coupon {} carries neither percent_off nor amount_off",
                    payload.id
                )))
            }
        };

        Ok(ProviderCoupon {
            id: payload.id,
            name: payload.name,
            discount,
            valid: payload.valid,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IntentPayload {
    id: String,
    client_secret: Option<String>,
    status: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl TryFrom<IntentPayload> for ProviderPaymentIntent {
    type Error = ProviderError;

    fn try_from(payload: IntentPayload) -> Result<Self, Self::Error> {
        let status = PaymentIntentStatus::parse(&payload.status).ok_or_else(|| {
            ProviderError::InvalidResponse(format!("unknown intent status: {}", payload.status))
        })?;
        let currency = Currency::parse(&payload.currency).ok_or_else(|| {
            ProviderError::InvalidResponse(format!("unsupported currency: {}", payload.currency))
        })?;

        Ok(ProviderPaymentIntent {
            id: payload.id,
            client_secret: payload.client_secret,
            status,
            amount_minor: payload.amount,
            currency,
            metadata: super::IntentMetadata::from_wire(&payload.metadata),
        })
    }
}
