//! In-memory payment provider used by the test suites and local demos.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::{
    CreateIntentRequest, PaymentIntentStatus, PaymentProvider, ProviderCoupon, ProviderError,
    ProviderPaymentIntent,
};

/// Deterministic provider double: coupons are registered up front, intents
/// are held in memory, and payment confirmation is driven explicitly with
/// [`MockPaymentProvider::succeed_intent`].
#[derive(Clone, Default)]
pub struct MockPaymentProvider {
    coupons: Arc<DashMap<String, ProviderCoupon>>,
    intents: Arc<DashMap<String, ProviderPaymentIntent>>,
    unreachable: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_coupon(&self, coupon: ProviderCoupon) {
        self.coupons.insert(coupon.id.clone(), coupon);
    }

    /// Simulate a provider outage for every subsequent call
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Drive an intent to its terminal succeeded status, as the browser-side
    /// confirmation would
    pub fn succeed_intent(&self, intent_id: &str) {
        if let Some(mut intent) = self.intents.get_mut(intent_id) {
            intent.status = PaymentIntentStatus::Succeeded;
        }
    }

    /// Force an intent into an arbitrary status
    pub fn set_intent_status(&self, intent_id: &str, status: PaymentIntentStatus) {
        if let Some(mut intent) = self.intents.get_mut(intent_id) {
            intent.status = status;
        }
    }

    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    fn check_reachable(&self) -> Result<(), ProviderError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(ProviderError::Transport(
                "connection refused (mock outage)".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn fetch_coupon(&self, code: &str) -> Result<ProviderCoupon, ProviderError> {
        self.check_reachable()?;
        self.coupons
            .get(code)
            .map(|entry| entry.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("coupon {}", code)))
    }

    async fn create_payment_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> Result<ProviderPaymentIntent, ProviderError> {
        self.check_reachable()?;

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pi_mock_{:08}", seq);
        let intent = ProviderPaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{}_secret_{:08}", id, seq)),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            amount_minor: request.amount_minor,
            currency: request.currency,
            metadata: Some(request.metadata.clone()),
        };
        self.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<ProviderPaymentIntent, ProviderError> {
        self.check_reachable()?;
        self.intents
            .get(intent_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("payment intent {}", intent_id)))
    }
}
