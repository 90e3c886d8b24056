//! Best-effort transaction notifications.
//!
//! One human-readable summary per completed transaction, POSTed to a single
//! configured webhook. Delivery happens on a spawned task with exactly one
//! attempt; failures are logged and never reach the checkout response path.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::entities::product_price::Currency;

/// Summary of a completed transaction
#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub customer_name: String,
    pub customer_email: String,
    pub product_name: String,
    pub currency: Currency,
    pub original_amount_minor: i64,
    pub final_amount_minor: i64,
    pub discount_minor: i64,
    pub coupon_name: Option<String>,
}

impl TransactionSummary {
    /// Single-line summary for the messaging webhook
    pub fn to_message(&self) -> String {
        let mut message = format!(
            "New purchase: {} ({}) bought {} for {}",
            self.customer_name,
            self.customer_email,
            self.product_name,
            self.currency.format_minor(self.final_amount_minor),
        );
        if self.discount_minor > 0 {
            message.push_str(&format!(
                " (was {}, {} off",
                self.currency.format_minor(self.original_amount_minor),
                self.currency.format_minor(self.discount_minor),
            ));
            if let Some(ref coupon) = self.coupon_name {
                message.push_str(&format!(" with coupon {}", coupon));
            }
            message.push(')');
        }
        message
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Fire-and-forget dispatcher for transaction summaries
#[derive(Clone)]
pub struct NotificationDispatcher {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            webhook_url,
        }
    }

    /// Disabled dispatcher: builds messages but never sends
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Queue the summary for delivery. Returns immediately; the caller never
    /// has to handle a delivery outcome.
    pub fn dispatch(&self, summary: TransactionSummary) {
        let Some(url) = self.webhook_url.clone() else {
            debug!("notification webhook not configured; summary dropped");
            return;
        };

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.deliver(&url, summary).await;
        });
    }

    /// Single best-effort delivery attempt. No retry, no backoff.
    #[instrument(skip(self, summary), fields(customer = %summary.customer_email))]
    async fn deliver(&self, url: &str, summary: TransactionSummary) {
        let message = summary.to_message();
        let payload = WebhookPayload { text: &message };

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("transaction notification delivered");
            }
            Ok(response) => {
                error!(
                    status = %response.status(),
                    "transaction notification rejected by webhook"
                );
            }
            Err(err) => {
                error!(error = %err, "transaction notification delivery failed");
            }
        }
    }
}
