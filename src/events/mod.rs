use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::entities::product_price::Currency;

/// Events emitted by the checkout engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A payment intent was registered with the provider
    PaymentIntentCreated {
        intent_id: String,
        product_id: Uuid,
        currency: Currency,
        amount_minor: i64,
        discount_minor: i64,
    },
    /// The provider confirmed a payment as succeeded
    PaymentConfirmed { intent_id: String },
    /// An entitlement row was written
    PurchaseRecorded {
        purchase_id: Uuid,
        customer_id: Uuid,
        product_id: Uuid,
        intent_id: String,
    },
    /// A new customer account was created via profile completion
    CustomerCreated(Uuid),
    /// Payment captured but local bookkeeping failed; needs an operator.
    /// The payment is never rolled back.
    ReconciliationRequired {
        intent_id: String,
        customer_email: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging (not propagating) delivery failure. Used on
    /// paths where event loss must not fail the request.
    pub async fn send_logged(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Failed to publish event");
        }
    }
}

/// Event processing loop. Consumes every event for structured logging;
/// reconciliation events are logged at ERROR so operators can alert on them.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::PaymentIntentCreated {
                intent_id,
                product_id,
                currency,
                amount_minor,
                discount_minor,
            } => {
                info!(
                    %intent_id,
                    %product_id,
                    %currency,
                    amount_minor,
                    discount_minor,
                    "payment intent created"
                );
            }
            Event::PaymentConfirmed { intent_id } => {
                info!(%intent_id, "payment confirmed");
            }
            Event::PurchaseRecorded {
                purchase_id,
                customer_id,
                product_id,
                intent_id,
            } => {
                info!(
                    %purchase_id,
                    %customer_id,
                    %product_id,
                    %intent_id,
                    "purchase recorded"
                );
            }
            Event::CustomerCreated(customer_id) => {
                info!(%customer_id, "customer created");
            }
            Event::ReconciliationRequired {
                intent_id,
                customer_email,
                reason,
            } => {
                error!(
                    %intent_id,
                    %customer_email,
                    %reason,
                    "MANUAL RECONCILIATION REQUIRED: payment captured but bookkeeping incomplete"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}
