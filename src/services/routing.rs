use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{customer, purchase_record, Customer},
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{NotificationDispatcher, TransactionSummary},
    provider::{IntentMetadata, PaymentProvider, ProviderPaymentIntent},
    sessions::{AuthSessionStore, PendingPurchase, PendingPurchaseStore},
    services::intents::CustomerDetails,
};

/// Where the browser goes after a confirmed payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteDestination {
    /// Profile/password setup page for customers with no account yet
    Complete,
    /// Member dashboard for customers with an existing account
    Home,
}

impl RouteDestination {
    pub fn path(&self) -> &'static str {
        match self {
            RouteDestination::Complete => "/complete",
            RouteDestination::Home => "/home",
        }
    }
}

/// Identity resolution outcome for the paying customer
enum CustomerIdentity {
    New,
    Existing(customer::Model),
}

/// Result of routing a confirmed payment
#[derive(Debug, Clone, Serialize)]
pub struct RoutedOutcome {
    pub destination: RouteDestination,
    /// Pending-purchase claim ticket (new customers only)
    pub session_token: Option<String>,
    /// Authenticated session token (existing customers only)
    pub auth_token: Option<String>,
    pub customer_id: Option<Uuid>,
    pub purchase_id: Option<Uuid>,
}

/// Decides where a paying customer lands after the provider confirms their
/// payment, and performs the corresponding account/purchase mutation.
///
/// Runs strictly after a provider-confirmed `succeeded` status; any other
/// status aborts with no mutation and no notification. A bookkeeping
/// failure after that point never rolls the payment back; it is recorded
/// for manual reconciliation instead.
#[derive(Clone)]
pub struct PostPaymentRouter {
    db: Arc<DatabaseConnection>,
    provider: Arc<dyn PaymentProvider>,
    pending: PendingPurchaseStore,
    auth_sessions: AuthSessionStore,
    event_sender: Arc<EventSender>,
    notifier: NotificationDispatcher,
}

impl PostPaymentRouter {
    pub fn new(
        db: Arc<DatabaseConnection>,
        provider: Arc<dyn PaymentProvider>,
        pending: PendingPurchaseStore,
        auth_sessions: AuthSessionStore,
        event_sender: Arc<EventSender>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            provider,
            pending,
            auth_sessions,
            event_sender,
            notifier,
        }
    }

    /// Confirm a completed payment and route the customer.
    #[instrument(skip(self, customer), fields(email = %customer.email))]
    pub async fn confirm(
        &self,
        payment_intent_id: &str,
        customer: &CustomerDetails,
    ) -> Result<RoutedOutcome, ServiceError> {
        let intent = self
            .provider
            .retrieve_payment_intent(payment_intent_id)
            .await?;

        if !intent.status.is_succeeded() {
            return Err(ServiceError::PaymentNotConfirmed {
                intent_id: intent.id,
                status: intent.status.as_str().to_string(),
            });
        }

        self.event_sender
            .send_logged(Event::PaymentConfirmed {
                intent_id: intent.id.clone(),
            })
            .await;

        let metadata = intent.metadata.clone().ok_or_else(|| {
            ServiceError::InvalidOperation(format!(
                "payment intent {} carries no checkout metadata",
                intent.id
            ))
        })?;

        let (outcome, first_confirmation) = match self.resolve_identity(&customer.email).await? {
            CustomerIdentity::New => (
                self.route_new_customer(&intent, &metadata, customer),
                true,
            ),
            CustomerIdentity::Existing(account) => {
                self.route_existing_customer(&intent, &metadata, account)
                    .await?
            }
        };

        // One summary per completed transaction; a repeated confirm call for
        // an already-recorded intent stays silent
        if first_confirmation {
            self.notifier.dispatch(TransactionSummary {
                customer_name: metadata.customer_name.clone(),
                customer_email: customer.email.clone(),
                product_name: metadata.product_name.clone(),
                currency: intent.currency,
                original_amount_minor: metadata.original_amount_minor,
                final_amount_minor: intent.amount_minor,
                discount_minor: metadata.discount_minor,
                coupon_name: metadata.coupon_name.clone(),
            });
        }

        Ok(outcome)
    }

    async fn resolve_identity(&self, email: &str) -> Result<CustomerIdentity, ServiceError> {
        let account = Customer::find()
            .filter(customer::Column::Email.eq(email))
            .one(&*self.db)
            .await?;

        Ok(match account {
            Some(account) => CustomerIdentity::Existing(account),
            None => CustomerIdentity::New,
        })
    }

    /// New customer: no account row yet. Park the purchase against a session
    /// token and send them to profile setup.
    fn route_new_customer(
        &self,
        intent: &ProviderPaymentIntent,
        metadata: &IntentMetadata,
        customer: &CustomerDetails,
    ) -> RoutedOutcome {
        let token = self.pending.insert(PendingPurchase {
            payment_intent_id: intent.id.clone(),
            product_id: metadata.product_id,
            product_name: metadata.product_name.clone(),
            email: customer.email.clone(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            currency: intent.currency,
            amount_minor: intent.amount_minor,
            original_amount_minor: metadata.original_amount_minor,
            discount_minor: metadata.discount_minor,
            coupon_code: metadata.coupon_id.clone(),
            created_at: Utc::now(),
        });

        info!(intent_id = %intent.id, "new customer routed to profile setup");

        RoutedOutcome {
            destination: RouteDestination::Complete,
            session_token: Some(token),
            auth_token: None,
            customer_id: None,
            purchase_id: None,
        }
    }

    /// Existing customer: record the entitlement now and sign them in.
    async fn route_existing_customer(
        &self,
        intent: &ProviderPaymentIntent,
        metadata: &IntentMetadata,
        account: customer::Model,
    ) -> Result<(RoutedOutcome, bool), ServiceError> {
        let facts = PurchaseFacts::from_intent(intent, metadata);
        let (purchase, created) = match record_purchase(&*self.db, account.id, &facts).await {
            Ok(result) => result,
            Err(err) => {
                // The charge stands; never attempt a rollback or refund here.
                error!(
                    intent_id = %intent.id,
                    customer_id = %account.id,
                    error = %err,
                    "purchase bookkeeping failed after confirmed payment"
                );
                self.event_sender
                    .send_logged(Event::ReconciliationRequired {
                        intent_id: intent.id.clone(),
                        customer_email: account.email.clone(),
                        reason: err.to_string(),
                    })
                    .await;
                return Err(ServiceError::InternalError(
                    "purchase could not be recorded; payment stands and has been flagged for follow-up"
                        .to_string(),
                ));
            }
        };

        if created {
            self.event_sender
                .send_logged(Event::PurchaseRecorded {
                    purchase_id: purchase.id,
                    customer_id: account.id,
                    product_id: purchase.product_id,
                    intent_id: intent.id.clone(),
                })
                .await;
        }

        let auth_token = self.auth_sessions.issue(account.id);

        info!(
            intent_id = %intent.id,
            customer_id = %account.id,
            "existing customer routed to dashboard"
        );

        Ok((
            RoutedOutcome {
                destination: RouteDestination::Home,
                session_token: None,
                auth_token: Some(auth_token),
                customer_id: Some(account.id),
                purchase_id: Some(purchase.id),
            },
            created,
        ))
    }
}

/// Facts needed to write an entitlement row, whichever flow produced them
#[derive(Debug, Clone)]
pub(crate) struct PurchaseFacts {
    pub payment_intent_id: String,
    pub product_id: Uuid,
    pub currency: crate::entities::product_price::Currency,
    pub amount_minor: i64,
    pub original_amount_minor: i64,
    pub discount_minor: i64,
    pub coupon_code: Option<String>,
}

impl PurchaseFacts {
    fn from_intent(intent: &ProviderPaymentIntent, metadata: &IntentMetadata) -> Self {
        Self {
            payment_intent_id: intent.id.clone(),
            product_id: metadata.product_id,
            currency: intent.currency,
            amount_minor: intent.amount_minor,
            original_amount_minor: metadata.original_amount_minor,
            discount_minor: metadata.discount_minor,
            coupon_code: metadata.coupon_id.clone(),
        }
    }
}

impl From<&PendingPurchase> for PurchaseFacts {
    fn from(pending: &PendingPurchase) -> Self {
        Self {
            payment_intent_id: pending.payment_intent_id.clone(),
            product_id: pending.product_id,
            currency: pending.currency,
            amount_minor: pending.amount_minor,
            original_amount_minor: pending.original_amount_minor,
            discount_minor: pending.discount_minor,
            coupon_code: pending.coupon_code.clone(),
        }
    }
}

/// Write the entitlement row for a confirmed intent. Idempotent on the
/// provider intent id: re-confirming returns the existing row untouched,
/// flagged by the returned bool (true = newly created).
pub(crate) async fn record_purchase<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    facts: &PurchaseFacts,
) -> Result<(purchase_record::Model, bool), ServiceError> {
    if let Some(existing) = purchase_record::Entity::find()
        .filter(purchase_record::Column::PaymentIntentId.eq(facts.payment_intent_id.as_str()))
        .one(conn)
        .await?
    {
        info!(
            intent_id = %facts.payment_intent_id,
            purchase_id = %existing.id,
            "purchase already recorded"
        );
        return Ok((existing, false));
    }

    let record = purchase_record::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        product_id: Set(facts.product_id),
        payment_intent_id: Set(facts.payment_intent_id.clone()),
        currency: Set(facts.currency),
        amount_minor: Set(facts.amount_minor),
        original_amount_minor: Set(facts.original_amount_minor),
        discount_minor: Set(facts.discount_minor),
        coupon_code: Set(facts.coupon_code.clone()),
        created_at: Set(Utc::now()),
    };

    let record = record.insert(conn).await?;
    Ok((record, true))
}
