use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{customer, Customer},
    errors::ServiceError,
    events::{Event, EventSender},
    services::routing::{record_purchase, PurchaseFacts, RouteDestination},
    sessions::{AuthSessionStore, PendingPurchaseStore},
};

/// Input for the profile-completion form
#[derive(Debug, Clone)]
pub struct CompleteProfileInput {
    pub session_token: String,
    pub password: String,
    pub accepts_marketing: bool,
}

/// Outcome of completing a profile: the account exists, the purchase is
/// recorded, the customer is signed in.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedProfile {
    pub destination: RouteDestination,
    pub customer_id: Uuid,
    pub purchase_id: Uuid,
    pub auth_token: String,
}

/// Account lookups and lazily-created customer accounts
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    pending: PendingPurchaseStore,
    auth_sessions: AuthSessionStore,
}

impl CustomerService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        pending: PendingPurchaseStore,
        auth_sessions: AuthSessionStore,
    ) -> Self {
        Self {
            db,
            event_sender,
            pending,
            auth_sessions,
        }
    }

    /// Whether an account with this email already exists
    #[instrument(skip(self))]
    pub async fn email_exists(&self, email: &str) -> Result<bool, ServiceError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<customer::Model>, ServiceError> {
        Customer::find()
            .filter(customer::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }

    /// Finish the new-customer flow: claim the pending purchase, create the
    /// account and the entitlement row in one transaction, sign the
    /// customer in.
    #[instrument(skip(self, input))]
    pub async fn complete_profile(
        &self,
        input: CompleteProfileInput,
    ) -> Result<CompletedProfile, ServiceError> {
        let pending = self.pending.take(&input.session_token).ok_or_else(|| {
            ServiceError::NotFound(
                "pending purchase not found; the session may have expired or already been completed"
                    .to_string(),
            )
        })?;

        let password_hash = hash_password(&input.password)?;

        let txn = self.db.begin().await?;

        // The email may have registered through another path since the
        // payment was confirmed; attach the purchase instead of erroring so
        // no duplicate account can appear.
        let existing = Customer::find()
            .filter(customer::Column::Email.eq(pending.email.as_str()))
            .one(&txn)
            .await?;

        let (account, created) = match existing {
            Some(account) => (account, false),
            None => {
                let account = customer::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    email: Set(pending.email.clone()),
                    first_name: Set(pending.first_name.clone()),
                    last_name: Set(pending.last_name.clone()),
                    password_hash: Set(password_hash),
                    accepts_marketing: Set(input.accepts_marketing),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                (account.insert(&txn).await?, true)
            }
        };

        let facts = PurchaseFacts::from(&pending);
        let (purchase, _) = record_purchase(&txn, account.id, &facts).await?;

        txn.commit().await?;

        if created {
            self.event_sender
                .send_logged(Event::CustomerCreated(account.id))
                .await;
        }
        self.event_sender
            .send_logged(Event::PurchaseRecorded {
                purchase_id: purchase.id,
                customer_id: account.id,
                product_id: purchase.product_id,
                intent_id: pending.payment_intent_id.clone(),
            })
            .await;

        let auth_token = self.auth_sessions.issue(account.id);

        info!(
            customer_id = %account.id,
            purchase_id = %purchase.id,
            created_account = created,
            "profile completed"
        );

        Ok(CompletedProfile {
            destination: RouteDestination::Home,
            customer_id: account.id,
            purchase_id: purchase.id,
            auth_token,
        })
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_are_salted() {
        let a = hash_password("hunter2hunter2").unwrap();
        let b = hash_password("hunter2hunter2").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2"));
    }
}
