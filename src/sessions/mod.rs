//! In-process store for pending purchases.
//!
//! A new customer's confirmed payment is parked here, keyed by an opaque
//! session token, until the profile-completion form creates the account and
//! the purchase record. Deliberately not a database table: abandoning the
//! /complete step must not leave orphaned rows, and the provider intent
//! remains the durable record for reconciliation.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::entities::product_price::Currency;

const SESSION_TOKEN_LEN: usize = 48;

/// A confirmed payment waiting for its owner to finish profile setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPurchase {
    pub payment_intent_id: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub currency: Currency,
    pub amount_minor: i64,
    pub original_amount_minor: i64,
    pub discount_minor: i64,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct Entry {
    purchase: PendingPurchase,
    expires_at: DateTime<Utc>,
}

/// TTL store of pending purchases keyed by opaque session token
#[derive(Clone)]
pub struct PendingPurchaseStore {
    entries: Arc<DashMap<String, Entry>>,
    ttl: ChronoDuration,
}

impl PendingPurchaseStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(24)),
        }
    }

    /// Park a pending purchase; returns the session token handed to the
    /// browser as its claim ticket
    pub fn insert(&self, purchase: PendingPurchase) -> String {
        let token = generate_token();
        let expires_at = Utc::now() + self.ttl;
        self.entries.insert(
            token.clone(),
            Entry {
                purchase,
                expires_at,
            },
        );
        token
    }

    /// Peek at a pending purchase without consuming it
    pub fn get(&self, token: &str) -> Option<PendingPurchase> {
        self.entries.get(token).and_then(|entry| {
            if entry.expires_at > Utc::now() {
                Some(entry.purchase.clone())
            } else {
                None
            }
        })
    }

    /// Claim a pending purchase, removing it from the store
    pub fn take(&self, token: &str) -> Option<PendingPurchase> {
        let (_, entry) = self.entries.remove(token)?;
        if entry.expires_at > Utc::now() {
            Some(entry.purchase)
        } else {
            None
        }
    }

    /// Drop expired entries; called periodically from a background task
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, "purged expired pending purchases");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

struct AuthEntry {
    customer_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// Opaque bearer tokens for authenticated customers. Issued after an
/// existing-customer checkout or profile completion; resolved by whatever
/// fronts the member area.
#[derive(Clone)]
pub struct AuthSessionStore {
    entries: Arc<DashMap<String, AuthEntry>>,
    ttl: ChronoDuration,
}

impl AuthSessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(30)),
        }
    }

    pub fn issue(&self, customer_id: Uuid) -> String {
        let token = generate_token();
        self.entries.insert(
            token.clone(),
            AuthEntry {
                customer_id,
                expires_at: Utc::now() + self.ttl,
            },
        );
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        self.entries.get(token).and_then(|entry| {
            if entry.expires_at > Utc::now() {
                Some(entry.customer_id)
            } else {
                None
            }
        })
    }

    pub fn revoke(&self, token: &str) {
        self.entries.remove(token);
    }
}

/// Spawns the periodic purge loop for a store
pub fn spawn_purge_task(store: PendingPurchaseStore, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            store.purge_expired();
        }
    });
}
