/// HTTP handlers
pub mod checkout;
pub mod common;
pub mod coupons;
pub mod customers;
pub mod health;
pub mod products;

use std::sync::Arc;

use crate::{
    entities::product_price::Currency,
    events::EventSender,
    notifications::NotificationDispatcher,
    provider::PaymentProvider,
    services::{
        coupons::CouponService, customers::CustomerService, intents::PaymentIntentService,
        pricing::RegionalPricingService, routing::PostPaymentRouter,
    },
    sessions::{AuthSessionStore, PendingPurchaseStore},
};
use sea_orm::DatabaseConnection;

/// Services shared by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub pricing: Arc<RegionalPricingService>,
    pub coupons: Arc<CouponService>,
    pub intents: Arc<PaymentIntentService>,
    pub router: Arc<PostPaymentRouter>,
    pub customers: Arc<CustomerService>,
    pub pending: PendingPurchaseStore,
    pub auth_sessions: AuthSessionStore,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        provider: Arc<dyn PaymentProvider>,
        pending: PendingPurchaseStore,
        auth_sessions: AuthSessionStore,
        notifier: NotificationDispatcher,
        default_currency: Currency,
    ) -> Self {
        let pricing = Arc::new(RegionalPricingService::new(db.clone(), default_currency));
        let coupons = Arc::new(CouponService::new(provider.clone()));
        let intents = Arc::new(PaymentIntentService::new(
            provider.clone(),
            event_sender.clone(),
        ));
        let router = Arc::new(PostPaymentRouter::new(
            db.clone(),
            provider,
            pending.clone(),
            auth_sessions.clone(),
            event_sender.clone(),
            notifier,
        ));
        let customers = Arc::new(CustomerService::new(
            db,
            event_sender,
            pending.clone(),
            auth_sessions.clone(),
        ));

        Self {
            pricing,
            coupons,
            intents,
            router,
            customers,
            pending,
            auth_sessions,
        }
    }
}
