use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use cradle_api::{
    config::{AppConfig, ProviderConfig},
    db,
    entities::{customer, product, product_price, product_price::Currency, ProductKind},
    events::{self, EventSender},
    handlers::AppServices,
    notifications::NotificationDispatcher,
    provider::MockPaymentProvider,
    sessions::{AuthSessionStore, PendingPurchaseStore},
    AppState,
};

/// Harness spinning up the application against an in-memory SQLite database
/// and a mock payment provider.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub provider: MockPaymentProvider,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let cfg = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 18_080,
            environment: "test".to_string(),
            log_level: "warn".to_string(),
            log_json: false,
            provider: ProviderConfig {
                api_base: "http://localhost:0".to_string(),
                secret_key: "sk_test_000000000000000000000000".to_string(),
                timeout_secs: 1,
            },
            default_currency: "AUD".to_string(),
            notification_webhook_url: None,
            pending_purchase_ttl_secs: 3600,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
        };

        // A single pooled connection so every query sees the same in-memory
        // database
        let db_config = db::DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(5),
        };
        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        db::ensure_schema(&pool).await.expect("schema setup failed");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let provider = MockPaymentProvider::new();
        let pending = PendingPurchaseStore::new(Duration::from_secs(3600));
        let auth_sessions = AuthSessionStore::new(Duration::from_secs(3600));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            Arc::new(provider.clone()),
            pending,
            auth_sessions,
            NotificationDispatcher::disabled(),
            Currency::Aud,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/health", cradle_api::handlers::health::health_routes())
            .nest("/api/v1", cradle_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            provider,
            _event_task: event_task,
        }
    }

    /// Issue a request against the in-process router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        country: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(country) = country {
            builder = builder.header("x-country-code", country);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Seed a product with per-currency price rows.
    pub async fn seed_product(
        &self,
        name: &str,
        kind: ProductKind,
        prices: &[(Currency, i64)],
    ) -> product::Model {
        let product_id = Uuid::new_v4();
        let slug = name.to_lowercase().replace(' ', "-");
        let row = product::ActiveModel {
            id: Set(product_id),
            name: Set(name.to_string()),
            slug: Set(slug),
            kind: Set(kind),
            billing_period: Set(match kind {
                ProductKind::Subscription => Some("month".to_string()),
                ProductKind::Course => None,
            }),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let model = row.insert(&*self.state.db).await.expect("seed product");

        for (currency, amount_minor) in prices {
            let price = product_price::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                currency: Set(*currency),
                amount_minor: Set(*amount_minor),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            price.insert(&*self.state.db).await.expect("seed price");
        }

        model
    }

    /// Seed an existing customer account.
    pub async fn seed_customer(&self, email: &str) -> customer::Model {
        let row = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            first_name: Set("Existing".to_string()),
            last_name: Set("Customer".to_string()),
            password_hash: Set("$argon2id$v=19$m=19456,t=2,p=1$seeded$seeded".to_string()),
            accepts_marketing: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        row.insert(&*self.state.db).await.expect("seed customer")
    }
}

/// Parse a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
