//! Integration tests for post-payment identity routing.
//!
//! Tests cover:
//! - New customers routed to /complete with no account mutation
//! - Profile completion creating exactly one account and one purchase
//! - Existing customers routed to /home with an immediate purchase record
//! - Purchase records existing iff the intent succeeded
//! - Idempotent re-confirmation of the same intent

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use cradle_api::entities::{product, product_price::Currency, Customer, ProductKind, PurchaseRecord};
use sea_orm::EntityTrait;
use serde_json::{json, Value};

async fn create_confirmed_intent(
    app: &TestApp,
    product: &product::Model,
    email: &str,
    coupon_code: Option<&str>,
) -> String {
    let mut payload = json!({
        "product_id": product.id,
        "email": email,
        "first_name": "Jordan",
        "last_name": "Example"
    });
    if let Some(code) = coupon_code {
        payload["coupon_code"] = json!(code);
    }

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment-intent",
            Some(payload),
            Some("AU"),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let intent_id = body["data"]["intent_id"].as_str().unwrap().to_string();

    // The browser-side confirmation step, driven directly on the mock
    app.provider.succeed_intent(&intent_id);
    intent_id
}

async fn confirm(app: &TestApp, intent_id: &str, email: &str) -> (u16, Value) {
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/confirm",
            Some(json!({
                "payment_intent_id": intent_id,
                "email": email,
                "first_name": "Jordan",
                "last_name": "Example"
            })),
            None,
        )
        .await;
    let status = response.status().as_u16();
    (status, response_json(response).await)
}

async fn customer_count(app: &TestApp) -> usize {
    Customer::find().all(&*app.state.db).await.unwrap().len()
}

async fn purchase_count(app: &TestApp) -> usize {
    PurchaseRecord::find().all(&*app.state.db).await.unwrap().len()
}

// ==================== New Customer Flow Tests ====================

#[tokio::test]
async fn new_customer_routes_to_complete_without_account_mutation() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;

    let intent_id = create_confirmed_intent(&app, &product, "new@example.com", None).await;
    let (status, body) = confirm(&app, &intent_id, "new@example.com").await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["route"], "/complete");
    assert!(body["data"]["session_token"].as_str().is_some());
    assert!(body["data"]["customer_id"].is_null());

    // No account row and no entitlement yet
    assert_eq!(customer_count(&app).await, 0);
    assert_eq!(purchase_count(&app).await, 0);
}

#[tokio::test]
async fn profile_completion_creates_exactly_one_account_and_purchase() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;

    let intent_id = create_confirmed_intent(&app, &product, "new@example.com", None).await;
    let (_, body) = confirm(&app, &intent_id, "new@example.com").await;
    let session_token = body["data"]["session_token"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            "/api/v1/customers/complete-profile",
            Some(json!({
                "session_token": session_token,
                "password": "correct-horse-battery",
                "accepts_marketing": true
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(body["data"]["route"], "/home");
    assert!(body["data"]["auth_token"].as_str().is_some());

    assert_eq!(customer_count(&app).await, 1);
    assert_eq!(purchase_count(&app).await, 1);

    let purchase = PurchaseRecord::find()
        .all(&*app.state.db)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(purchase.payment_intent_id, intent_id);
    assert_eq!(purchase.amount_minor, 12000);

    // The claim ticket is single-use
    let response = app
        .request(
            Method::POST,
            "/api/v1/customers/complete-profile",
            Some(json!({
                "session_token": session_token,
                "password": "correct-horse-battery"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
    assert_eq!(customer_count(&app).await, 1);
    assert_eq!(purchase_count(&app).await, 1);
}

#[tokio::test]
async fn returning_customer_second_purchase_routes_home_without_duplicate_account() {
    let app = TestApp::new().await;
    let course = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;
    let toddler = app
        .seed_product(
            "Toddler Sleep Course",
            ProductKind::Course,
            &[(Currency::Aud, 9500)],
        )
        .await;

    // First purchase: complete the new-customer flow
    let intent_id = create_confirmed_intent(&app, &course, "new@example.com", None).await;
    let (_, body) = confirm(&app, &intent_id, "new@example.com").await;
    let session_token = body["data"]["session_token"].as_str().unwrap();
    let response = app
        .request(
            Method::POST,
            "/api/v1/customers/complete-profile",
            Some(json!({
                "session_token": session_token,
                "password": "correct-horse-battery"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);

    // Second purchase with the same email now routes as an existing user
    let intent_id = create_confirmed_intent(&app, &toddler, "new@example.com", None).await;
    let (status, body) = confirm(&app, &intent_id, "new@example.com").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["route"], "/home");
    assert!(body["data"]["auth_token"].as_str().is_some());

    assert_eq!(customer_count(&app).await, 1);
    assert_eq!(purchase_count(&app).await, 2);
}

// ==================== Existing Customer Flow Tests ====================

#[tokio::test]
async fn existing_customer_routes_home_with_immediate_purchase_record() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;
    let account = app.seed_customer("existing@example.com").await;

    let intent_id = create_confirmed_intent(&app, &product, "existing@example.com", None).await;
    let (status, body) = confirm(&app, &intent_id, "existing@example.com").await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["route"], "/home");
    assert!(body["data"]["auth_token"].as_str().is_some());
    assert!(body["data"]["session_token"].is_null());
    assert_eq!(
        body["data"]["customer_id"].as_str().unwrap(),
        account.id.to_string()
    );

    assert_eq!(customer_count(&app).await, 1);
    assert_eq!(purchase_count(&app).await, 1);
}

#[tokio::test]
async fn reconfirming_the_same_intent_does_not_duplicate_the_purchase() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;
    app.seed_customer("existing@example.com").await;

    let intent_id = create_confirmed_intent(&app, &product, "existing@example.com", None).await;
    let (_, first) = confirm(&app, &intent_id, "existing@example.com").await;
    let (status, second) = confirm(&app, &intent_id, "existing@example.com").await;

    assert_eq!(status, 200);
    assert_eq!(second["data"]["route"], "/home");
    assert_eq!(first["data"]["purchase_id"], second["data"]["purchase_id"]);
    assert_eq!(purchase_count(&app).await, 1);
}

// ==================== Entry Condition Tests ====================

#[tokio::test]
async fn unconfirmed_payment_aborts_with_no_mutation() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;
    app.seed_customer("existing@example.com").await;

    // Create the intent but never confirm the payment
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment-intent",
            Some(json!({
                "product_id": product.id,
                "email": "existing@example.com",
                "first_name": "Jordan",
                "last_name": "Example"
            })),
            Some("AU"),
        )
        .await;
    let body = response_json(response).await;
    let intent_id = body["data"]["intent_id"].as_str().unwrap().to_string();

    let (status, _) = confirm(&app, &intent_id, "existing@example.com").await;
    assert_eq!(status, 402);
    assert_eq!(purchase_count(&app).await, 0);

    // Once confirmed, the same intent routes normally
    app.provider.succeed_intent(&intent_id);
    let (status, body) = confirm(&app, &intent_id, "existing@example.com").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["route"], "/home");
    assert_eq!(purchase_count(&app).await, 1);
}

#[tokio::test]
async fn unknown_intent_is_a_provider_error() {
    let app = TestApp::new().await;
    app.seed_customer("existing@example.com").await;

    let (status, _) = confirm(&app, "pi_does_not_exist", "existing@example.com").await;
    assert_eq!(status, 502);
    assert_eq!(purchase_count(&app).await, 0);
}

// ==================== Discounted Purchase Bookkeeping Tests ====================

#[tokio::test]
async fn discounted_purchase_records_original_and_discount_amounts() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;
    app.seed_customer("existing@example.com").await;
    app.provider.register_coupon(cradle_api::provider::ProviderCoupon {
        id: "SLEEP99".to_string(),
        name: Some("Launch special".to_string()),
        discount: cradle_api::provider::CouponDiscount::PercentOff(99),
        valid: true,
    });

    let intent_id =
        create_confirmed_intent(&app, &product, "existing@example.com", Some("SLEEP99")).await;
    let (status, _) = confirm(&app, &intent_id, "existing@example.com").await;
    assert_eq!(status, 200);

    let purchase = PurchaseRecord::find()
        .all(&*app.state.db)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(purchase.amount_minor, 120);
    assert_eq!(purchase.original_amount_minor, 12000);
    assert_eq!(purchase.discount_minor, 11880);
    assert_eq!(purchase.coupon_code.as_deref(), Some("SLEEP99"));
    assert_eq!(purchase.product_id, product.id);
}

// ==================== Email Lookup Tests ====================

#[tokio::test]
async fn email_exists_tracks_account_creation() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/customers/exists?email=someone@example.com",
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["exists"], false);

    app.seed_customer("someone@example.com").await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/customers/exists?email=someone@example.com",
            None,
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["exists"], true);
}
