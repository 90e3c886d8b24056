//! Integration tests for the checkout pricing and payment-intent flow.
//!
//! Tests cover:
//! - Regional price resolution with fallback
//! - Coupon validation over the provider registry
//! - Payment intent creation with and without discounts
//! - Provider outage behavior (discount waived, intent creation fatal)

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use cradle_api::entities::{product_price::Currency, ProductKind};
use cradle_api::provider::{CouponDiscount, PaymentProvider, ProviderCoupon};
use serde_json::json;

fn coupon(id: &str, discount: CouponDiscount) -> ProviderCoupon {
    ProviderCoupon {
        id: id.to_string(),
        name: Some(format!("{} coupon", id)),
        discount,
        valid: true,
    }
}

// ==================== Regional Pricing Tests ====================

#[tokio::test]
async fn price_resolves_for_supported_region() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000), (Currency::Usd, 9900)],
        )
        .await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}/price", product.id),
            None,
            Some("US"),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["currency"], "USD");
    assert_eq!(body["data"]["amount_minor"], 9900);
    assert_eq!(body["data"]["fallback_applied"], false);
}

#[tokio::test]
async fn unsupported_region_falls_back_to_default_currency() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;

    for country in [Some("DE"), None] {
        let response = app
            .request(
                Method::GET,
                &format!("/api/v1/products/{}/price", product.id),
                None,
                country,
            )
            .await;
        assert_eq!(response.status(), 200);

        let body = response_json(response).await;
        assert_eq!(body["data"]["currency"], "AUD");
        assert_eq!(body["data"]["amount_minor"], 12000);
        assert_eq!(body["data"]["fallback_applied"], true);
        assert_eq!(body["data"]["display"], "$120.00 AUD");
    }
}

#[tokio::test]
async fn supported_region_without_price_row_charges_default_currency() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Toddler Sleep Course",
            ProductKind::Course,
            &[(Currency::Aud, 9500)],
        )
        .await;

    // GB is a supported region but the product has no GBP row
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}/price", product.id),
            None,
            Some("GB"),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["currency"], "AUD");
    assert_eq!(body["data"]["fallback_applied"], true);
}

#[tokio::test]
async fn unknown_product_is_404() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::GET,
            "/api/v1/products/00000000-0000-0000-0000-000000000000/price",
            None,
            Some("AU"),
        )
        .await;
    assert_eq!(response.status(), 404);
}

// ==================== Coupon Validation Tests ====================

#[tokio::test]
async fn coupon_validation_reports_discount() {
    let app = TestApp::new().await;
    app.provider
        .register_coupon(coupon("SLEEP99", CouponDiscount::PercentOff(99)));

    let response = app
        .request(
            Method::POST,
            "/api/v1/coupons/validate",
            Some(json!({"code": "SLEEP99", "amount_minor": 12000})),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["discount_minor"], 11880);
    assert_eq!(body["data"]["final_minor"], 120);
}

#[tokio::test]
async fn unknown_coupon_validates_to_full_price() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/coupons/validate",
            Some(json!({"code": "NOPE", "amount_minor": 12000})),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["discount_minor"], 0);
    assert_eq!(body["data"]["final_minor"], 12000);
    assert_eq!(body["data"]["rejection"], "not_found");
}

#[tokio::test]
async fn negative_amount_is_rejected_before_any_lookup() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/coupons/validate",
            Some(json!({"code": "SLEEP99", "amount_minor": -1})),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
}

// ==================== Payment Intent Tests ====================

#[tokio::test]
async fn intent_charges_full_price_without_coupon() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment-intent",
            Some(json!({
                "product_id": product.id,
                "email": "new@example.com",
                "first_name": "Jordan",
                "last_name": "Example"
            })),
            Some("AU"),
        )
        .await;
    assert_eq!(response.status(), 201);

    let body = response_json(response).await;
    assert_eq!(body["data"]["amount_minor"], 12000);
    assert_eq!(body["data"]["original_amount_minor"], 12000);
    assert_eq!(body["data"]["discount_minor"], 0);
    assert_eq!(body["data"]["coupon_applied"], false);
    assert!(body["data"]["client_secret"].as_str().is_some());
}

#[tokio::test]
async fn intent_charges_discounted_amount_with_coupon() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;
    app.provider
        .register_coupon(coupon("SLEEP99", CouponDiscount::PercentOff(99)));

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment-intent",
            Some(json!({
                "product_id": product.id,
                "coupon_code": "SLEEP99",
                "email": "new@example.com",
                "first_name": "Jordan",
                "last_name": "Example"
            })),
            Some("AU"),
        )
        .await;
    assert_eq!(response.status(), 201);

    let body = response_json(response).await;
    assert_eq!(body["data"]["amount_minor"], 120);
    assert_eq!(body["data"]["discount_minor"], 11880);
    assert_eq!(body["data"]["coupon_applied"], true);

    // The provider-side record must carry the discounted amount and the
    // reconstruction metadata
    let intent_id = body["data"]["intent_id"].as_str().unwrap();
    let provider_view = app
        .provider
        .retrieve_payment_intent(intent_id)
        .await
        .unwrap();
    assert_eq!(provider_view.amount_minor, 120);
    let metadata = provider_view.metadata.unwrap();
    assert_eq!(metadata.original_amount_minor, 12000);
    assert_eq!(metadata.discount_minor, 11880);
    assert_eq!(metadata.coupon_id.as_deref(), Some("SLEEP99"));
    assert_eq!(metadata.product_id, product.id);
    assert_eq!(metadata.customer_email, "new@example.com");
}

#[tokio::test]
async fn provider_outage_waives_discount_but_intent_creation_stays_fatal() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;
    app.provider
        .register_coupon(coupon("SLEEP99", CouponDiscount::PercentOff(99)));

    // Coupon lookup fails open: validation still answers at full price
    app.provider.set_unreachable(true);
    let response = app
        .request(
            Method::POST,
            "/api/v1/coupons/validate",
            Some(json!({"code": "SLEEP99", "amount_minor": 12000})),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["final_minor"], 12000);
    assert_eq!(body["data"]["rejection"], "provider_unavailable");

    // Intent creation fails closed: the checkout attempt errors out
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment-intent",
            Some(json!({
                "product_id": product.id,
                "email": "new@example.com",
                "first_name": "Jordan",
                "last_name": "Example"
            })),
            Some("AU"),
        )
        .await;
    assert_eq!(response.status(), 502);
    assert_eq!(app.provider.intent_count(), 0);
}

#[tokio::test]
async fn invalid_email_is_rejected_synchronously() {
    let app = TestApp::new().await;
    let product = app
        .seed_product(
            "Big Baby Sleep Program",
            ProductKind::Course,
            &[(Currency::Aud, 12000)],
        )
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/payment-intent",
            Some(json!({
                "product_id": product.id,
                "email": "not-an-email",
                "first_name": "Jordan",
                "last_name": "Example"
            })),
            Some("AU"),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(app.provider.intent_count(), 0);
}
