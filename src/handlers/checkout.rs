use crate::errors::ServiceError;
use crate::handlers::common::country_from_headers;
use crate::services::{intents::CustomerDetails, routing::RouteDestination};
use crate::ApiResponse;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "product_id": "550e8400-e29b-41d4-a716-446655440000",
    "coupon_code": "SLEEP99",
    "email": "new@example.com",
    "first_name": "Jordan",
    "last_name": "Example"
}))]
pub struct CreatePaymentIntentRequest {
    /// Product to purchase
    pub product_id: Uuid,
    /// Optional coupon code (case-sensitive)
    #[validate(length(min = 1, max = 64))]
    pub coupon_code: Option<String>,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePaymentIntentResponse {
    /// Provider-issued intent id
    #[schema(example = "pi_3MtwBwLkdIwHu7ix28a3tqPa")]
    pub intent_id: String,
    /// Opaque token the browser uses to confirm the payment with the
    /// provider directly
    pub client_secret: String,
    pub currency: crate::entities::product_price::Currency,
    /// Amount the provider will charge, in minor units (post-discount)
    #[schema(example = 120)]
    pub amount_minor: i64,
    #[schema(example = 12000)]
    pub original_amount_minor: i64,
    #[schema(example = 11880)]
    pub discount_minor: i64,
    pub coupon_applied: bool,
    pub coupon_code: Option<String>,
}

/// Create a payment intent for a checkout attempt.
/// Resolves the regional price, evaluates the coupon (waived on provider
/// outage), and registers the discounted charge with the provider.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/payment-intent",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 201, description = "Intent created", body = crate::ApiResponse<CreatePaymentIntentResponse>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider error", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentIntentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatePaymentIntentResponse>>), ServiceError> {
    request.validate()?;

    let country = country_from_headers(&headers);
    let price = state
        .services
        .pricing
        .resolve_price(request.product_id, country.as_deref())
        .await?;

    let evaluation = state
        .services
        .coupons
        .evaluate(request.coupon_code.as_deref(), price.amount_minor)
        .await?;

    let customer = CustomerDetails {
        email: request.email,
        first_name: request.first_name,
        last_name: request.last_name,
    };

    let intent = state
        .services
        .intents
        .create_intent(&price, &evaluation, &customer)
        .await?;

    let response = CreatePaymentIntentResponse {
        intent_id: intent.intent_id,
        client_secret: intent.client_secret,
        currency: intent.currency,
        amount_minor: intent.amount_minor,
        original_amount_minor: intent.original_amount_minor,
        discount_minor: intent.discount_minor,
        coupon_applied: evaluation.applied,
        coupon_code: intent.coupon_code,
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "payment_intent_id": "pi_3MtwBwLkdIwHu7ix28a3tqPa",
    "email": "new@example.com",
    "first_name": "Jordan",
    "last_name": "Example"
}))]
pub struct ConfirmPurchaseRequest {
    #[validate(length(min = 1, max = 255))]
    pub payment_intent_id: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "route": "/complete",
    "destination": "complete",
    "session_token": "bXk0cGVuZGluZzRwdXJjaGFzZTR0b2tlbg",
    "auth_token": null,
    "customer_id": null,
    "purchase_id": null
}))]
pub struct ConfirmPurchaseResponse {
    /// Path the browser should navigate to
    #[schema(example = "/complete")]
    pub route: String,
    pub destination: RouteDestination,
    /// Pending-purchase claim ticket (new customers only)
    pub session_token: Option<String>,
    /// Authenticated session token (existing customers only)
    pub auth_token: Option<String>,
    pub customer_id: Option<Uuid>,
    pub purchase_id: Option<Uuid>,
}

/// Confirm purchase completion after the browser finished the provider-side
/// payment step. Routes new customers to profile setup and existing
/// customers to the dashboard, recording the entitlement for the latter.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/confirm",
    request_body = ConfirmPurchaseRequest,
    responses(
        (status = 200, description = "Routed", body = crate::ApiResponse<ConfirmPurchaseResponse>),
        (status = 402, description = "Payment not confirmed", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider error", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn confirm_purchase(
    State(state): State<AppState>,
    Json(request): Json<ConfirmPurchaseRequest>,
) -> Result<Json<ApiResponse<ConfirmPurchaseResponse>>, ServiceError> {
    request.validate()?;

    let customer = CustomerDetails {
        email: request.email,
        first_name: request.first_name,
        last_name: request.last_name,
    };

    let outcome = state
        .services
        .router
        .confirm(&request.payment_intent_id, &customer)
        .await?;

    let response = ConfirmPurchaseResponse {
        route: outcome.destination.path().to_string(),
        destination: outcome.destination,
        session_token: outcome.session_token,
        auth_token: outcome.auth_token,
        customer_id: outcome.customer_id,
        purchase_id: outcome.purchase_id,
    };

    Ok(Json(ApiResponse::success(response)))
}

/// Checkout routes
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/payment-intent", post(create_payment_intent))
        .route("/confirm", post(confirm_purchase))
}
