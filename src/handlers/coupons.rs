use crate::errors::ServiceError;
use crate::services::coupons::CouponRejection;
use crate::ApiResponse;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "code": "SLEEP99",
    "amount_minor": 12000
}))]
pub struct ValidateCouponRequest {
    /// Coupon code as typed by the customer (case-sensitive)
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    /// Base amount to discount, in minor units
    #[validate(range(min = 0))]
    pub amount_minor: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "valid": true,
    "discount_minor": 11880,
    "final_minor": 120,
    "coupon_id": "SLEEP99",
    "coupon_name": "Launch special",
    "rejection": null
}))]
pub struct ValidateCouponResponse {
    /// Whether the coupon applied a discount
    pub valid: bool,
    /// Discount in minor units (0 when the coupon did not apply)
    pub discount_minor: i64,
    /// Amount to charge after the discount
    pub final_minor: i64,
    pub coupon_id: Option<String>,
    pub coupon_name: Option<String>,
    /// Why no discount applied, when it did not
    pub rejection: Option<CouponRejection>,
}

/// Validate a coupon code against an amount.
/// An unknown or inactive code is not an error; the response simply carries
/// no discount.
#[utoipa::path(
    post,
    path = "/api/v1/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Evaluation result", body = crate::ApiResponse<ValidateCouponResponse>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<ApiResponse<ValidateCouponResponse>>, ServiceError> {
    request.validate()?;

    let evaluation = state
        .services
        .coupons
        .evaluate(Some(&request.code), request.amount_minor)
        .await?;

    let coupon = evaluation.coupon.as_ref();
    let response = ValidateCouponResponse {
        valid: evaluation.applied,
        discount_minor: evaluation.discount_minor,
        final_minor: evaluation.final_minor,
        coupon_id: coupon.map(|c| c.id.clone()),
        coupon_name: coupon.and_then(|c| c.name.clone()),
        rejection: evaluation.rejection,
    };

    Ok(Json(ApiResponse::success(response)))
}

/// Coupon routes
pub fn coupon_routes() -> Router<AppState> {
    Router::new().route("/validate", post(validate_coupon))
}
