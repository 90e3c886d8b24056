use crate::errors::ServiceError;
use crate::services::customers::CompleteProfileInput;
use crate::ApiResponse;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema, utoipa::IntoParams)]
pub struct EmailExistsQuery {
    /// Email to check
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmailExistsResponse {
    pub exists: bool,
}

/// Check whether an email belongs to an existing account
#[utoipa::path(
    get,
    path = "/api/v1/customers/exists",
    params(EmailExistsQuery),
    responses(
        (status = 200, description = "Lookup result", body = crate::ApiResponse<EmailExistsResponse>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse)
    ),
    tag = "Customers"
)]
pub async fn email_exists(
    State(state): State<AppState>,
    Query(query): Query<EmailExistsQuery>,
) -> Result<Json<ApiResponse<EmailExistsResponse>>, ServiceError> {
    query.validate()?;

    let exists = state.services.customers.email_exists(&query.email).await?;
    Ok(Json(ApiResponse::success(EmailExistsResponse { exists })))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "session_token": "bXk0cGVuZGluZzRwdXJjaGFzZTR0b2tlbg",
    "password": "correct-horse-battery",
    "accepts_marketing": true
}))]
pub struct CompleteProfileRequest {
    /// Claim ticket returned by the checkout confirmation
    #[validate(length(min = 1, max = 128))]
    pub session_token: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    pub accepts_marketing: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteProfileResponse {
    /// Path the browser should navigate to
    #[schema(example = "/home")]
    pub route: String,
    pub customer_id: Uuid,
    pub purchase_id: Uuid,
    /// Authenticated session token for the new account
    pub auth_token: String,
}

/// Submit the profile-completion form.
/// Creates the account and the purchase record atomically from the pending
/// purchase parked at checkout confirmation, then signs the customer in.
#[utoipa::path(
    post,
    path = "/api/v1/customers/complete-profile",
    request_body = CompleteProfileRequest,
    responses(
        (status = 201, description = "Profile completed", body = crate::ApiResponse<CompleteProfileResponse>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Pending purchase not found or expired", body = crate::errors::ErrorResponse)
    ),
    tag = "Customers"
)]
pub async fn complete_profile(
    State(state): State<AppState>,
    Json(request): Json<CompleteProfileRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CompleteProfileResponse>>), ServiceError> {
    request.validate()?;

    let completed = state
        .services
        .customers
        .complete_profile(CompleteProfileInput {
            session_token: request.session_token,
            password: request.password,
            accepts_marketing: request.accepts_marketing,
        })
        .await?;

    let response = CompleteProfileResponse {
        route: completed.destination.path().to_string(),
        customer_id: completed.customer_id,
        purchase_id: completed.purchase_id,
        auth_token: completed.auth_token,
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// Customer routes
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/exists", get(email_exists))
        .route("/complete-profile", post(complete_profile))
}
