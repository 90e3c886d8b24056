use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cradle Checkout API",
        version = "1.0.0",
        description = r#"
# Cradle Checkout API

Checkout pricing, discount and post-payment routing backend for the Cradle
parenting-content platform.

## Flow

1. The storefront fetches the product and its region-resolved price.
2. An optional coupon code is evaluated against the payment provider's
   registry; unknown or unreachable coupons simply mean full price.
3. A payment intent is registered for the discounted amount and the browser
   confirms the payment with the provider directly.
4. Confirming the purchase routes the customer: `/complete` for profile
   setup when no account exists yet, `/home` when it does.

## Error Handling

Errors use a consistent JSON format with appropriate HTTP status codes:

```json
{
  "error": "Bad Request",
  "message": "Validation error: email is invalid",
  "timestamp": "2026-08-06T00:00:00Z"
}
```
        "#,
        contact(
            name = "Cradle Engineering",
            email = "engineering@cradle.family"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://api.cradle.family", description = "Production server"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Product and regional pricing endpoints"),
        (name = "Coupons", description = "Coupon validation endpoints"),
        (name = "Checkout", description = "Payment intent and confirmation endpoints"),
        (name = "Customers", description = "Account lookup and profile completion endpoints")
    ),
    paths(
        // Products
        crate::handlers::products::get_product,
        crate::handlers::products::get_regional_price,

        // Coupons
        crate::handlers::coupons::validate_coupon,

        // Checkout
        crate::handlers::checkout::create_payment_intent,
        crate::handlers::checkout::confirm_purchase,

        // Customers
        crate::handlers::customers::email_exists,
        crate::handlers::customers::complete_profile,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,

            crate::handlers::products::ProductResponse,
            crate::handlers::products::PriceEntry,
            crate::handlers::products::RegionalPriceResponse,

            crate::handlers::coupons::ValidateCouponRequest,
            crate::handlers::coupons::ValidateCouponResponse,

            crate::handlers::checkout::CreatePaymentIntentRequest,
            crate::handlers::checkout::CreatePaymentIntentResponse,
            crate::handlers::checkout::ConfirmPurchaseRequest,
            crate::handlers::checkout::ConfirmPurchaseResponse,

            crate::handlers::customers::EmailExistsResponse,
            crate::handlers::customers::CompleteProfileRequest,
            crate::handlers::customers::CompleteProfileResponse,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
