use crate::entities::{product, product_price, ProductPrice};
use crate::errors::ServiceError;
use crate::handlers::common::country_from_headers;
use crate::ApiResponse;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;

/// Product with its per-currency price table
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub kind: product::ProductKind,
    pub billing_period: Option<String>,
    pub active: bool,
    pub prices: Vec<PriceEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PriceEntry {
    pub currency: crate::entities::product_price::Currency,
    /// Base amount in the currency's minor unit
    #[schema(example = 12000)]
    pub amount_minor: i64,
}

/// Region-resolved price for a product
#[derive(Debug, Serialize, ToSchema)]
pub struct RegionalPriceResponse {
    pub product_id: Uuid,
    pub product_name: String,
    pub currency: crate::entities::product_price::Currency,
    /// Base amount in the currency's minor unit
    #[schema(example = 12000)]
    pub amount_minor: i64,
    /// Human-readable rendering, e.g. "$120.00 AUD"
    #[schema(example = "$120.00 AUD")]
    pub display: String,
    /// True when the request's region was unknown or unsupported and the
    /// default currency was used
    pub fallback_applied: bool,
}

/// Get product by ID with its full price table
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product details", body = crate::ApiResponse<ProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = crate::entities::Product::find_by_id(product_id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    let prices = ProductPrice::find()
        .filter(product_price::Column::ProductId.eq(product_id))
        .all(&*state.db)
        .await?;

    let response = ProductResponse {
        id: product.id,
        name: product.name,
        slug: product.slug,
        kind: product.kind,
        billing_period: product.billing_period,
        active: product.active,
        prices: prices
            .into_iter()
            .map(|p| PriceEntry {
                currency: p.currency,
                amount_minor: p.amount_minor,
            })
            .collect(),
    };

    Ok(Json(ApiResponse::success(response)))
}

/// Get the price of a product for the caller's region
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/price",
    params(
        ("product_id" = Uuid, Path, description = "Product ID"),
        ("CF-IPCountry" = Option<String>, Header, description = "CDN-resolved origin country"),
        ("X-Country-Code" = Option<String>, Header, description = "Explicit country override")
    ),
    responses(
        (status = 200, description = "Regional price", body = crate::ApiResponse<RegionalPriceResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_regional_price(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<RegionalPriceResponse>>, ServiceError> {
    let country = country_from_headers(&headers);
    let resolved = state
        .services
        .pricing
        .resolve_price(product_id, country.as_deref())
        .await?;

    let response = RegionalPriceResponse {
        product_id: resolved.product.id,
        product_name: resolved.product.name.clone(),
        currency: resolved.currency,
        amount_minor: resolved.amount_minor,
        display: resolved.currency.format_minor(resolved.amount_minor),
        fallback_applied: resolved.fallback_applied,
    };

    Ok(Json(ApiResponse::success(response)))
}

/// Product routes
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/:product_id", get(get_product))
        .route("/:product_id/price", get(get_regional_price))
}
