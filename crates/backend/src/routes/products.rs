//! Product route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use taja_haat_core::{NewProduct, Product, ProductId};

use super::parse_phone_param;
use crate::db::products::ProductFilter;
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Query parameters for listing products.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub seller: Option<String>,
    pub category: Option<String>,
}

/// List products.
///
/// GET /products
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let filter = ProductFilter {
        seller: parse_phone_param("seller", query.seller.as_deref())?,
        category: query.category.filter(|c| !c.trim().is_empty()),
    };

    let products = ProductRepository::new(state.pool()).list(&filter).await?;

    Ok(Json(products))
}

/// Get a product by id.
///
/// GET /products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Create a listing.
///
/// POST /products
#[instrument(skip(state, body), fields(seller = %body.seller_phone, name = %body.name))]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    validate(&body)?;

    let product = ProductRepository::new(state.pool()).create(&body).await?;
    tracing::info!(product_id = %product.id, "Product listed");

    Ok((StatusCode::CREATED, Json(product)))
}

fn validate(body: &NewProduct) -> Result<()> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_owned()));
    }
    if body.category.trim().is_empty() {
        return Err(AppError::BadRequest("category is required".to_owned()));
    }
    if body.unit.trim().is_empty() {
        return Err(AppError::BadRequest("unit is required".to_owned()));
    }
    if !body.price_per_unit.is_positive() {
        return Err(AppError::BadRequest("price must be positive".to_owned()));
    }
    Ok(())
}
