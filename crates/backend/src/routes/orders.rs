//! Order route handlers.
//!
//! Status writes go through [`OrderTransitionService`]; there is no other
//! way to change an order's status.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use taja_haat_core::{NewOrder, Order, OrderId, OrderStatus, StatusUpdate};

use super::parse_phone_param;
use crate::db::orders::{OrderDraft, OrderFilter};
use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::services::OrderTransitionService;
use crate::state::AppState;

/// Query parameters for listing orders.
#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub buyer: Option<String>,
    pub seller: Option<String>,
    pub status: Option<String>,
}

/// List orders.
///
/// GET /orders
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filter = OrderFilter {
        buyer: parse_phone_param("buyer", query.buyer.as_deref())?,
        seller: parse_phone_param("seller", query.seller.as_deref())?,
        status,
    };

    let orders = OrderRepository::new(state.pool()).list(&filter).await?;

    Ok(Json(orders))
}

/// Get an order by id.
///
/// GET /orders/{id}
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<OrderId>) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Place an order.
///
/// The product and seller fields are copied from the listing and the price
/// is fixed at unit price times quantity.
///
/// POST /orders
#[instrument(skip(state, body), fields(product_id = %body.product_id, buyer = %body.buyer_phone))]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>)> {
    if body.quantity == 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_owned()));
    }

    let product = ProductRepository::new(state.pool())
        .get_by_id(&body.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", body.product_id)))?;

    if product.seller_phone == body.buyer_phone {
        return Err(AppError::Unprocessable(
            "sellers cannot order their own listing".to_owned(),
        ));
    }

    let draft = OrderDraft {
        product: &product,
        quantity: body.quantity,
        buyer_phone: body.buyer_phone,
        buyer_name: body.buyer_name,
        delivery_address: body.delivery_address,
    };

    let order = OrderRepository::new(state.pool())
        .create(&draft)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(msg) => AppError::Unprocessable(msg),
            other => AppError::Database(other),
        })?;
    tracing::info!(order_id = %order.id, price = %order.price, "Order placed");

    Ok((StatusCode::CREATED, Json(order)))
}

/// Write a new status for an order.
///
/// PUT /orders/{id}
#[instrument(skip(state, body))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let order = OrderTransitionService::new(state.pool())
        .apply(&id, &body)
        .await?;

    Ok(Json(order))
}
