//! Order repository for database operations.
//!
//! Status writes are conditional on the stored `version`; callers go through
//! [`crate::services::orders::OrderTransitionService`] rather than calling
//! [`OrderRepository::update_status`] directly.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use taja_haat_core::{Order, OrderId, OrderStatus, PhoneNumber, Product, ProductId, Taka};

use super::RepositoryError;

const ORDER_COLUMNS: &str = "id, product_id, product_name, quantity, price, seller_phone, \
     seller_name, buyer_phone, buyer_name, delivery_address, status, version, order_date, \
     updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    product_id: ProductId,
    product_name: String,
    quantity: i64,
    price: String,
    seller_phone: PhoneNumber,
    seller_name: String,
    buyer_phone: PhoneNumber,
    buyer_name: String,
    delivery_address: Option<String>,
    status: OrderStatus,
    version: i64,
    order_date: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let price: Taka = r.price.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for order {}: {e}", r.id))
        })?;
        let quantity = u32::try_from(r.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("invalid quantity for order {}", r.id))
        })?;

        Ok(Self {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            quantity,
            price,
            seller_phone: r.seller_phone,
            seller_name: r.seller_name,
            buyer_phone: r.buyer_phone,
            buyer_name: r.buyer_name,
            delivery_address: r.delivery_address,
            status: r.status,
            version: r.version,
            order_date: r.order_date,
            updated_at: r.updated_at,
        })
    }
}

/// Optional filters for listing orders.
#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    pub buyer: Option<PhoneNumber>,
    pub seller: Option<PhoneNumber>,
    pub status: Option<OrderStatus>,
}

/// A validated order ready to insert.
#[derive(Debug, Clone)]
pub struct OrderDraft<'p> {
    pub product: &'p Product,
    pub quantity: u32,
    pub buyer_phone: PhoneNumber,
    pub buyer_name: String,
    pub delivery_address: Option<String>,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE (? IS NULL OR buyer_phone = ?)
              AND (? IS NULL OR seller_phone = ?)
              AND (? IS NULL OR status = ?)
            ORDER BY order_date DESC
            "
        ))
        .bind(&filter.buyer)
        .bind(&filter.buyer)
        .bind(&filter.seller)
        .bind(&filter.seller)
        .bind(filter.status)
        .bind(filter.status)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Get an order by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Place an order and reserve stock in one transaction.
    ///
    /// The price is fixed at placement: unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product no longer has enough
    /// stock. Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, draft: &OrderDraft<'_>) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let reserved = sqlx::query(
            r"
            UPDATE products
            SET quantity_available = quantity_available - ?
            WHERE id = ? AND quantity_available >= ?
            ",
        )
        .bind(i64::from(draft.quantity))
        .bind(&draft.product.id)
        .bind(i64::from(draft.quantity))
        .execute(&mut *tx)
        .await?;

        if reserved.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "only {} {} of {} left",
                draft.product.quantity_available, draft.product.unit, draft.product.name
            )));
        }

        let now = Utc::now();
        let price = draft.product.price_per_unit.times(draft.quantity);
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (id, product_id, product_name, quantity, price, seller_phone,
                                seller_name, buyer_phone, buyer_name, delivery_address,
                                status, version, order_date, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(OrderId::generate())
        .bind(&draft.product.id)
        .bind(&draft.product.name)
        .bind(i64::from(draft.quantity))
        .bind(price.amount().to_string())
        .bind(&draft.product.seller_phone)
        .bind(&draft.product.seller_name)
        .bind(&draft.buyer_phone)
        .bind(&draft.buyer_name)
        .bind(&draft.delivery_address)
        .bind(OrderStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }

    /// Write a new status if the stored version still equals `expected_version`.
    ///
    /// Returns `None` when the version has moved on (or the order vanished);
    /// the caller decides how to report it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_status(
        &self,
        id: &OrderId,
        expected_version: i64,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }
}
