//! Product repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use taja_haat_core::{NewProduct, PhoneNumber, Product, ProductId, Taka};

use super::RepositoryError;

const PRODUCT_COLUMNS: &str = "id, name, category, description, unit, price_per_unit, \
     quantity_available, seller_phone, seller_name, image, created_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    category: String,
    description: String,
    unit: String,
    price_per_unit: String,
    quantity_available: i64,
    seller_phone: PhoneNumber,
    seller_name: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        let price_per_unit: Taka = r.price_per_unit.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for product {}: {e}", r.id))
        })?;
        let quantity_available = u32::try_from(r.quantity_available).map_err(|_| {
            RepositoryError::DataCorruption(format!("invalid quantity for product {}", r.id))
        })?;

        Ok(Self {
            id: r.id,
            name: r.name,
            category: r.category,
            description: r.description,
            unit: r.unit,
            price_per_unit,
            quantity_available,
            seller_phone: r.seller_phone,
            seller_name: r.seller_name,
            image: r.image,
            created_at: r.created_at,
        })
    }
}

/// Optional filters for listing products.
#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub seller: Option<PhoneNumber>,
    pub category: Option<String>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored price is invalid.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE (? IS NULL OR seller_phone = ?)
              AND (? IS NULL OR category = ? COLLATE NOCASE)
            ORDER BY created_at DESC
            "
        ))
        .bind(&filter.seller)
        .bind(&filter.seller)
        .bind(&filter.category)
        .bind(&filter.category)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored price is invalid.
    pub async fn get_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Create a new listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products (id, name, category, description, unit, price_per_unit,
                                  quantity_available, seller_phone, seller_name, image, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(ProductId::generate())
        .bind(new.name.trim())
        .bind(new.category.trim())
        .bind(&new.description)
        .bind(&new.unit)
        .bind(new.price_per_unit.amount().to_string())
        .bind(i64::from(new.quantity_available))
        .bind(&new.seller_phone)
        .bind(&new.seller_name)
        .bind(&new.image)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "product already exists"))?;

        row.try_into()
    }

    /// Delete listings that no order references. Returns the number of rows
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_unordered(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM products WHERE id NOT IN (SELECT DISTINCT product_id FROM orders)",
        )
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::test_pool;

    pub(crate) fn new_product(seller: &str, category: &str) -> NewProduct {
        NewProduct {
            name: "Aman rice".to_owned(),
            category: category.to_owned(),
            description: String::new(),
            unit: "kg".to_owned(),
            price_per_unit: Taka::new(Decimal::new(6050, 2)),
            quantity_available: 100,
            seller_phone: PhoneNumber::parse(seller).unwrap(),
            seller_name: "Karim".to_owned(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_price_survives_storage() {
        let pool = test_pool().await;
        let repo = ProductRepository::new(&pool);

        let created = repo.create(&new_product("01711111111", "Grain")).await.unwrap();
        let loaded = repo.get_by_id(&created.id).await.unwrap().unwrap();

        assert_eq!(loaded.price_per_unit, Taka::new(Decimal::new(6050, 2)));
        assert_eq!(loaded.quantity_available, 100);
    }

    #[tokio::test]
    async fn test_filters() {
        let pool = test_pool().await;
        let repo = ProductRepository::new(&pool);
        repo.create(&new_product("01711111111", "Grain")).await.unwrap();
        repo.create(&new_product("01711111111", "Vegetable")).await.unwrap();
        repo.create(&new_product("01733333333", "Grain")).await.unwrap();

        let all = repo.list(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let grain = repo
            .list(&ProductFilter {
                category: Some("grain".to_owned()),
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(grain.len(), 2);

        let karim_grain = repo
            .list(&ProductFilter {
                seller: Some(PhoneNumber::parse("01711111111").unwrap()),
                category: Some("Grain".to_owned()),
            })
            .await
            .unwrap();
        assert_eq!(karim_grain.len(), 1);
    }
}
