//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use taja_haat_core::{NewUser, PhoneNumber, Role, User, UserId, UserUpdate};

use super::RepositoryError;

const USER_COLUMNS: &str =
    "id, uid, name, phone, role, address, image, is_phone_verified, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    uid: String,
    name: String,
    phone: PhoneNumber,
    role: Role,
    address: String,
    image: Option<String>,
    is_phone_verified: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            uid: r.uid,
            name: r.name,
            phone: r.phone,
            role: r.role,
            address: r.address,
            image: r.image,
            is_phone_verified: r.is_phone_verified,
            created_at: r.created_at,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List all users, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Get a user by their phone number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = ?"
        ))
        .bind(phone)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the phone is already registered.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (id, uid, name, phone, role, address, image,
                               is_phone_verified, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(UserId::generate())
        .bind(&new.uid)
        .bind(new.name.trim())
        .bind(&new.phone)
        .bind(new.role)
        .bind(&new.address)
        .bind(&new.image)
        .bind(new.is_phone_verified)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "phone already registered"))?;

        Ok(row.into())
    }

    /// Apply a partial update to a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(&self, id: &UserId, update: &UserUpdate) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET name = COALESCE(?, name),
                address = COALESCE(?, address),
                image = COALESCE(?, image),
                is_phone_verified = COALESCE(?, is_phone_verified),
                updated_at = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(update.name.as_deref().map(str::trim))
        .bind(&update.address)
        .bind(&update.image)
        .bind(update.is_phone_verified)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::from).ok_or(RepositoryError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn new_user(phone: &str, role: Role) -> NewUser {
        NewUser {
            uid: format!("uid-{phone}"),
            name: "Karim".to_owned(),
            phone: PhoneNumber::parse(phone).unwrap(),
            role,
            address: "Bogura".to_owned(),
            image: None,
            is_phone_verified: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_phone() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        let created = repo.create(&new_user("01711111111", Role::Farmer)).await.unwrap();
        let found = repo
            .get_by_phone(&created.phone)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found, created);
        assert_eq!(found.role, Role::Farmer);
    }

    #[tokio::test]
    async fn test_duplicate_phone_conflicts() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        repo.create(&new_user("01711111111", Role::Farmer)).await.unwrap();
        let err = repo
            .create(&new_user("01711111111", Role::Buyer))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);
        let created = repo.create(&new_user("01822222222", Role::Buyer)).await.unwrap();

        let update = UserUpdate {
            address: Some("Rajshahi".to_owned()),
            ..UserUpdate::default()
        };
        let updated = repo.update(&created.id, &update).await.unwrap();

        assert_eq!(updated.address, "Rajshahi");
        assert_eq!(updated.name, "Karim");
        assert!(updated.is_phone_verified);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let pool = test_pool().await;
        let repo = UserRepository::new(&pool);

        let err = repo
            .update(&UserId::new("missing"), &UserUpdate::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound));
    }
}
