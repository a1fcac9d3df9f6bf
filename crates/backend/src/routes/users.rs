//! User route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use taja_haat_core::{NewUser, User, UserId, UserUpdate};

use super::parse_phone_param;
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Query parameters for listing users.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub phone: Option<String>,
}

/// List users, optionally only the one with a given phone.
///
/// GET /users
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<User>>> {
    let repo = UserRepository::new(state.pool());

    let users = match parse_phone_param("phone", query.phone.as_deref())? {
        Some(phone) => repo.get_by_phone(&phone).await?.into_iter().collect(),
        None => repo.list().await?,
    };

    Ok(Json(users))
}

/// Get a user by id.
///
/// GET /users/{id}
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<Json<User>> {
    UserRepository::new(state.pool())
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

/// Create a user.
///
/// POST /users
#[instrument(skip(state, body), fields(phone = %body.phone, role = %body.role))]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_owned()));
    }
    if body.uid.trim().is_empty() {
        return Err(AppError::BadRequest("uid is required".to_owned()));
    }

    let user = UserRepository::new(state.pool()).create(&body).await?;
    tracing::info!(user_id = %user.id, "User created");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Update a user's profile fields.
///
/// PUT /users/{id}
#[instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>> {
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name cannot be empty".to_owned()));
    }

    let user = UserRepository::new(state.pool()).update(&id, &body).await?;

    Ok(Json(user))
}
