//! Community collection sync handlers.
//!
//! The same two handlers serve demand posts, bids and reviews; the record
//! type is fixed per route in [`super::routes`].

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use taja_haat_core::SyncRecord;

use crate::db::CollectionRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Query parameters for pulling a collection.
#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    /// Only records changed at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

/// Pull records of one collection.
///
/// GET /{demands|bids|reviews}
#[instrument(skip(state), fields(collection = %T::COLLECTION))]
pub async fn index<T: SyncRecord>(
    State(state): State<AppState>,
    Query(query): Query<SinceQuery>,
) -> Result<Json<Vec<T>>> {
    let records = CollectionRepository::new(state.pool())
        .list::<T>(query.since)
        .await?;

    Ok(Json(records))
}

/// Push one record. The stored winner is returned, which is an older
/// client's cue to replace its copy.
///
/// PUT /{demands|bids|reviews}/{id}
#[instrument(skip(state, record), fields(collection = %T::COLLECTION))]
pub async fn upsert<T: SyncRecord>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<T>,
) -> Result<Json<T>> {
    if record.id() != id {
        return Err(AppError::BadRequest(format!(
            "record id {} does not match path id {id}",
            record.id()
        )));
    }

    let stored = CollectionRepository::new(state.pool())
        .upsert(&record)
        .await?;

    if stored.updated_at() > record.updated_at() {
        tracing::debug!(%id, "Kept newer stored copy");
    }

    Ok(Json(stored))
}
