//! Marketplace user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::phone::PhoneNumber;
use super::status::Role;

/// A user as stored by the backend.
///
/// `uid` is the identity provider's account id; `phone` is the marketplace
/// key and is unique across users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub uid: String,
    pub name: String,
    pub phone: PhoneNumber,
    pub role: Role,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub is_phone_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub uid: String,
    pub name: String,
    pub phone: PhoneNumber,
    pub role: Role,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub is_phone_verified: bool,
}

/// Partial update for a user; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_phone_verified: Option<bool>,
}

impl UserUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.image.is_none()
            && self.is_phone_verified.is_none()
    }
}
