//! Produce listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::phone::PhoneNumber;
use super::price::Taka;

/// A farmer's listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Selling unit, e.g. `kg` or `mon`.
    pub unit: String,
    pub price_per_unit: Taka,
    pub quantity_available: u32,
    #[serde(rename = "sellerNumber")]
    pub seller_phone: PhoneNumber,
    pub seller_name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for listing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub unit: String,
    pub price_per_unit: Taka,
    pub quantity_available: u32,
    #[serde(rename = "sellerNumber")]
    pub seller_phone: PhoneNumber,
    pub seller_name: String,
    #[serde(default)]
    pub image: Option<String>,
}
