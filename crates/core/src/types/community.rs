//! Community records: demand posts, bids and farmer reviews.
//!
//! These are written locally first and synchronized with the backend's
//! collection endpoints. Conflicts resolve newest-wins on `updated_at`.

use core::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::id::{BidId, DemandId, ReviewId};
use super::phone::PhoneNumber;
use super::price::Taka;
use super::status::{BidStatus, DemandStatus, UnknownVariant};

/// The three synchronized collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Demands,
    Bids,
    Reviews,
}

impl Collection {
    pub const ALL: [Self; 3] = [Self::Demands, Self::Bids, Self::Reviews];

    /// Path segment and storage name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Demands => "demands",
            Self::Bids => "bids",
            Self::Reviews => "reviews",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "collection",
                value: s.to_owned(),
            })
    }
}

/// A record that lives in one of the synchronized collections.
pub trait SyncRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection the record belongs to.
    const COLLECTION: Collection;

    /// Stable record id.
    fn id(&self) -> &str;

    /// Last modification time; the newer copy wins a merge.
    fn updated_at(&self) -> DateTime<Utc>;

    /// Collection the record belongs to.
    fn collection(&self) -> Collection {
        Self::COLLECTION
    }
}

/// A buyer's request for a crop, open to farmer bids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandPost {
    pub id: DemandId,
    #[serde(rename = "buyerNumber")]
    pub buyer_phone: PhoneNumber,
    #[serde(alias = "buyername")]
    pub buyer_name: String,
    pub crop: String,
    pub quantity: u32,
    pub unit: String,
    /// Price per unit the buyer hopes to pay.
    pub target_price: Taka,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub status: DemandStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DemandPost {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == DemandStatus::Open
    }
}

impl SyncRecord for DemandPost {
    const COLLECTION: Collection = Collection::Demands;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A farmer's offer against a demand post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: BidId,
    pub demand_id: DemandId,
    #[serde(rename = "farmerNumber")]
    pub farmer_phone: PhoneNumber,
    pub farmer_name: String,
    pub price_per_unit: Taka,
    pub quantity: u32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    /// Offered total for the bid quantity.
    #[must_use]
    pub fn total(&self) -> Taka {
        self.price_per_unit.times(self.quantity)
    }
}

impl SyncRecord for Bid {
    const COLLECTION: Collection = Collection::Bids;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Error returned for a rating outside 1..=5.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct RatingOutOfRange(pub u8);

/// A buyer's rating of a farmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    #[serde(rename = "farmerNumber")]
    pub farmer_phone: PhoneNumber,
    #[serde(rename = "reviewerNumber")]
    pub reviewer_phone: PhoneNumber,
    pub reviewer_name: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub const MIN_RATING: u8 = 1;
    pub const MAX_RATING: u8 = 5;

    /// Check a rating before building a review.
    ///
    /// # Errors
    ///
    /// Returns [`RatingOutOfRange`] unless `rating` is in 1..=5.
    pub const fn validate_rating(rating: u8) -> Result<u8, RatingOutOfRange> {
        if rating >= Self::MIN_RATING && rating <= Self::MAX_RATING {
            Ok(rating)
        } else {
            Err(RatingOutOfRange(rating))
        }
    }
}

impl SyncRecord for Review {
    const COLLECTION: Collection = Collection::Reviews;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Mean rating rounded to one decimal place, or `None` with no reviews.
#[must_use]
pub fn average_rating(reviews: &[Review]) -> Option<Decimal> {
    if reviews.is_empty() {
        return None;
    }
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    let count = Decimal::from(reviews.len());
    Some((Decimal::from(sum) / count).round_dp(1))
}

/// Merge `incoming` into `local`, keeping the newer copy of each record.
///
/// Ties keep the local copy. Returns the number of records that changed.
pub fn merge_newest<T: SyncRecord>(local: &mut Vec<T>, incoming: Vec<T>) -> usize {
    let mut changed = 0;
    for record in incoming {
        match local.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) if record.updated_at() > existing.updated_at() => {
                *existing = record;
                changed += 1;
            }
            Some(_) => {}
            None => {
                local.push(record);
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn review(id: &str, rating: u8, updated_at: DateTime<Utc>) -> Review {
        Review {
            id: ReviewId::new(id),
            farmer_phone: PhoneNumber::parse("01711111111").unwrap(),
            reviewer_phone: PhoneNumber::parse("01822222222").unwrap(),
            reviewer_name: "Rahima".to_owned(),
            rating,
            comment: String::new(),
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn test_average_rating() {
        let now = Utc::now();
        assert_eq!(average_rating(&[]), None);
        let reviews = [review("a", 5, now), review("b", 4, now), review("c", 4, now)];
        assert_eq!(average_rating(&reviews), Some(Decimal::new(43, 1)));
    }

    #[test]
    fn test_validate_rating() {
        assert!(Review::validate_rating(0).is_err());
        assert_eq!(Review::validate_rating(5), Ok(5));
        assert_eq!(Review::validate_rating(6), Err(RatingOutOfRange(6)));
    }

    #[test]
    fn test_merge_keeps_newest() {
        let old = Utc::now() - Duration::minutes(5);
        let new = Utc::now();
        let mut local = vec![review("a", 3, old), review("b", 2, new)];
        let incoming = vec![review("a", 5, new), review("b", 1, old), review("c", 4, old)];

        let changed = merge_newest(&mut local, incoming);

        assert_eq!(changed, 2);
        assert_eq!(local.len(), 3);
        assert_eq!(local[0].rating, 5);
        assert_eq!(local[1].rating, 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let now = Utc::now();
        let mut local = vec![review("a", 3, now)];
        let incoming = local.clone();
        assert_eq!(merge_newest(&mut local, incoming), 0);
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(DemandPost::COLLECTION.as_str(), "demands");
        assert_eq!("bids".parse::<Collection>().unwrap(), Collection::Bids);
        assert!("orders".parse::<Collection>().is_err());
    }

    #[test]
    fn test_demand_wire_names() {
        let json = serde_json::json!({
            "id": "d-1",
            "buyerNumber": "01822222222",
            "buyername": "Rahima",
            "crop": "Potato",
            "quantity": 500,
            "unit": "kg",
            "targetPrice": "22.50",
            "createdAt": "2025-01-10T08:00:00Z",
            "updatedAt": "2025-01-10T08:00:00Z"
        });
        let demand: DemandPost = serde_json::from_value(json).unwrap();
        assert_eq!(demand.buyer_name, "Rahima");
        assert!(demand.is_open());
        assert_eq!(demand.target_price, Taka::new(Decimal::new(2250, 2)));
    }
}
