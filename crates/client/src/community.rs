//! Demand posts, bids and farmer reviews.
//!
//! Each collection is kept in the local store and written there first. A
//! write is then pushed to the backend; if the push fails the record is
//! marked dirty and goes out with the next [`CommunityBoard::sync`].
//! Conflicts resolve newest-wins on `updated_at`.

use std::collections::BTreeSet;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use taja_haat_core::{
    Bid, BidId, BidStatus, Collection, DemandId, DemandPost, DemandStatus, PhoneNumber,
    RatingOutOfRange, Review, ReviewId, Role, SyncRecord, Taka, average_rating, merge_newest,
};

use crate::api::{ApiClient, ApiError};
use crate::session::{Scope, SessionStore, SessionUser, StoreError, keys};

/// Errors from community operations.
#[derive(Debug, Error)]
pub enum CommunityError {
    #[error("{role} accounts cannot {action}")]
    RoleNotPermitted { role: Role, action: &'static str },

    #[error("no {collection} record with id {id}")]
    NotFound { collection: Collection, id: String },

    /// Only the buyer who posted a demand can close it or pick a bid.
    #[error("only the buyer who posted this demand can do that")]
    NotOwner,

    #[error("demand {0} is closed")]
    DemandClosed(DemandId),

    #[error("bid {0} has already been decided")]
    BidDecided(BidId),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("price must be greater than zero")]
    InvalidPrice,

    #[error(transparent)]
    Rating(#[from] RatingOutOfRange),

    #[error("you cannot review yourself")]
    SelfReview,

    /// `sync` was called without a backend.
    #[error("no backend configured")]
    Offline,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fields a buyer fills in to post a demand.
#[derive(Debug, Clone)]
pub struct DemandDraft {
    pub crop: String,
    pub quantity: u32,
    pub unit: String,
    pub target_price: Taka,
    pub location: String,
    pub note: String,
}

/// Fields a farmer fills in to bid.
#[derive(Debug, Clone)]
pub struct BidDraft {
    pub price_per_unit: Taka,
    pub quantity: u32,
    pub message: String,
}

/// Result of [`CommunityBoard::sync`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Local records added or replaced by newer remote copies.
    pub merged: usize,
    /// Dirty records pushed successfully.
    pub pushed: usize,
    /// Dirty records that are still waiting.
    pub still_dirty: usize,
}

impl SyncReport {
    fn add(&mut self, other: Self) {
        self.merged += other.merged;
        self.pushed += other.pushed;
        self.still_dirty += other.still_dirty;
    }
}

/// One collection as kept in the store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "T: SyncRecord")]
struct LocalCollection<T> {
    records: Vec<T>,
    /// Ids written locally but not yet accepted by the backend.
    #[serde(default)]
    dirty: BTreeSet<String>,
}

impl<T> Default for LocalCollection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            dirty: BTreeSet::new(),
        }
    }
}

impl<T: SyncRecord> LocalCollection<T> {
    fn upsert(&mut self, record: T) {
        match self.records.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }
}

const fn store_key(collection: Collection) -> &'static str {
    match collection {
        Collection::Demands => keys::DEMANDS,
        Collection::Bids => keys::BIDS,
        Collection::Reviews => keys::REVIEWS,
    }
}

/// Local-first community collections with optional backend sync.
pub struct CommunityBoard<S> {
    store: S,
    api: Option<ApiClient>,
}

impl<S: SessionStore> CommunityBoard<S> {
    /// Create a board. Without `api` every write stays local and dirty.
    #[must_use]
    pub const fn new(store: S, api: Option<ApiClient>) -> Self {
        Self { store, api }
    }

    // =========================================================================
    // Demands
    // =========================================================================

    /// Post a demand as `buyer`.
    ///
    /// # Errors
    ///
    /// Fails for non-buyers, a zero quantity or a non-positive price.
    #[instrument(skip(self, buyer, draft), fields(buyer = %buyer.phone, crop = %draft.crop))]
    pub async fn post_demand(
        &self,
        buyer: &SessionUser,
        draft: DemandDraft,
    ) -> Result<DemandPost, CommunityError> {
        require_role(buyer, Role::Buyer, "post demands")?;
        if draft.quantity == 0 {
            return Err(CommunityError::InvalidQuantity);
        }
        if !draft.target_price.is_positive() {
            return Err(CommunityError::InvalidPrice);
        }

        let now = Utc::now();
        let demand = DemandPost {
            id: DemandId::generate(),
            buyer_phone: buyer.phone.clone(),
            buyer_name: buyer.name.clone(),
            crop: draft.crop.trim().to_string(),
            quantity: draft.quantity,
            unit: draft.unit,
            target_price: draft.target_price,
            location: draft.location,
            note: draft.note,
            status: DemandStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.write(demand.clone()).await?;
        info!(demand_id = %demand.id, "Demand posted");
        Ok(demand)
    }

    /// Open demands, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the collection cannot be read.
    pub fn open_demands(&self) -> Result<Vec<DemandPost>, CommunityError> {
        let mut demands: Vec<DemandPost> = self
            .load::<DemandPost>()?
            .records
            .into_iter()
            .filter(DemandPost::is_open)
            .collect();
        demands.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(demands)
    }

    /// Demands posted by `buyer`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the collection cannot be read.
    pub fn my_demands(&self, buyer: &PhoneNumber) -> Result<Vec<DemandPost>, CommunityError> {
        let mut demands: Vec<DemandPost> = self
            .load::<DemandPost>()?
            .records
            .into_iter()
            .filter(|d| &d.buyer_phone == buyer)
            .collect();
        demands.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(demands)
    }

    /// Close a demand so it takes no more bids.
    ///
    /// # Errors
    ///
    /// Returns `NotOwner` unless `buyer` posted it or is an admin.
    #[instrument(skip(self, buyer), fields(buyer = %buyer.phone))]
    pub async fn close_demand(
        &self,
        buyer: &SessionUser,
        id: &DemandId,
    ) -> Result<DemandPost, CommunityError> {
        let mut demand = self.demand(id)?;
        if buyer.role != Role::Admin && demand.buyer_phone != buyer.phone {
            return Err(CommunityError::NotOwner);
        }
        if !demand.is_open() {
            return Ok(demand);
        }

        demand.status = DemandStatus::Closed;
        demand.updated_at = Utc::now();
        self.write(demand.clone()).await?;
        Ok(demand)
    }

    // =========================================================================
    // Bids
    // =========================================================================

    /// Bid on an open demand as `farmer`.
    ///
    /// # Errors
    ///
    /// Fails for non-farmers, unknown or closed demands, a zero quantity or
    /// a non-positive price.
    #[instrument(skip(self, farmer, draft), fields(farmer = %farmer.phone))]
    pub async fn place_bid(
        &self,
        farmer: &SessionUser,
        demand_id: &DemandId,
        draft: BidDraft,
    ) -> Result<Bid, CommunityError> {
        require_role(farmer, Role::Farmer, "bid on demands")?;
        if draft.quantity == 0 {
            return Err(CommunityError::InvalidQuantity);
        }
        if !draft.price_per_unit.is_positive() {
            return Err(CommunityError::InvalidPrice);
        }
        let demand = self.demand(demand_id)?;
        if !demand.is_open() {
            return Err(CommunityError::DemandClosed(demand.id));
        }

        let now = Utc::now();
        let bid = Bid {
            id: BidId::generate(),
            demand_id: demand.id,
            farmer_phone: farmer.phone.clone(),
            farmer_name: farmer.name.clone(),
            price_per_unit: draft.price_per_unit,
            quantity: draft.quantity,
            message: draft.message,
            status: BidStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.write(bid.clone()).await?;
        info!(bid_id = %bid.id, total = %bid.total(), "Bid placed");
        Ok(bid)
    }

    /// Bids on a demand, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the collection cannot be read.
    pub fn bids_for_demand(&self, demand_id: &DemandId) -> Result<Vec<Bid>, CommunityError> {
        let mut bids: Vec<Bid> = self
            .load::<Bid>()?
            .records
            .into_iter()
            .filter(|b| &b.demand_id == demand_id)
            .collect();
        bids.sort_by(|a, b| a.price_per_unit.cmp(&b.price_per_unit));
        Ok(bids)
    }

    /// Bids placed by `farmer`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the collection cannot be read.
    pub fn my_bids(&self, farmer: &PhoneNumber) -> Result<Vec<Bid>, CommunityError> {
        let mut bids: Vec<Bid> = self
            .load::<Bid>()?
            .records
            .into_iter()
            .filter(|b| &b.farmer_phone == farmer)
            .collect();
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bids)
    }

    /// Accept one bid: the other pending bids are rejected and the demand
    /// is closed.
    ///
    /// # Errors
    ///
    /// Fails unless `buyer` owns the open demand and the bid is pending.
    #[instrument(skip(self, buyer), fields(buyer = %buyer.phone))]
    pub async fn accept_bid(
        &self,
        buyer: &SessionUser,
        bid_id: &BidId,
    ) -> Result<Bid, CommunityError> {
        let bids = self.load::<Bid>()?;
        let bid = bids
            .records
            .iter()
            .find(|b| &b.id == bid_id)
            .cloned()
            .ok_or_else(|| not_found::<Bid>(bid_id.as_str()))?;

        let mut demand = self.demand(&bid.demand_id)?;
        if demand.buyer_phone != buyer.phone {
            return Err(CommunityError::NotOwner);
        }
        if !demand.is_open() {
            return Err(CommunityError::DemandClosed(demand.id));
        }
        if bid.status != BidStatus::Pending {
            return Err(CommunityError::BidDecided(bid.id));
        }

        let now = Utc::now();
        let mut accepted = None;
        for mut other in bids.records {
            if other.demand_id != demand.id || other.status != BidStatus::Pending {
                continue;
            }
            other.status = if other.id == bid.id {
                BidStatus::Accepted
            } else {
                BidStatus::Rejected
            };
            other.updated_at = now;
            if other.status == BidStatus::Accepted {
                accepted = Some(other.clone());
            }
            self.write(other).await?;
        }

        demand.status = DemandStatus::Closed;
        demand.updated_at = now;
        self.write(demand).await?;

        info!(bid_id = %bid.id, "Bid accepted");
        accepted.ok_or_else(|| not_found::<Bid>(bid_id.as_str()))
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Rate a farmer.
    ///
    /// # Errors
    ///
    /// Fails for ratings outside 1..=5 and for reviewing yourself.
    #[instrument(skip(self, reviewer, comment), fields(reviewer = %reviewer.phone))]
    pub async fn add_review(
        &self,
        reviewer: &SessionUser,
        farmer: &PhoneNumber,
        rating: u8,
        comment: String,
    ) -> Result<Review, CommunityError> {
        let rating = Review::validate_rating(rating)?;
        if &reviewer.phone == farmer {
            return Err(CommunityError::SelfReview);
        }

        let now = Utc::now();
        let review = Review {
            id: ReviewId::generate(),
            farmer_phone: farmer.clone(),
            reviewer_phone: reviewer.phone.clone(),
            reviewer_name: reviewer.name.clone(),
            rating,
            comment,
            created_at: now,
            updated_at: now,
        };
        self.write(review.clone()).await?;
        Ok(review)
    }

    /// Reviews of `farmer`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the collection cannot be read.
    pub fn reviews_for(&self, farmer: &PhoneNumber) -> Result<Vec<Review>, CommunityError> {
        let mut reviews: Vec<Review> = self
            .load::<Review>()?
            .records
            .into_iter()
            .filter(|r| &r.farmer_phone == farmer)
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    /// Mean rating of `farmer`, if anyone has rated them.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the collection cannot be read.
    pub fn rating_for(&self, farmer: &PhoneNumber) -> Result<Option<Decimal>, CommunityError> {
        Ok(average_rating(&self.reviews_for(farmer)?))
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Pull every collection, merge newest-wins and push dirty records.
    ///
    /// # Errors
    ///
    /// Returns `Offline` without a backend and `Api` if a pull fails. Push
    /// failures only leave records dirty.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<SyncReport, CommunityError> {
        let api = self.api.as_ref().ok_or(CommunityError::Offline)?;

        let mut report = SyncReport::default();
        report.add(self.sync_collection::<DemandPost>(api).await?);
        report.add(self.sync_collection::<Bid>(api).await?);
        report.add(self.sync_collection::<Review>(api).await?);

        info!(
            merged = report.merged,
            pushed = report.pushed,
            still_dirty = report.still_dirty,
            "Community sync finished"
        );
        Ok(report)
    }

    /// Records written locally that the backend has not accepted yet.
    ///
    /// # Errors
    ///
    /// Returns `Store` if a collection cannot be read.
    pub fn dirty_count(&self) -> Result<usize, CommunityError> {
        Ok(self.load::<DemandPost>()?.dirty.len()
            + self.load::<Bid>()?.dirty.len()
            + self.load::<Review>()?.dirty.len())
    }

    async fn sync_collection<T: SyncRecord>(
        &self,
        api: &ApiClient,
    ) -> Result<SyncReport, CommunityError> {
        let remote = api.pull::<T>(None).await?;
        let mut local = self.load::<T>()?;
        let merged = merge_newest(&mut local.records, remote);

        let mut pushed = 0;
        for id in local.dirty.clone() {
            let Some(record) = local.records.iter().find(|r| r.id() == id).cloned() else {
                local.dirty.remove(&id);
                continue;
            };
            match api.push(&record).await {
                Ok(kept) => {
                    local.upsert(kept);
                    local.dirty.remove(&id);
                    pushed += 1;
                }
                Err(e) => warn!(error = %e, collection = %T::COLLECTION, id = %id, "Push failed"),
            }
        }

        let still_dirty = local.dirty.len();
        self.save(&local)?;
        debug!(collection = %T::COLLECTION, merged, pushed, still_dirty, "Collection synced");
        Ok(SyncReport {
            merged,
            pushed,
            still_dirty,
        })
    }

    // =========================================================================
    // Storage
    // =========================================================================

    fn load<T: SyncRecord>(&self) -> Result<LocalCollection<T>, CommunityError> {
        Ok(self
            .store
            .load(Scope::Local, store_key(T::COLLECTION))?
            .unwrap_or_default())
    }

    fn save<T: SyncRecord>(&self, collection: &LocalCollection<T>) -> Result<(), CommunityError> {
        self.store
            .save(Scope::Local, store_key(T::COLLECTION), collection)?;
        Ok(())
    }

    fn demand(&self, id: &DemandId) -> Result<DemandPost, CommunityError> {
        self.load::<DemandPost>()?
            .records
            .into_iter()
            .find(|d| &d.id == id)
            .ok_or_else(|| not_found::<DemandPost>(id.as_str()))
    }

    /// Store locally as dirty, then try to push.
    async fn write<T: SyncRecord>(&self, record: T) -> Result<(), CommunityError> {
        let id = record.id().to_string();
        let mut local = self.load::<T>()?;
        local.upsert(record.clone());
        local.dirty.insert(id.clone());
        self.save(&local)?;

        let Some(api) = &self.api else {
            return Ok(());
        };
        match api.push(&record).await {
            Ok(kept) => {
                let mut local = self.load::<T>()?;
                local.upsert(kept);
                local.dirty.remove(&id);
                self.save(&local)?;
            }
            Err(e) => {
                warn!(error = %e, collection = %T::COLLECTION, id = %id, "Push failed, will retry on sync");
            }
        }
        Ok(())
    }
}

fn require_role(
    user: &SessionUser,
    role: Role,
    action: &'static str,
) -> Result<(), CommunityError> {
    if user.role == role {
        Ok(())
    } else {
        Err(CommunityError::RoleNotPermitted {
            role: user.role,
            action,
        })
    }
}

fn not_found<T: SyncRecord>(id: &str) -> CommunityError {
    CommunityError::NotFound {
        collection: T::COLLECTION,
        id: id.to_string(),
    }
}
