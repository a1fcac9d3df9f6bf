//! Orders and the order lifecycle.
//!
//! Every status change goes through an [`OrderAction`]. The table below is the
//! single source of truth for which role may move an order from where to
//! where; the backend enforces it and clients use it to decide which actions
//! to offer.
//!
//! | Action           | From                | To                | Actors                         |
//! |------------------|---------------------|-------------------|--------------------------------|
//! | `Cancel`         | pending, accepted   | cancelled         | buyer (own order)              |
//! | `Accept`         | pending             | accepted          | farmer (own listing), admin    |
//! | `Reject`         | pending             | rejected          | farmer (own listing), admin    |
//! | `Ship`           | accepted            | `in_transit`      | farmer (own listing), admin    |
//! | `AssignDriver`   | accepted            | `driver_assigned` | driver, admin                  |
//! | `StartTransit`   | `driver_assigned`   | `in_transit`      | driver, admin                  |
//! | `MarkDelivered`  | `in_transit`        | delivered         | driver, admin, buyer (own)     |
//! | `ReleasePayment` | delivered           | completed         | farmer (own listing), admin    |
//!
//! No action targets `pending`, and every action strictly increases
//! [`OrderStatus::stage`], so an order can never move backwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{OrderId, ProductId};
use super::phone::PhoneNumber;
use super::price::Taka;
use super::status::{OrderStatus, Role, UnknownVariant};

/// An order as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    /// Total price (unit price times quantity) at placement time.
    pub price: Taka,
    #[serde(rename = "sellerNumber")]
    pub seller_phone: PhoneNumber,
    pub seller_name: String,
    #[serde(rename = "buyerNumber")]
    pub buyer_phone: PhoneNumber,
    #[serde(alias = "buyername", default)]
    pub buyer_name: String,
    #[serde(default)]
    pub delivery_address: Option<String>,
    pub status: OrderStatus,
    /// Optimistic concurrency token, bumped on every accepted write.
    pub version: i64,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `phone` belongs to either side of this order.
    #[must_use]
    pub fn involves(&self, phone: &PhoneNumber) -> bool {
        &self.buyer_phone == phone || &self.seller_phone == phone
    }
}

/// Request body for placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(rename = "buyerNumber")]
    pub buyer_phone: PhoneNumber,
    #[serde(alias = "buyername")]
    pub buyer_name: String,
    #[serde(default)]
    pub delivery_address: Option<String>,
}

/// Who is asking for a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    pub phone: PhoneNumber,
}

impl Actor {
    /// Create a new actor.
    #[must_use]
    pub const fn new(role: Role, phone: PhoneNumber) -> Self {
        Self { role, phone }
    }
}

/// Request body for a status write.
///
/// `version` must equal the version the writer last saw; stale writes are
/// rejected instead of silently overwriting a concurrent change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub version: i64,
    pub actor: Actor,
}

/// A mutation a dashboard can apply to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Cancel,
    Accept,
    Reject,
    Ship,
    AssignDriver,
    StartTransit,
    MarkDelivered,
    ReleasePayment,
}

/// Which party on the order a role must be to use an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Buyer,
    Seller,
    Anyone,
}

impl OrderAction {
    /// All actions, in pipeline order.
    pub const ALL: [Self; 8] = [
        Self::Cancel,
        Self::Accept,
        Self::Reject,
        Self::Ship,
        Self::AssignDriver,
        Self::StartTransit,
        Self::MarkDelivered,
        Self::ReleasePayment,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Ship => "ship",
            Self::AssignDriver => "assign_driver",
            Self::StartTransit => "start_transit",
            Self::MarkDelivered => "mark_delivered",
            Self::ReleasePayment => "release_payment",
        }
    }

    /// Status the order ends up in.
    #[must_use]
    pub const fn target(&self) -> OrderStatus {
        match self {
            Self::Cancel => OrderStatus::Cancelled,
            Self::Accept => OrderStatus::Accepted,
            Self::Reject => OrderStatus::Rejected,
            Self::Ship | Self::StartTransit => OrderStatus::InTransit,
            Self::AssignDriver => OrderStatus::DriverAssigned,
            Self::MarkDelivered => OrderStatus::Delivered,
            Self::ReleasePayment => OrderStatus::Completed,
        }
    }

    /// Statuses the action may start from.
    #[must_use]
    pub const fn sources(&self) -> &'static [OrderStatus] {
        match self {
            Self::Cancel => &[OrderStatus::Pending, OrderStatus::Accepted],
            Self::Accept | Self::Reject => &[OrderStatus::Pending],
            Self::Ship | Self::AssignDriver => &[OrderStatus::Accepted],
            Self::StartTransit => &[OrderStatus::DriverAssigned],
            Self::MarkDelivered => &[OrderStatus::InTransit],
            Self::ReleasePayment => &[OrderStatus::Delivered],
        }
    }

    /// Roles allowed to perform the action.
    #[must_use]
    pub const fn actors(&self) -> &'static [Role] {
        match self {
            Self::Cancel => &[Role::Buyer],
            Self::Accept | Self::Reject | Self::Ship | Self::ReleasePayment => {
                &[Role::Farmer, Role::Admin]
            }
            Self::AssignDriver | Self::StartTransit => &[Role::Driver, Role::Admin],
            Self::MarkDelivered => &[Role::Driver, Role::Admin, Role::Buyer],
        }
    }

    /// Whether `role` may apply this action to an order in `status`,
    /// ignoring ownership.
    #[must_use]
    pub fn permits(&self, status: OrderStatus, role: Role) -> bool {
        self.sources().contains(&status) && self.actors().contains(&role)
    }

    /// Resolve a raw status write to the action that performs it.
    ///
    /// `Ship` and `StartTransit` both target `in_transit`; the source status
    /// tells them apart.
    #[must_use]
    pub fn between(from: OrderStatus, to: OrderStatus) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.target() == to && action.sources().contains(&from))
    }
}

/// Party on the order a role must be to act on it.
const fn party_for(role: Role) -> Party {
    match role {
        Role::Admin | Role::Driver => Party::Anyone,
        Role::Buyer => Party::Buyer,
        Role::Farmer => Party::Seller,
    }
}

impl core::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| UnknownVariant {
                kind: "order action",
                value: s.to_owned(),
            })
    }
}

/// Reasons a transition is refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The order is not in a status the action starts from.
    #[error("cannot move order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    /// The role may never perform this action.
    #[error("{role} may not {action} an order")]
    RoleNotPermitted { role: Role, action: OrderAction },
    /// The actor is not the buyer or seller this action requires.
    #[error("only the order's own {party} may {action} it")]
    NotParticipant {
        party: &'static str,
        action: OrderAction,
    },
}

/// Validate `action` on `order` by `actor` and return the resulting status.
///
/// # Errors
///
/// Returns [`TransitionError`] if the role cannot perform the action, the
/// actor is not the required party, or the order's status is not a source of
/// the action.
pub fn check_transition(
    order: &Order,
    action: OrderAction,
    actor: &Actor,
) -> Result<OrderStatus, TransitionError> {
    if !action.actors().contains(&actor.role) {
        return Err(TransitionError::RoleNotPermitted {
            role: actor.role,
            action,
        });
    }

    match party_for(actor.role) {
        Party::Buyer if order.buyer_phone != actor.phone => {
            return Err(TransitionError::NotParticipant {
                party: "buyer",
                action,
            });
        }
        Party::Seller if order.seller_phone != actor.phone => {
            return Err(TransitionError::NotParticipant {
                party: "seller",
                action,
            });
        }
        _ => {}
    }

    if !action.sources().contains(&order.status) {
        return Err(TransitionError::IllegalTransition {
            from: order.status,
            to: action.target(),
        });
    }

    Ok(action.target())
}

/// Actions `actor` could apply to `order` right now.
#[must_use]
pub fn available_actions(order: &Order, actor: &Actor) -> Vec<OrderAction> {
    OrderAction::ALL
        .into_iter()
        .filter(|action| check_transition(order, *action, actor).is_ok())
        .collect()
}

/// Orders with the given status, in their original order.
#[must_use]
pub fn filter_by_status(orders: &[Order], status: OrderStatus) -> Vec<Order> {
    orders
        .iter()
        .filter(|order| order.status == status)
        .cloned()
        .collect()
}
