//! Status and role enums for marketplace entities.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Error returned when a role or status string is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Marketplace role chosen at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Lists produce and fulfils orders.
    Farmer,
    /// Places orders and posts demands.
    Buyer,
    /// Back-office staff.
    Admin,
    /// Picks up and delivers orders.
    Driver,
}

impl Role {
    /// All roles, in registration-form order.
    pub const ALL: [Self; 4] = [Self::Farmer, Self::Buyer, Self::Admin, Self::Driver];

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Buyer => "buyer",
            Self::Admin => "admin",
            Self::Driver => "driver",
        }
    }

    /// Where a freshly authenticated user of this role lands.
    #[must_use]
    pub const fn dashboard_path(&self) -> &'static str {
        match self {
            Self::Farmer => "/farmer-dashboard",
            Self::Buyer => "/buyer-dashboard",
            Self::Admin => "/admin-dashboard",
            Self::Driver => "/driver-dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "farmer" => Ok(Self::Farmer),
            "buyer" => Ok(Self::Buyer),
            "admin" => Ok(Self::Admin),
            "driver" => Ok(Self::Driver),
            _ => Err(UnknownVariant::new("role", s)),
        }
    }
}

/// Status of an order as it moves from placement to payment release.
///
/// Serialized in `snake_case`. Parsing is lenient: the dashboards historically
/// wrote `shipped`, `in-transit`, `driver-assigned` and capitalized forms, and
/// all of those map onto the canonical variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed by a buyer, awaiting the seller.
    #[default]
    Pending,
    /// Seller agreed to fulfil.
    Accepted,
    /// Seller declined. Terminal.
    Rejected,
    /// A driver has taken the delivery.
    DriverAssigned,
    /// On the way to the buyer.
    InTransit,
    /// Handed over to the buyer.
    Delivered,
    /// Withdrawn by the buyer. Terminal.
    Cancelled,
    /// Payment released to the seller. Terminal.
    Completed,
}

impl OrderStatus {
    /// All statuses, in pipeline order.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Accepted,
        Self::Rejected,
        Self::DriverAssigned,
        Self::InTransit,
        Self::Delivered,
        Self::Cancelled,
        Self::Completed,
    ];

    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::DriverAssigned => "driver_assigned",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }

    /// Position along the fulfilment pipeline.
    ///
    /// Terminal side branches rank above everything so that every legal
    /// transition strictly increases the stage.
    #[must_use]
    pub const fn stage(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Accepted => 1,
            Self::DriverAssigned => 2,
            Self::InTransit => 3,
            Self::Delivered => 4,
            Self::Completed | Self::Rejected | Self::Cancelled => 5,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "driver_assigned" => Ok(Self::DriverAssigned),
            "in_transit" | "shipped" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            _ => Err(UnknownVariant::new("order status", s)),
        }
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether a buyer's demand post still accepts bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DemandStatus {
    #[default]
    Open,
    Closed,
}

/// Outcome of a farmer's bid on a demand post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[cfg(feature = "sqlite")]
crate::sqlite_text_type!(Role, |s: &str| s.parse::<Role>());

#[cfg(feature = "sqlite")]
crate::sqlite_text_type!(OrderStatus, |s: &str| s.parse::<OrderStatus>());

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("farmers".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_dashboards_are_distinct() {
        let mut paths: Vec<_> = Role::ALL.iter().map(Role::dashboard_path).collect();
        paths.dedup();
        assert_eq!(paths.len(), 4);
        assert_eq!(Role::Buyer.dashboard_path(), "/buyer-dashboard");
    }

    #[test]
    fn test_status_accepts_drifted_spellings() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::InTransit);
        assert_eq!("in-transit".parse::<OrderStatus>().unwrap(), OrderStatus::InTransit);
        assert_eq!(
            "driver-assigned".parse::<OrderStatus>().unwrap(),
            OrderStatus::DriverAssigned
        );
        assert_eq!("Pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_canonically() {
        let json = serde_json::to_string(&OrderStatus::DriverAssigned).unwrap();
        assert_eq!(json, "\"driver_assigned\"");
        let parsed: OrderStatus = serde_json::from_str("\"shipped\"").unwrap();
        assert_eq!(parsed, OrderStatus::InTransit);
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::is_terminal)
            .collect();
        assert_eq!(
            terminal,
            vec![
                OrderStatus::Rejected,
                OrderStatus::Cancelled,
                OrderStatus::Completed
            ]
        );
    }
}
