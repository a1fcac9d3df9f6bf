//! Order placement, status actions and the per-role order views.
//!
//! Status actions are checked against the shared transition table before
//! anything is sent, so a dashboard never offers a move the backend would
//! refuse. The backend re-checks every write and rejects stale versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use taja_haat_core::{
    Actor, NewOrder, Order, OrderAction, OrderId, OrderStatus, PhoneNumber, ProductId, Role,
    StatusUpdate, TransitionError, check_transition, filter_by_status,
};

use crate::api::{ApiClient, ApiError, OrderQuery};
use crate::integrations::sms::SmsNotifier;
use crate::session::{Scope, SessionStore, SessionUser, StoreError, keys};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Only buyers place orders.
    #[error("{0} accounts cannot place orders")]
    NotABuyer(Role),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The action is not available for this order and actor.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Someone else changed the order first.
    #[error("order was changed by someone else; reload and try again")]
    Stale { current_version: Option<i64> },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An order that could not be sent and waits for [`OrderDesk::flush_pending`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
    pub draft: NewOrder,
    pub queued_at: DateTime<Utc>,
}

/// Outcome of [`OrderDesk::place_order`].
#[derive(Debug, Clone)]
pub enum Placement {
    /// The backend accepted the order.
    Placed(Order),
    /// The backend was unreachable; the draft is stored locally.
    Queued(PendingOrder),
}

/// Outcome of [`OrderDesk::flush_pending`].
#[derive(Debug, Default)]
pub struct FlushReport {
    pub placed: Vec<Order>,
    /// Drafts the backend refused, with the reason. They are not retried.
    pub dropped: Vec<(PendingOrder, String)>,
    /// Drafts still waiting because the backend is unreachable.
    pub still_pending: usize,
}

/// Order count for one status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: usize,
}

/// Counts for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminOverview {
    pub total: usize,
    /// One entry per status, in pipeline order.
    pub by_status: Vec<StatusCount>,
}

impl AdminOverview {
    /// Count for a single status.
    #[must_use]
    pub fn count(&self, status: OrderStatus) -> usize {
        self.by_status
            .iter()
            .find(|c| c.status == status)
            .map_or(0, |c| c.count)
    }
}

/// Statuses a driver works on.
const DRIVER_STATUSES: [OrderStatus; 3] = [
    OrderStatus::Accepted,
    OrderStatus::DriverAssigned,
    OrderStatus::InTransit,
];

/// Places orders, applies status actions and builds dashboard views.
pub struct OrderDesk<S> {
    api: ApiClient,
    store: S,
    sms: Option<SmsNotifier>,
}

impl<S: SessionStore> OrderDesk<S> {
    #[must_use]
    pub const fn new(api: ApiClient, store: S, sms: Option<SmsNotifier>) -> Self {
        Self { api, store, sms }
    }

    /// Place an order for `quantity` units of a product.
    ///
    /// If the backend cannot be reached the draft is queued locally and
    /// `Placement::Queued` is returned. The seller is notified by SMS after
    /// a successful placement; a failed notification is only logged.
    ///
    /// # Errors
    ///
    /// - `NotABuyer` unless `buyer` has the buyer role
    /// - `InvalidQuantity` for zero
    /// - `Api` when the backend refuses the order
    #[instrument(skip(self, buyer), fields(buyer = %buyer.phone))]
    pub async fn place_order(
        &self,
        buyer: &SessionUser,
        product_id: &ProductId,
        quantity: u32,
        delivery_address: Option<String>,
    ) -> Result<Placement, OrderError> {
        if buyer.role != Role::Buyer {
            return Err(OrderError::NotABuyer(buyer.role));
        }
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity);
        }

        let draft = NewOrder {
            product_id: product_id.clone(),
            quantity,
            buyer_phone: buyer.phone.clone(),
            buyer_name: buyer.name.clone(),
            delivery_address,
        };

        match self.api.create_order(&draft).await {
            Ok(order) => {
                info!(order_id = %order.id, price = %order.price, "Order placed");
                self.notify_seller(&order).await;
                Ok(Placement::Placed(order))
            }
            Err(e) if e.is_transport() => {
                warn!(error = %e, "Backend unreachable, queueing order");
                let pending = PendingOrder {
                    draft,
                    queued_at: Utc::now(),
                };
                let mut queue = self.pending()?;
                queue.push(pending.clone());
                self.store.save(Scope::Local, keys::PENDING_ORDERS, &queue)?;
                Ok(Placement::Queued(pending))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drafts waiting to be sent.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the queue cannot be read.
    pub fn pending(&self) -> Result<Vec<PendingOrder>, OrderError> {
        Ok(self
            .store
            .load(Scope::Local, keys::PENDING_ORDERS)?
            .unwrap_or_default())
    }

    /// Resubmit queued drafts in the order they were queued.
    ///
    /// Stops at the first transport failure and keeps the rest queued.
    /// Drafts the backend refuses are dropped and reported.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the queue cannot be read or written.
    #[instrument(skip(self))]
    pub async fn flush_pending(&self) -> Result<FlushReport, OrderError> {
        let mut queue = self.pending()?.into_iter();
        let mut report = FlushReport::default();
        let mut remaining = Vec::new();

        for pending in queue.by_ref() {
            match self.api.create_order(&pending.draft).await {
                Ok(order) => {
                    self.notify_seller(&order).await;
                    report.placed.push(order);
                }
                Err(e) if e.is_transport() => {
                    remaining.push(pending);
                    break;
                }
                Err(e) => {
                    warn!(error = %e, product_id = %pending.draft.product_id, "Queued order refused");
                    report.dropped.push((pending, e.to_string()));
                }
            }
        }
        remaining.extend(queue);

        report.still_pending = remaining.len();
        if remaining.is_empty() {
            self.store.remove(Scope::Local, keys::PENDING_ORDERS)?;
        } else {
            self.store
                .save(Scope::Local, keys::PENDING_ORDERS, &remaining)?;
        }

        info!(
            placed = report.placed.len(),
            dropped = report.dropped.len(),
            still_pending = report.still_pending,
            "Flushed queued orders"
        );
        Ok(report)
    }

    /// Apply a dashboard action to an order.
    ///
    /// # Errors
    ///
    /// - `Transition` if the table does not allow it for this actor
    /// - `Stale` if the order changed between the read and the write
    /// - `Api` for other backend failures
    #[instrument(skip(self, actor), fields(role = %actor.role))]
    pub async fn apply(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        action: OrderAction,
    ) -> Result<Order, OrderError> {
        let order = self.api.get_order(order_id).await?;
        let status = check_transition(&order, action, actor)?;

        let update = StatusUpdate {
            status,
            version: order.version,
            actor: actor.clone(),
        };
        match self.api.update_order_status(order_id, &update).await {
            Ok(updated) => Ok(updated),
            Err(ApiError::Conflict {
                current_version, ..
            }) => Err(OrderError::Stale { current_version }),
            Err(e) => Err(e.into()),
        }
    }

    /// A buyer's orders, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `Api` if the orders cannot be fetched.
    pub async fn buyer_orders(
        &self,
        buyer: &PhoneNumber,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        let orders = self
            .api
            .list_orders(&OrderQuery {
                buyer: Some(buyer.clone()),
                ..OrderQuery::default()
            })
            .await?;
        Ok(narrow(orders, status))
    }

    /// Orders for a seller's listings, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `Api` if the orders cannot be fetched.
    pub async fn seller_orders(
        &self,
        seller: &PhoneNumber,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        let orders = self
            .api
            .list_orders(&OrderQuery {
                seller: Some(seller.clone()),
                ..OrderQuery::default()
            })
            .await?;
        Ok(narrow(orders, status))
    }

    /// Orders a driver can pick up or is carrying.
    ///
    /// # Errors
    ///
    /// Returns `Api` if the orders cannot be fetched.
    pub async fn driver_queue(&self) -> Result<Vec<Order>, OrderError> {
        let orders = self.api.list_orders(&OrderQuery::default()).await?;
        Ok(DRIVER_STATUSES
            .iter()
            .flat_map(|status| filter_by_status(&orders, *status))
            .collect())
    }

    /// Order counts per status.
    ///
    /// # Errors
    ///
    /// Returns `Api` if the orders cannot be fetched.
    pub async fn admin_overview(&self) -> Result<AdminOverview, OrderError> {
        let orders = self.api.list_orders(&OrderQuery::default()).await?;
        Ok(overview(&orders))
    }

    async fn notify_seller(&self, order: &Order) {
        if let Some(sms) = &self.sms {
            if let Err(e) = sms.notify_new_order(order).await {
                warn!(error = %e, order_id = %order.id, "Seller notification failed");
            }
        }
    }
}

fn narrow(orders: Vec<Order>, status: Option<OrderStatus>) -> Vec<Order> {
    match status {
        Some(status) => filter_by_status(&orders, status),
        None => orders,
    }
}

fn overview(orders: &[Order]) -> AdminOverview {
    AdminOverview {
        total: orders.len(),
        by_status: OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: orders.iter().filter(|o| o.status == status).count(),
            })
            .collect(),
    }
}
