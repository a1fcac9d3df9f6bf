//! The single writer of order status.
//!
//! Every status write is resolved to an [`OrderAction`], checked against the
//! transition table in `taja_haat_core`, and applied with a version guard.
//! Writers that raced and lost get [`OrderServiceError::Stale`] with the
//! version they should re-read at.
//!
//! The actor in a status write is taken as sent. Actor identity is
//! unauthenticated until requests carry a verified identity token.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::instrument;

use taja_haat_core::{
    Order, OrderAction, OrderId, StatusUpdate, TransitionError, check_transition,
};

use crate::db::{OrderRepository, RepositoryError};

/// Errors from order status writes.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// No order with this id.
    #[error("order not found")]
    NotFound,

    /// The writer's version is behind the stored one.
    #[error("order changed since version {expected}; current version is {current}")]
    Stale { expected: i64, current: i64 },

    /// The move is not in the transition table or the actor may not make it.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Validates and applies order status transitions.
pub struct OrderTransitionService<'a> {
    orders: OrderRepository<'a>,
}

impl<'a> OrderTransitionService<'a> {
    /// Create a new transition service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
        }
    }

    /// Apply a status write to an order.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order does not exist
    /// - `Stale` if `update.version` is not the stored version, or another
    ///   writer got in between the check and the write
    /// - `Transition` if the move is illegal or the actor may not make it
    #[instrument(
        skip(self, update),
        fields(order_id = %id, to = %update.status, role = %update.actor.role)
    )]
    pub async fn apply(
        &self,
        id: &OrderId,
        update: &StatusUpdate,
    ) -> Result<Order, OrderServiceError> {
        let order = self
            .orders
            .get_by_id(id)
            .await?
            .ok_or(OrderServiceError::NotFound)?;

        if order.version != update.version {
            return Err(OrderServiceError::Stale {
                expected: update.version,
                current: order.version,
            });
        }

        let action = OrderAction::between(order.status, update.status).ok_or(
            TransitionError::IllegalTransition {
                from: order.status,
                to: update.status,
            },
        )?;
        let target = check_transition(&order, action, &update.actor)?;

        match self.orders.update_status(id, order.version, target).await? {
            Some(updated) => {
                tracing::info!(
                    %action,
                    from = %order.status,
                    version = updated.version,
                    "Order status changed"
                );
                Ok(updated)
            }
            None => {
                let current = self
                    .orders
                    .get_by_id(id)
                    .await?
                    .ok_or(OrderServiceError::NotFound)?;
                Err(OrderServiceError::Stale {
                    expected: update.version,
                    current: current.version,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use taja_haat_core::{Actor, OrderStatus, PhoneNumber, Role};

    use super::*;
    use crate::db::orders::OrderDraft;
    use crate::db::products::tests::new_product;
    use crate::db::{ProductRepository, test_pool};

    async fn placed_order(pool: &SqlitePool) -> Order {
        let product = ProductRepository::new(pool)
            .create(&new_product("01711111111", "Grain"))
            .await
            .unwrap();
        OrderRepository::new(pool)
            .create(&OrderDraft {
                product: &product,
                quantity: 2,
                buyer_phone: PhoneNumber::parse("01822222222").unwrap(),
                buyer_name: "Rahima".to_owned(),
                delivery_address: None,
            })
            .await
            .unwrap()
    }

    fn seller() -> Actor {
        Actor::new(Role::Farmer, PhoneNumber::parse("01711111111").unwrap())
    }

    fn buyer() -> Actor {
        Actor::new(Role::Buyer, PhoneNumber::parse("01822222222").unwrap())
    }

    fn admin() -> Actor {
        Actor::new(Role::Admin, PhoneNumber::parse("01900000000").unwrap())
    }

    fn write(status: OrderStatus, version: i64, actor: Actor) -> StatusUpdate {
        StatusUpdate {
            status,
            version,
            actor,
        }
    }

    #[tokio::test]
    async fn test_full_pipeline_bumps_version() {
        let pool = test_pool().await;
        let order = placed_order(&pool).await;
        let service = OrderTransitionService::new(&pool);

        let steps = [
            (OrderStatus::Accepted, seller()),
            (OrderStatus::InTransit, seller()),
            (OrderStatus::Delivered, buyer()),
            (OrderStatus::Completed, admin()),
        ];
        let mut version = order.version;
        for (status, actor) in steps {
            let updated = service
                .apply(&order.id, &write(status, version, actor))
                .await
                .unwrap();
            assert_eq!(updated.status, status);
            assert_eq!(updated.version, version + 1);
            version = updated.version;
        }
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let pool = test_pool().await;
        let order = placed_order(&pool).await;
        let service = OrderTransitionService::new(&pool);

        service
            .apply(&order.id, &write(OrderStatus::Accepted, 1, seller()))
            .await
            .unwrap();
        let err = service
            .apply(&order.id, &write(OrderStatus::Cancelled, 1, buyer()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderServiceError::Stale {
                expected: 1,
                current: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_completed_cannot_return_to_pending() {
        let pool = test_pool().await;
        let order = placed_order(&pool).await;
        let service = OrderTransitionService::new(&pool);
        let mut version = order.version;
        for status in [
            OrderStatus::Accepted,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
            OrderStatus::Completed,
        ] {
            version = service
                .apply(&order.id, &write(status, version, admin()))
                .await
                .unwrap()
                .version;
        }

        let err = service
            .apply(&order.id, &write(OrderStatus::Pending, version, admin()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderServiceError::Transition(TransitionError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_stranger_cannot_accept() {
        let pool = test_pool().await;
        let order = placed_order(&pool).await;
        let stranger = Actor::new(Role::Farmer, PhoneNumber::parse("01744444444").unwrap());

        let err = OrderTransitionService::new(&pool)
            .apply(&order.id, &write(OrderStatus::Accepted, 1, stranger))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderServiceError::Transition(TransitionError::NotParticipant { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_order() {
        let pool = test_pool().await;
        let err = OrderTransitionService::new(&pool)
            .apply(
                &OrderId::new("missing"),
                &write(OrderStatus::Accepted, 1, admin()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OrderServiceError::NotFound));
    }
}
