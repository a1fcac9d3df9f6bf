//! Order commands. What `list` shows depends on the signed-in role.

use taja_haat_client::orders::Placement;
use taja_haat_core::{Order, OrderAction, OrderId, OrderStatus, ProductId, Role, available_actions};

use super::context::{CliResult, Context};
use super::say;

fn print_order(order: &Order, actions: &[OrderAction]) {
    say(format!(
        "{}  {} x {}  {}  [{}]  buyer {} <{}>  seller {} <{}>  v{}",
        order.id,
        order.quantity,
        order.product_name,
        order.price,
        order.status,
        order.buyer_name,
        order.buyer_phone,
        order.seller_name,
        order.seller_phone,
        order.version
    ));
    if !actions.is_empty() {
        let names: Vec<&str> = actions.iter().map(OrderAction::as_str).collect();
        say(format!("    actions: {}", names.join(", ")));
    }
}

/// Show the signed-in user's dashboard orders.
///
/// # Errors
///
/// Returns an error if nobody is signed in or the backend cannot be
/// reached.
pub async fn list(ctx: &Context, status: Option<OrderStatus>) -> CliResult {
    let user = ctx.current_user()?;
    let actor = user.actor();
    let desk = ctx.order_desk();

    let orders = match user.role {
        Role::Buyer => desk.buyer_orders(&user.phone, status).await?,
        Role::Farmer => desk.seller_orders(&user.phone, status).await?,
        Role::Driver => desk.driver_queue().await?,
        Role::Admin => {
            let overview = desk.admin_overview().await?;
            say(format!("{} orders", overview.total));
            for entry in &overview.by_status {
                say(format!("  {:<16} {}", entry.status.as_str(), entry.count));
            }
            Vec::new()
        }
    };

    if orders.is_empty() && user.role != Role::Admin {
        say("No orders.");
    }
    for order in &orders {
        print_order(order, &available_actions(order, &actor));
    }

    let pending = desk.pending()?.len();
    if pending > 0 {
        say(format!("{pending} order(s) waiting to be sent; run `haat orders flush`."));
    }
    Ok(())
}

/// Place an order as the signed-in buyer.
///
/// # Errors
///
/// Returns an error unless a buyer is signed in and the order is accepted
/// or queued.
pub async fn place(
    ctx: &Context,
    product_id: ProductId,
    quantity: u32,
    address: Option<String>,
) -> CliResult {
    let buyer = ctx.current_user_as(Role::Buyer)?;

    match ctx
        .order_desk()
        .place_order(&buyer, &product_id, quantity, address)
        .await?
    {
        Placement::Placed(order) => {
            say("Order placed:");
            print_order(&order, &available_actions(&order, &buyer.actor()));
        }
        Placement::Queued(_) => {
            say("The marketplace is unreachable; the order was saved and will be sent by `haat orders flush`.");
        }
    }
    Ok(())
}

/// Apply a status action.
///
/// # Errors
///
/// Returns an error if the action is not allowed or the order changed in
/// the meantime.
pub async fn act(ctx: &Context, order_id: OrderId, action: OrderAction) -> CliResult {
    let user = ctx.current_user()?;
    let actor = user.actor();

    let order = ctx.order_desk().apply(&actor, &order_id, action).await?;

    say(format!("Order {} is now {}.", order.id, order.status));
    print_order(&order, &available_actions(&order, &actor));
    Ok(())
}

/// Resend orders queued while offline.
///
/// # Errors
///
/// Returns an error if the local queue cannot be read or written.
pub async fn flush(ctx: &Context) -> CliResult {
    let report = ctx.order_desk().flush_pending().await?;

    for order in &report.placed {
        say(format!("Placed {} ({} x {})", order.id, order.quantity, order.product_name));
    }
    for (pending, reason) in &report.dropped {
        say(format!("Dropped order for {}: {reason}", pending.draft.product_id));
    }
    if report.still_pending > 0 {
        say(format!("{} order(s) still waiting; the marketplace is unreachable.", report.still_pending));
    } else if report.placed.is_empty() && report.dropped.is_empty() {
        say("Nothing to send.");
    }
    Ok(())
}
