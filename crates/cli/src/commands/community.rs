//! Demand, bid, review and sync commands.

use taja_haat_client::community::{BidDraft, DemandDraft};
use taja_haat_core::{Bid, BidId, DemandId, DemandPost, PhoneNumber, Review, Role};

use super::context::{CliResult, Context};
use super::say;

fn print_demand(demand: &DemandPost) {
    say(format!(
        "{}  {} {} {} at {} per {}  [{}]  {} <{}>{}",
        demand.id,
        demand.quantity,
        demand.unit,
        demand.crop,
        demand.target_price,
        demand.unit,
        if demand.is_open() { "open" } else { "closed" },
        demand.buyer_name,
        demand.buyer_phone,
        if demand.location.is_empty() {
            String::new()
        } else {
            format!("  in {}", demand.location)
        }
    ));
}

fn print_bid(bid: &Bid) {
    say(format!(
        "{}  {} at {} each = {}  [{:?}]  {} <{}>  on {}",
        bid.id,
        bid.quantity,
        bid.price_per_unit,
        bid.total(),
        bid.status,
        bid.farmer_name,
        bid.farmer_phone,
        bid.demand_id
    ));
}

fn print_review(review: &Review) {
    say(format!(
        "{}/5  {}  {}",
        review.rating, review.reviewer_name, review.comment
    ));
}

/// Post a demand as the signed-in buyer.
///
/// # Errors
///
/// Returns an error unless a buyer is signed in and the draft is valid.
pub async fn post_demand(ctx: &Context, draft: DemandDraft) -> CliResult {
    let buyer = ctx.current_user_as(Role::Buyer)?;
    let demand = ctx.community().post_demand(&buyer, draft).await?;
    print_demand(&demand);
    Ok(())
}

/// List open demands, or the signed-in buyer's own.
///
/// # Errors
///
/// Returns an error if the local store cannot be read.
pub fn list_demands(ctx: &Context, mine: bool) -> CliResult {
    let board = ctx.community();
    let demands = if mine {
        board.my_demands(&ctx.current_user()?.phone)?
    } else {
        board.open_demands()?
    };

    if demands.is_empty() {
        say("No demands. Run `haat sync` to fetch the latest.");
    }
    for demand in &demands {
        print_demand(demand);
    }
    Ok(())
}

/// Close one of the signed-in buyer's demands.
///
/// # Errors
///
/// Returns an error unless the demand exists and belongs to the user.
pub async fn close_demand(ctx: &Context, id: DemandId) -> CliResult {
    let user = ctx.current_user()?;
    let demand = ctx.community().close_demand(&user, &id).await?;
    print_demand(&demand);
    Ok(())
}

/// Bid on a demand as the signed-in farmer.
///
/// # Errors
///
/// Returns an error unless a farmer is signed in and the demand is open.
pub async fn place_bid(ctx: &Context, demand_id: DemandId, draft: BidDraft) -> CliResult {
    let farmer = ctx.current_user_as(Role::Farmer)?;
    let bid = ctx.community().place_bid(&farmer, &demand_id, draft).await?;
    print_bid(&bid);
    Ok(())
}

/// List bids on a demand, or the signed-in farmer's own.
///
/// # Errors
///
/// Returns an error if the local store cannot be read.
pub fn list_bids(ctx: &Context, demand_id: Option<DemandId>) -> CliResult {
    let board = ctx.community();
    let bids = match demand_id {
        Some(id) => board.bids_for_demand(&id)?,
        None => board.my_bids(&ctx.current_user()?.phone)?,
    };

    if bids.is_empty() {
        say("No bids.");
    }
    for bid in &bids {
        print_bid(bid);
    }
    Ok(())
}

/// Accept a bid on one of the signed-in buyer's demands.
///
/// # Errors
///
/// Returns an error unless the buyer owns the open demand.
pub async fn accept_bid(ctx: &Context, id: BidId) -> CliResult {
    let buyer = ctx.current_user_as(Role::Buyer)?;
    let bid = ctx.community().accept_bid(&buyer, &id).await?;
    say("Accepted; the other bids were declined and the demand is closed.");
    print_bid(&bid);
    Ok(())
}

/// Rate a farmer.
///
/// # Errors
///
/// Returns an error for ratings outside 1..=5.
pub async fn add_review(
    ctx: &Context,
    farmer: PhoneNumber,
    rating: u8,
    comment: String,
) -> CliResult {
    let reviewer = ctx.current_user()?;
    let review = ctx
        .community()
        .add_review(&reviewer, &farmer, rating, comment)
        .await?;
    print_review(&review);
    Ok(())
}

/// Show a farmer's reviews and average rating.
///
/// # Errors
///
/// Returns an error if the local store cannot be read.
pub fn list_reviews(ctx: &Context, farmer: &PhoneNumber) -> CliResult {
    let board = ctx.community();
    match board.rating_for(farmer)? {
        Some(average) => say(format!("Average rating for {farmer}: {average}/5")),
        None => say(format!("No reviews for {farmer} yet.")),
    }
    for review in &board.reviews_for(farmer)? {
        print_review(review);
    }
    Ok(())
}

/// Pull and push the community collections.
///
/// # Errors
///
/// Returns an error if the backend cannot be reached.
pub async fn sync(ctx: &Context) -> CliResult {
    let report = ctx.community().sync().await?;
    say(format!(
        "Synced: {} updated from the marketplace, {} sent, {} still waiting.",
        report.merged, report.pushed, report.still_dirty
    ));
    Ok(())
}
