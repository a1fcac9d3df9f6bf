//! Demands, bids and reviews shared between devices through the backend.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use taja_haat_client::community::{BidDraft, DemandDraft};
use taja_haat_core::{BidStatus, Role, Taka};
use taja_haat_integration_tests::TestContext;

fn potatoes() -> DemandDraft {
    DemandDraft {
        crop: "Potato".to_string(),
        quantity: 500,
        unit: "kg".to_string(),
        target_price: Taka::new(Decimal::from(22)),
        location: "Dhaka".to_string(),
        note: String::new(),
    }
}

fn bid(price: i64) -> BidDraft {
    BidDraft {
        price_per_unit: Taka::new(Decimal::from(price)),
        quantity: 500,
        message: String::new(),
    }
}

#[tokio::test]
async fn test_demand_reaches_farmer_and_bid_comes_back() {
    let ctx = TestContext::new().await;
    let buyer = ctx
        .registered("Rahima Begum", "01812345678", Role::Buyer)
        .await;
    let farmer = ctx
        .registered("Karim Uddin", "01712345678", Role::Farmer)
        .await;
    let buyer_board = ctx.community(&buyer);
    let farmer_board = ctx.community(&farmer);

    let demand = buyer_board
        .post_demand(&buyer.user(), potatoes())
        .await
        .unwrap();
    assert!(farmer_board.open_demands().unwrap().is_empty());

    let report = farmer_board.sync().await.unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(farmer_board.open_demands().unwrap()[0].id, demand.id);

    let placed = farmer_board
        .place_bid(&farmer.user(), &demand.id, bid(21))
        .await
        .unwrap();
    assert_eq!(farmer_board.dirty_count().unwrap(), 0);

    buyer_board.sync().await.unwrap();
    let bids = buyer_board.bids_for_demand(&demand.id).unwrap();
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0].id, placed.id);

    buyer_board.accept_bid(&buyer.user(), &placed.id).await.unwrap();

    farmer_board.sync().await.unwrap();
    let mine = farmer_board.my_bids(&farmer.user().phone).unwrap();
    assert_eq!(mine[0].status, BidStatus::Accepted);
    assert!(farmer_board.open_demands().unwrap().is_empty());
}

#[tokio::test]
async fn test_reviews_from_two_buyers_average_on_a_third_device() {
    let ctx = TestContext::new().await;
    let farmer = ctx
        .registered("Karim Uddin", "01712345678", Role::Farmer)
        .await;
    let first = ctx
        .registered("Rahima Begum", "01812345678", Role::Buyer)
        .await;
    let second = ctx
        .registered("Jamal Hossain", "01812345679", Role::Buyer)
        .await;
    let target = farmer.user().phone;

    ctx.community(&first)
        .add_review(&first.user(), &target, 5, "Fresh".to_string())
        .await
        .unwrap();
    ctx.community(&second)
        .add_review(&second.user(), &target, 3, String::new())
        .await
        .unwrap();

    let farmer_board = ctx.community(&farmer);
    assert_eq!(farmer_board.rating_for(&target).unwrap(), None);
    farmer_board.sync().await.unwrap();

    assert_eq!(farmer_board.reviews_for(&target).unwrap().len(), 2);
    assert_eq!(farmer_board.rating_for(&target).unwrap(), Some(Decimal::from(4)));
}
