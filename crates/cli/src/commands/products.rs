//! Product listing commands.

use taja_haat_client::api::ProductQuery;
use taja_haat_core::{NewProduct, PhoneNumber, Product, Role, Taka};

use super::context::{CliResult, Context};
use super::say;

/// A new listing from the command line.
pub struct ProductArgs {
    pub name: String,
    pub category: String,
    pub description: String,
    pub unit: String,
    pub price: Taka,
    pub quantity: u32,
}

fn print_product(product: &Product) {
    say(format!(
        "{}  {} [{}]  {} per {}  ({} {} available)  seller {} <{}>",
        product.id,
        product.name,
        product.category,
        product.price_per_unit,
        product.unit,
        product.quantity_available,
        product.unit,
        product.seller_name,
        product.seller_phone
    ));
}

/// List products.
///
/// # Errors
///
/// Returns an error if the backend cannot be reached.
pub async fn list(
    ctx: &Context,
    seller: Option<PhoneNumber>,
    category: Option<String>,
) -> CliResult {
    let products = ctx
        .api
        .list_products(&ProductQuery { seller, category })
        .await?;

    if products.is_empty() {
        say("No products listed.");
    }
    for product in &products {
        print_product(product);
    }
    Ok(())
}

/// List a product as the signed-in farmer.
///
/// # Errors
///
/// Returns an error unless a farmer is signed in and the backend accepts
/// the listing.
pub async fn add(ctx: &Context, args: ProductArgs) -> CliResult {
    let farmer = ctx.current_user_as(Role::Farmer)?;
    if !args.price.is_positive() {
        return Err("Price must be greater than zero.".into());
    }

    let product = ctx
        .api
        .create_product(&NewProduct {
            name: args.name,
            category: args.category,
            description: args.description,
            unit: args.unit,
            price_per_unit: args.price,
            quantity_available: args.quantity,
            seller_phone: farmer.phone,
            seller_name: farmer.name,
            image: None,
        })
        .await?;

    say("Listed:");
    print_product(&product);
    Ok(())
}
