//! Taja Haat CLI - marketplace administration and a terminal front end.
//!
//! # Usage
//!
//! ```bash
//! # Prepare the backend database
//! haat migrate
//! haat seed products -f seed/products.yaml --clear
//!
//! # Register (two steps) and sign in
//! haat register --name "Karim Uddin" --phone 01712345678 --password secret1 --role farmer --address Bogura
//! haat verify 123456 --password secret1
//! haat login --phone 01712345678 --password secret1
//!
//! # Trade
//! haat products list --category vegetables
//! haat orders place <product-id> --quantity 3
//! haat orders act <order-id> accept
//! haat demands post --crop Potato --quantity 500 --unit kg --price 22
//! haat sync
//! haat forecast --region Bogura --insights
//! ```
//!
//! Backend commands read `BACKEND_DATABASE_URL`; everything else talks to
//! the backend at `TAJA_API_BASE_URL` and keeps its session in
//! `TAJA_DATA_DIR`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use taja_haat_client::community::{BidDraft, DemandDraft};
use taja_haat_core::{BidId, DemandId, OrderAction, OrderId, OrderStatus, PhoneNumber, ProductId, Role, Taka};

mod commands;

use commands::account::RegisterArgs;
use commands::context::{CliResult, Context};
use commands::products::ProductArgs;

#[derive(Parser)]
#[command(name = "haat")]
#[command(author, version, about = "Taja Haat marketplace CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run backend database migrations
    Migrate,
    /// Seed the backend database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Start a registration; finish it with `verify`
    Register {
        #[arg(short, long)]
        name: String,
        /// 11-digit mobile number starting with 01
        #[arg(short, long)]
        phone: String,
        #[arg(long)]
        password: String,
        /// farmer, buyer, admin or driver
        #[arg(short, long)]
        role: Role,
        #[arg(short, long, default_value = "")]
        address: String,
        /// Profile picture to upload
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Finish a registration with the verification code
    Verify {
        code: String,
        /// The password given to `register`; it is not kept between runs
        #[arg(long)]
        password: String,
    },
    /// Sign in
    Login {
        #[arg(short, long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the current session
    Whoami,
    /// Browse and list products
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Place and manage orders
    Orders {
        #[command(subcommand)]
        action: OrderCommand,
    },
    /// Buyer demand posts
    Demands {
        #[command(subcommand)]
        action: DemandAction,
    },
    /// Farmer bids on demand posts
    Bids {
        #[command(subcommand)]
        action: BidAction,
    },
    /// Farmer reviews
    Reviews {
        #[command(subcommand)]
        action: ReviewAction,
    },
    /// Exchange demands, bids and reviews with the marketplace
    Sync,
    /// Crop demand and supply forecast
    Forecast {
        #[arg(short, long, default_value = "Bangladesh")]
        region: String,
        /// Also print a short market outlook
        #[arg(long)]
        insights: bool,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert product listings from a YAML file
    Products {
        /// Path to the YAML file
        #[arg(short, long)]
        file: PathBuf,
        /// Remove listings no order refers to first
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products
    List {
        #[arg(long)]
        seller: Option<PhoneNumber>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List a product (farmers)
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        category: String,
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Price per unit in taka
        #[arg(long)]
        price: Taka,
        #[arg(short, long)]
        quantity: u32,
        #[arg(short, long, default_value = "")]
        description: String,
    },
}

#[derive(Subcommand)]
enum OrderCommand {
    /// Orders on your dashboard
    List {
        #[arg(short, long)]
        status: Option<OrderStatus>,
    },
    /// Order a product (buyers)
    Place {
        product: ProductId,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
        #[arg(short, long)]
        address: Option<String>,
    },
    /// Apply an action such as accept, ship or mark_delivered
    Act { order: OrderId, action: OrderAction },
    /// Send orders saved while offline
    Flush,
}

#[derive(Subcommand)]
enum DemandAction {
    /// Post a demand (buyers)
    Post {
        #[arg(short, long)]
        crop: String,
        #[arg(short, long)]
        quantity: u32,
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Target price per unit in taka
        #[arg(long)]
        price: Taka,
        #[arg(short, long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Open demands
    List {
        /// Only your own demands
        #[arg(long)]
        mine: bool,
    },
    /// Close one of your demands
    Close { demand: DemandId },
}

#[derive(Subcommand)]
enum BidAction {
    /// Bid on a demand (farmers)
    Place {
        demand: DemandId,
        /// Price per unit in taka
        #[arg(long)]
        price: Taka,
        #[arg(short, long)]
        quantity: u32,
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Bids on a demand, or your own bids without one
    List { demand: Option<DemandId> },
    /// Accept a bid on your demand
    Accept { bid: BidId },
}

#[derive(Subcommand)]
enum ReviewAction {
    /// Rate a farmer from 1 to 5
    Add {
        farmer: PhoneNumber,
        #[arg(short, long)]
        rating: u8,
        #[arg(short, long, default_value = "")]
        comment: String,
    },
    /// A farmer's reviews
    List { farmer: PhoneNumber },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed {
            target: SeedTarget::Products { file, clear },
        } => {
            commands::seed::products(&file, clear).await?;
        }
        command => run_client(command).await?,
    }
    Ok(())
}

async fn run_client(command: Commands) -> CliResult {
    let ctx = Context::load()?;

    match command {
        Commands::Register {
            name,
            phone,
            password,
            role,
            address,
            image,
        } => {
            commands::account::register(
                &ctx,
                RegisterArgs {
                    name,
                    phone,
                    password,
                    role,
                    address,
                    image,
                },
            )
            .await
        }
        Commands::Verify { code, password } => {
            commands::account::verify(&ctx, &code, password).await
        }
        Commands::Login { phone, password } => {
            commands::account::login(&ctx, &phone, password).await
        }
        Commands::Logout => commands::account::logout(&ctx).await,
        Commands::Whoami => commands::account::whoami(&ctx),
        Commands::Products { action } => match action {
            ProductAction::List { seller, category } => {
                commands::products::list(&ctx, seller, category).await
            }
            ProductAction::Add {
                name,
                category,
                unit,
                price,
                quantity,
                description,
            } => {
                commands::products::add(
                    &ctx,
                    ProductArgs {
                        name,
                        category,
                        description,
                        unit,
                        price,
                        quantity,
                    },
                )
                .await
            }
        },
        Commands::Orders { action } => match action {
            OrderCommand::List { status } => commands::orders::list(&ctx, status).await,
            OrderCommand::Place {
                product,
                quantity,
                address,
            } => commands::orders::place(&ctx, product, quantity, address).await,
            OrderCommand::Act { order, action } => {
                commands::orders::act(&ctx, order, action).await
            }
            OrderCommand::Flush => commands::orders::flush(&ctx).await,
        },
        Commands::Demands { action } => match action {
            DemandAction::Post {
                crop,
                quantity,
                unit,
                price,
                location,
                note,
            } => {
                commands::community::post_demand(
                    &ctx,
                    DemandDraft {
                        crop,
                        quantity,
                        unit,
                        target_price: price,
                        location,
                        note,
                    },
                )
                .await
            }
            DemandAction::List { mine } => commands::community::list_demands(&ctx, mine),
            DemandAction::Close { demand } => commands::community::close_demand(&ctx, demand).await,
        },
        Commands::Bids { action } => match action {
            BidAction::Place {
                demand,
                price,
                quantity,
                message,
            } => {
                commands::community::place_bid(
                    &ctx,
                    demand,
                    BidDraft {
                        price_per_unit: price,
                        quantity,
                        message,
                    },
                )
                .await
            }
            BidAction::List { demand } => commands::community::list_bids(&ctx, demand),
            BidAction::Accept { bid } => commands::community::accept_bid(&ctx, bid).await,
        },
        Commands::Reviews { action } => match action {
            ReviewAction::Add {
                farmer,
                rating,
                comment,
            } => commands::community::add_review(&ctx, farmer, rating, comment).await,
            ReviewAction::List { farmer } => commands::community::list_reviews(&ctx, &farmer),
        },
        Commands::Sync => commands::community::sync(&ctx).await,
        Commands::Forecast { region, insights } => {
            commands::forecast::run(&ctx, &region, insights).await
        }
        Commands::Migrate | Commands::Seed { .. } => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_typed_arguments() {
        let cli = Cli::try_parse_from(["haat", "orders", "act", "o-1", "mark-delivered"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Orders {
                action: OrderCommand::Act {
                    action: OrderAction::MarkDelivered,
                    ..
                }
            }
        ));

        let cli = Cli::try_parse_from(["haat", "orders", "list", "--status", "shipped"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Orders {
                action: OrderCommand::List {
                    status: Some(OrderStatus::InTransit)
                }
            }
        ));
    }

    #[test]
    fn test_verify_needs_password() {
        assert!(Cli::try_parse_from(["haat", "verify", "123456"]).is_err());
        let cli = Cli::try_parse_from(["haat", "verify", "123456", "--password", "secret1"]).unwrap();
        assert!(matches!(cli.command, Commands::Verify { .. }));
    }

    #[test]
    fn test_rejects_malformed_phone() {
        assert!(Cli::try_parse_from(["haat", "reviews", "list", "0171234"]).is_err());
        assert!(Cli::try_parse_from(["haat", "register", "-n", "K", "-p", "01712345678", "--password", "secret1", "-r", "farmer"]).is_ok());
        assert!(Cli::try_parse_from(["haat", "register", "-n", "K", "-p", "01712345678", "--password", "secret1", "-r", "grower"]).is_err());
    }
}
