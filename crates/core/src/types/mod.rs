//! Domain types for Taja Haat.
//!
//! Type-safe wrappers and records shared by the backend, the client library
//! and the CLI.

pub mod community;
pub mod email;
pub mod id;
pub mod order;
pub mod phone;
pub mod price;
pub mod product;
#[cfg(feature = "sqlite")]
mod sql;
pub mod status;
pub mod user;

pub use community::{
    Bid, Collection, DemandPost, RatingOutOfRange, Review, SyncRecord, average_rating,
    merge_newest,
};
pub use email::{EmailError, IdentityEmail};
pub use id::*;
pub use order::{
    Actor, NewOrder, Order, OrderAction, StatusUpdate, TransitionError, available_actions,
    check_transition, filter_by_status,
};
pub use phone::{PhoneError, PhoneNumber};
pub use price::Taka;
pub use product::{NewProduct, Product};
pub use status::*;
pub use user::{NewUser, User, UserUpdate};
