//! Taja Haat client library.
//!
//! Everything a front end needs to talk to the marketplace:
//!
//! - [`api`] - REST client for the backend
//! - [`identity`] - Identity provider port with Firebase and in-memory adapters
//! - [`session`] - Registration, OTP verification, login and the persisted session
//! - [`orders`] - Order placement, status actions and dashboard views
//! - [`community`] - Demand posts, bids and reviews with local-first sync
//! - [`integrations`] - Image hosting, SMS notifications and crop forecasts
//! - [`config`] - Environment-driven settings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod community;
pub mod config;
pub mod identity;
pub mod integrations;
pub mod orders;
pub mod session;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError};
pub use community::{CommunityBoard, CommunityError};
pub use config::{ClientConfig, ConfigError};
pub use identity::{FirebaseIdentity, IdentityError, IdentityProvider, MemoryIdentity};
pub use orders::{OrderDesk, OrderError, Placement};
pub use session::{
    AuthError, FileSessionStore, MemorySessionStore, SessionManager, SessionState, SessionStore,
    SessionUser,
};
