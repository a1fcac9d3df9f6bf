//! Taja Haat Core - Shared types library.
//!
//! This crate provides the domain types used across all Taja Haat components:
//! - `backend` - REST service for users, products, orders and community data
//! - `client` - Session, ordering and community logic used by front ends
//! - `cli` - The `haat` command-line tool
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. The order transition table lives here so
//! the backend can enforce it and clients can offer only legal actions.
//!
//! # Modules
//!
//! - [`types`] - Phone numbers, synthetic identity emails, ids, prices,
//!   statuses, orders and community records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
