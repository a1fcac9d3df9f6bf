//! Command implementations.

pub mod account;
pub mod community;
pub mod context;
pub mod forecast;
pub mod migrate;
pub mod orders;
pub mod products;
pub mod seed;

/// Print one line of command output.
#[allow(clippy::print_stdout)]
pub fn say(text: impl std::fmt::Display) {
    println!("{text}");
}
