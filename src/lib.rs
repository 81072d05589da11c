//! Listing Watch Library
//!
//! Periodic, sharded scanner for new exchange listings: resolves each new
//! token's contract and notifies a Telegram chat under a strict rate limit.

pub mod cli;
pub mod config;
pub mod error;
pub mod notify;
pub mod resolve;
pub mod scan;
pub mod sources;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
