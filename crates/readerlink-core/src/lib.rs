//! Core domain types for the readerlink card reader supervisor.
//!
//! This crate holds the vocabulary shared by every other readerlink crate:
//! the discovered [`Reader`], the reader connection state machine, the
//! firmware update state machines, discovery statuses and the prompts a
//! reader raises while a payment is in progress.

pub mod constants;
pub mod error;
pub mod status;
pub mod types;

pub use error::{Error, Result};
pub use status::*;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
