//! Card reader connection and firmware update supervision.
//!
//! This crate turns the callback-driven terminal SDK into typed, observable
//! state that application code can consume without racing on reader state:
//!
//! - [`ConnectionManager`]: the facade. Discovery, connect, disconnect,
//!   firmware update install and cancel, and the replayed state cells.
//! - [`DiscoverReadersAction`]: one vendor scan as a [`DiscoverySession`]
//!   stream.
//! - [`ConnectionStatusListener`]: reader status state machine fed by vendor
//!   link events.
//! - [`ReaderEventListener`]: firmware update status and availability fed
//!   by vendor reader events, plus prompt forwarding.
//! - [`ReaderMessageChannel`]: single-observer prompt delivery.
//! - [`classify_update_failure`]: vendor error code to update failure reason.
//!
//! # Concurrency
//!
//! The vendor delivers callbacks sequentially from its own worker context.
//! Listeners are the only writers of the `watch` cells; any number of
//! readers may observe them from other tasks. `connect` and `disconnect`
//! each suspend exactly once, and only one of them may be waiting on the
//! vendor at a time.

mod bridge;
pub mod classifier;
pub mod discovery;
pub mod error;
pub mod manager;
pub mod messages;
pub mod reader_listener;
pub mod status_listener;

pub use classifier::classify_update_failure;
pub use discovery::{DiscoverReadersAction, DiscoverySession};
pub use error::{ConnectionError, Result};
pub use manager::{ConnectionManager, ConnectionManagerConfig, DiscoveryEvents};
pub use messages::{ReaderMessageChannel, ReaderPromptReceiver};
pub use reader_listener::ReaderEventListener;
pub use status_listener::ConnectionStatusListener;
