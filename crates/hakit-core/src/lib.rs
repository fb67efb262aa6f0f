//! Shared vocabulary for the HAKit sensor drivers.
//!
//! This crate holds the types exchanged between the event loop and the poll
//! worker of every driver instance ([`Request`], [`Command`], [`Response`]),
//! the channel addressing type ([`ChannelId`]), the published value formats
//! ([`ValueFormat`]) and the common [`Error`] type. It performs no I/O.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, QueueKind, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
