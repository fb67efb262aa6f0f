//! Asynchronous hardware-poll bridge for HAKit sensor drivers.
//!
//! Sensor hardware is read through blocking calls (1-wire sysfs files, I2C and
//! SPI transfers) while the host engine runs a single-threaded event loop
//! that must never stall. This crate puts a dedicated worker thread between
//! the two:
//!
//! ```text
//!  inputs / timer            ┌──────────────┐            ┌──────────────┐
//! ───────────────► Driver ──►│ request queue│──► worker ─►│  Device      │
//!                    ▲       └──────────────┘   thread   │  Operation   │
//!                    │       ┌──────────────┐      │     └──────────────┘
//!   Publisher ◄── dedup ◄────│response queue│◄─────┘
//!                            └──────────────┘
//! ```
//!
//! # Design
//!
//! - **One worker per instance**: device access is serialized, and the
//!   device handle never leaves the worker thread.
//! - **Bounded queues**: a full request queue is an error at the call site; a
//!   full response queue blocks the worker until the event loop catches up.
//! - **Event-loop owned state**: the dedup layer ([`ChannelTable`]) is only
//!   touched by the [`Driver`], so no locks are involved.
//! - **Per-request force**: the forced-refresh flag travels in the
//!   [`Request`] and comes back in the [`Response`].
//!
//! # Modules
//!
//! - [`traits`]: [`DeviceOperation`] and [`Publisher`]
//! - [`queue`]: the two bounded queues
//! - [`worker`]: the poll worker thread
//! - [`trigger`]: trigger levels, input routing, periodic timer
//! - [`dispatch`]: dedup and forced refresh
//! - [`driver`]: the driver instance tying it together
//! - [`averaging`]: oversampling wrapper for any device
//! - [`mock`]: scriptable device and recording publisher

pub mod averaging;
pub mod dispatch;
pub mod driver;
pub mod mock;
pub mod queue;
pub mod traits;
pub mod trigger;
pub mod worker;

pub use averaging::Averaging;
pub use dispatch::{ChannelSpec, ChannelState, ChannelTable, Outcome, Publication};
pub use driver::{Activity, Driver, DriverConfig, DriverStats};
pub use traits::{DeviceOperation, Publisher};
pub use worker::{PollWorker, WorkerExit};

pub use hakit_core::{
    ChannelId, Command, Error, QueueKind, RawValue, Request, Response, Result, ValueFormat,
};
