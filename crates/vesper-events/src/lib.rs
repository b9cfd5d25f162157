//! Vesper Events - Event bus for monitor and router events.
//!
//! Monitors publish change events (thermal, memory pressure, battery,
//! network reachability); the router publishes lifecycle events
//! (decisions, completions, failures). Delivery is at-least-once over
//! a broadcast channel; consumers are expected to be idempotent. A
//! change event is delivered only after the snapshot it references has
//! been published.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, RouterEvent};
