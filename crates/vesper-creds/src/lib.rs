//! Vesper Creds - Credential store port for cloud providers.
//!
//! The router resolves a bearer credential per provider immediately
//! before dispatch. The production backend is the OS keystore with
//! "unlocked, this device only" accessibility and a distinct service
//! name per provider; that platform glue lives outside the core. This
//! crate defines the port plus two backends:
//!
//! - [`MemoryCredentialStore`] for tests and ephemeral sessions
//! - [`FileCredentialStore`] for headless machines, refusing secret
//!   files readable by group or other

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod file;
mod store;

pub use error::{CredError, CredResult};
pub use file::FileCredentialStore;
pub use store::{CredentialStore, MemoryCredentialStore, Secret, service_name};
