//! Prelude module - commonly used types for convenient import.

pub use crate::{
    CredError, CredResult, CredentialStore, FileCredentialStore, MemoryCredentialStore, Secret,
};
