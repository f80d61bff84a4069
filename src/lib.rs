//! Cubby - Multi-user File Storage Backend
//!
//! Users register, log in, upload files and list what they have stored.
//! Every upload lands in a flat object store under a per-user key prefix.
//!
//! # Architecture
//!
//! The namespace service sits between the HTTP layer and the object store.
//! It resolves the caller to a user id, allocates a collision-free key for
//! each upload, and rebuilds a folder hierarchy from the flat key listing.
//!
//! # Features
//!
//! - Collision-free key allocation with `name (n).ext` suffixes
//! - Hierarchical listings synthesized from `/`-delimited keys
//! - S3-compatible and in-memory object store backends
//! - SQLite user records with Argon2 password hashes
//! - Bearer-token authentication
//! - Optional external folder advisor

pub mod advisor;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod namespace;
pub mod store;
pub mod users;

pub use config::CubbyConfig;
pub use error::{Error, Result};

/// Crate version reported by the health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CubbyConfig;
    pub use crate::error::{Error, Result};
    pub use crate::namespace::{EntryKind, FileEntry, Namespace, ObjectKey, UserId};
    pub use crate::store::{MemoryStore, ObjectStore, S3Store};
    pub use crate::auth::{Principal, TokenIssuer};
    pub use crate::users::UserStore;
}
