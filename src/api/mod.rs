//! HTTP API Module
//!
//! REST surface over the namespace service and the user store.

mod auth;
mod http;

pub use auth::AuthUser;
pub use http::{AppState, ErrorResponse, HttpServer};
