//! Authentication Module
//!
//! Password hashing, bearer-token issuing and verification, and the
//! identity resolver that turns an authenticated principal into the
//! user id rooting a storage namespace.

pub mod password;
pub mod principal;
pub mod token;

pub use password::{hash_password, verify_password};
pub use principal::{resolve, Principal};
pub use token::{extract_bearer, Claims, TokenIssuer};
