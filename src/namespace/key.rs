//! Namespace keys
//!
//! `UserId` is the canonical identity string used as a namespace root and
//! `ObjectKey` is a full `{userId}/{relativePath}` key inside the bucket.

use serde::Serialize;

use crate::error::{Error, Result};

/// Base used when a filename has nothing before its extension
pub const FALLBACK_BASE: &str = "file";

/// Canonical user identifier, safe to use as a key prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validate a raw identifier
    ///
    /// Rejects empty ids and anything that could escape or alias another
    /// user's prefix: separators, control characters, `.` and `..`.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();

        if raw.trim().is_empty() {
            return Err(Error::IdentityResolution("identifier is empty".into()));
        }
        if raw == "." || raw == ".." {
            return Err(Error::IdentityResolution(format!("identifier {:?} is reserved", raw)));
        }
        if raw.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
            return Err(Error::IdentityResolution(format!(
                "identifier {:?} is not key-path safe",
                raw
            )));
        }

        Ok(Self(raw))
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace prefix, also the key of the folder marker
    pub fn prefix(&self) -> String {
        format!("{}/", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Full object key inside the bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Build the candidate key for a given collision attempt
    ///
    /// Attempt 0 is `{user}/{base}{ext}`, attempt n is `{user}/{base} (n){ext}`.
    pub fn candidate(user: &UserId, base: &str, ext: &str, attempt: u32) -> Self {
        if attempt == 0 {
            Self(format!("{}/{}{}", user, base, ext))
        } else {
            Self(format!("{}/{} ({}){}", user, base, attempt, ext))
        }
    }

    /// Borrow the key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the key string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reduce a client-supplied filename to a usable final path component
pub fn sanitize_name(desired: &str) -> Result<&str> {
    let name = desired
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(desired)
        .trim();

    if name.is_empty() {
        return Err(Error::InvalidInput("filename is empty".into()));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidInput(format!("filename {:?} is not allowed", name)));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::InvalidInput("filename contains control characters".into()));
    }

    Ok(name)
}

/// Split a filename at its last `.` into base and extension
///
/// The extension keeps its dot. An empty base becomes [`FALLBACK_BASE`].
pub fn split_name(name: &str) -> (&str, &str) {
    let (base, ext) = match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    };

    if base.is_empty() {
        (FALLBACK_BASE, ext)
    } else {
        (base, ext)
    }
}
