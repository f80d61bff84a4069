//! Identity Resolver
//!
//! The authentication layer can surface a caller in several shapes. They
//! are normalized here, once, into a [`UserId`]. Nothing downstream looks
//! at the raw principal.

use serde_json::{Map, Value};

use super::token::Claims;
use crate::error::{Error, Result};
use crate::namespace::UserId;

/// Field holding the identifier in claims and maps
pub const ID_FIELD: &str = "id";

/// Authenticated caller as produced by the authentication layer
#[derive(Debug, Clone)]
pub enum Principal {
    /// Verified token claims
    Claims(Claims),
    /// Generic string-keyed map with an `id` entry
    Map(Map<String, Value>),
    /// Bare identifier string
    Raw(String),
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Principal::Claims(claims)
    }
}

impl From<Map<String, Value>> for Principal {
    fn from(map: Map<String, Value>) -> Self {
        Principal::Map(map)
    }
}

impl From<String> for Principal {
    fn from(raw: String) -> Self {
        Principal::Raw(raw)
    }
}

/// Resolve a principal to its canonical user id
///
/// Fails with [`Error::IdentityResolution`] when no identifier is present,
/// it is empty, or it is not safe to use as a key prefix.
pub fn resolve(principal: &Principal) -> Result<UserId> {
    let raw = match principal {
        Principal::Claims(claims) => claims.id.clone(),
        Principal::Map(map) => map_identifier(map)?,
        Principal::Raw(raw) => raw.clone(),
    };

    UserId::parse(raw)
}

fn map_identifier(map: &Map<String, Value>) -> Result<String> {
    match map.get(ID_FIELD) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(other) => Err(Error::IdentityResolution(format!(
            "unsupported identifier value {}",
            other
        ))),
        None => Err(Error::IdentityResolution("no identifier in principal".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(id: &str) -> Claims {
        Claims {
            id: id.to_string(),
            iat: 0,
            exp: u64::MAX,
        }
    }

    fn map(value: Value) -> Principal {
        match value {
            Value::Object(map) => Principal::Map(map),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_claims() {
        let user = resolve(&claims("abc-123").into()).unwrap();
        assert_eq!(user.as_str(), "abc-123");
    }

    #[test]
    fn test_map_with_string_and_number() {
        assert_eq!(resolve(&map(json!({"id": "u-7"}))).unwrap().as_str(), "u-7");
        assert_eq!(resolve(&map(json!({"id": 42, "exp": 1}))).unwrap().as_str(), "42");
    }

    #[test]
    fn test_raw_string() {
        let user = resolve(&Principal::from("plain-id".to_string())).unwrap();
        assert_eq!(user.as_str(), "plain-id");
    }

    #[test]
    fn test_rejects_missing_or_empty() {
        let cases = vec![
            map(json!({})),
            map(json!({"id": ""})),
            map(json!({"id": null})),
            map(json!({"id": 1.5})),
            map(json!({"id": {"nested": "x"}})),
            claims("").into(),
            Principal::Raw(String::new()),
            Principal::Raw("../other".to_string()),
        ];

        for principal in cases {
            assert!(
                matches!(resolve(&principal), Err(Error::IdentityResolution(_))),
                "{:?} should not resolve",
                principal
            );
        }
    }
}
