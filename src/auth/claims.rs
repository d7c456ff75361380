//! Credential payload decoding
//!
//! Credentials are `header.payload.signature` strings. Only the payload is
//! read here, and its signature is never checked: the server does that.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::error::Error;
use super::store::{CredentialName, CredentialStore};

/// URL-safe alphabet with optional padding; standard input is normalized first
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Privilege level carried in a credential, ordered from least to most
///
/// Ordinals without a name are kept as-is and compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RoleRepr", into = "i64")]
pub struct Role(pub i64);

impl Role {
    pub const GUEST: Role = Role(0);
    pub const USER: Role = Role(1);
    pub const ADMIN: Role = Role(2);
    pub const SUPER_ADMIN: Role = Role(3);
}

/// Issuers write the ordinal either as a number or as numeric text
#[derive(Deserialize)]
#[serde(untagged)]
enum RoleRepr {
    Number(i64),
    Text(String),
}

impl TryFrom<RoleRepr> for Role {
    type Error = String;

    fn try_from(value: RoleRepr) -> std::result::Result<Self, Self::Error> {
        match value {
            RoleRepr::Number(n) => Ok(Role(n)),
            RoleRepr::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Role)
                .map_err(|_| format!("role is not an ordinal: {:?}", s)),
        }
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        role.0
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Role::GUEST => f.write_str("guest"),
            Role::USER => f.write_str("user"),
            Role::ADMIN => f.write_str("admin"),
            Role::SUPER_ADMIN => f.write_str("super admin"),
            Role(other) => write!(f, "level {}", other),
        }
    }
}

/// Claims decoded from a credential's payload segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry as a Unix timestamp
    #[serde(rename = "exp")]
    pub expires_at: i64,

    pub role: Role,

    /// Display name, already percent-decoded
    #[serde(rename = "unique_name", default)]
    pub display_name: String,
}

impl Claims {
    /// Seconds left before expiry, negative once expired
    pub fn seconds_remaining(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// Guests hold a credential but are not logged in
    pub fn is_logged_in(&self) -> bool {
        self.role >= Role::USER
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }
}

/// Decode the claims of a raw credential string
pub fn decode_payload(token: &str) -> Result<Claims> {
    let segment = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::MalformedCredential("missing payload segment".to_string()))?;

    let normalized = segment.replace('+', "-").replace('/', "_");
    let bytes = PAYLOAD_ENGINE
        .decode(normalized.as_bytes())
        .map_err(|e| Error::MalformedCredential(format!("payload is not base64: {}", e)))?;

    let mut claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedCredential(format!("payload is not valid claims: {}", e)))?;

    claims.display_name = urlencoding::decode(&claims.display_name)
        .map_err(|e| Error::MalformedCredential(format!("display name is not UTF-8: {}", e)))?
        .into_owned();

    Ok(claims)
}

/// Look up a stored credential and decode its claims
///
/// An absent credential yields `Ok(None)`; a present but undecodable one
/// is an error.
pub fn decode(
    store: &CredentialStore,
    name: CredentialName,
    allow_retry_other_backend: bool,
) -> Result<Option<Claims>> {
    match store.get(name, allow_retry_other_backend) {
        Some(token) => decode_payload(&token).map(Some),
        None => Ok(None),
    }
}
