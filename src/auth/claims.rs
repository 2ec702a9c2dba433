//! Token claims and capability tiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// What a token lets the relay tier do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Room discovery; long-lived and stateless
    Read,
    /// Room create/join; short-lived and single-use
    Write,
}

impl Capability {
    /// Parse the tier name used in mint requests
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "read" => Some(Capability::Read),
            "write" => Some(Capability::Write),
            _ => None,
        }
    }

    /// Value of the `type` claim
    pub fn claim_value(&self) -> &'static str {
        match self {
            Capability::Read => "sfu:read",
            Capability::Write => "sfu:write",
        }
    }

    pub fn from_claim(s: &str) -> Option<Self> {
        match s {
            "sfu:read" => Some(Capability::Read),
            "sfu:write" => Some(Capability::Write),
            _ => None,
        }
    }

    /// Whether tokens of this tier are tracked by a single-use marker
    pub fn is_single_use(&self) -> bool {
        matches!(self, Capability::Write)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Read => write!(f, "read"),
            Capability::Write => write!(f, "write"),
        }
    }
}

/// Claims carried inside a token.
///
/// Every field is optional on decode so the verifier can report exactly
/// which claim is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

/// Store-resident record proving a write token has not been consumed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub sub: String,
    pub iss: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netplay_username: Option<String>,
}

/// Current Unix time in seconds
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_parse() {
        assert_eq!(Capability::parse("read"), Some(Capability::Read));
        assert_eq!(Capability::parse(" WRITE "), Some(Capability::Write));
        assert_eq!(Capability::parse("admin"), None);
        assert_eq!(Capability::parse(""), None);
    }

    #[test]
    fn test_capability_claim_round_trip() {
        for cap in [Capability::Read, Capability::Write] {
            assert_eq!(Capability::from_claim(cap.claim_value()), Some(cap));
        }
        assert_eq!(Capability::from_claim("read"), None);
        assert!(Capability::Write.is_single_use());
        assert!(!Capability::Read.is_single_use());
    }

    #[test]
    fn test_claims_wire_names() {
        let claims = Claims {
            sub: Some("alice".into()),
            capability: Some("sfu:read".into()),
            exp: Some(100),
            ..Default::default()
        };
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["type"], "sfu:read");
        assert!(value.get("jti").is_none());
        assert!(value.get("nbf").is_none());
    }
}
