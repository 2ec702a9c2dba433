//! Token issuance and verification
//!
//! Capability tiers:
//! - `read`: room discovery, 15 minute lifetime, stateless
//! - `write`: room create/join, 30 second lifetime, single-use via a store marker

mod claims;
mod issuer;
mod tokens;
mod verifier;

pub use claims::{unix_now, Capability, Claims, Marker};
pub use issuer::{parse_capability, resolve_alias, MintedToken, TokenIssuer, ALIAS_KEYS, TOKEN_TYPE};
pub use tokens::{Secrets, ServiceSecret, SigningKey, TokenError, TOKEN_ALGORITHM};
pub use verifier::{TokenVerifier, ValidatedClaims, VerifiedToken};
