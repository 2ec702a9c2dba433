//! Token signing and the secrets behind it
//!
//! Tokens are compact HS256 JWTs: `header.claims.signature`, each part
//! base64url without padding, signature = HMAC-SHA256 over `header.claims`.
//!
//! Two independent secrets exist:
//! - `SigningKey`: signs and verifies tokens
//! - `ServiceSecret`: authenticates relay nodes on internal endpoints

use crate::error::SfuError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// The only accepted `alg` header value
pub const TOKEN_ALGORITHM: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    InvalidFormat,

    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token decode error: {0}")]
    DecodeError(String),

    #[error("token encode error: {0}")]
    EncodeError(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Secret used to sign and verify tokens
#[derive(Clone)]
pub struct SigningKey {
    key: Vec<u8>,
}

impl SigningKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size")
    }

    /// Sign a claims object into a token string
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let header = Header {
            alg: TOKEN_ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| TokenError::EncodeError(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(claims).map_err(|e| TokenError::EncodeError(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Check the signature and decode the claims.
    ///
    /// Only the signature is checked here; time window and claim values are
    /// the verifier's job.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(TokenError::InvalidFormat);
        }
        let (header_b64, claims_b64, signature_b64) = (parts[0], parts[1], parts[2]);

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|e| TokenError::DecodeError(e.to_string()))?;
        let header: Header = serde_json::from_slice(&header_json)
            .map_err(|e| TokenError::DecodeError(e.to_string()))?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::InvalidSignature)?;

        let mut mac = self.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|e| TokenError::DecodeError(e.to_string()))?;

        serde_json::from_slice(&claims_json).map_err(|e| TokenError::DecodeError(e.to_string()))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED])")
    }
}

/// Pre-shared secret presented by relay nodes
#[derive(Clone)]
pub struct ServiceSecret {
    secret: String,
}

impl ServiceSecret {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Constant-time comparison against a presented value
    pub fn matches(&self, presented: &str) -> bool {
        self.secret.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl fmt::Debug for ServiceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceSecret([REDACTED])")
    }
}

/// Both secrets, as configured. Either may be absent; the endpoints that
/// need a missing one answer `Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub signing: Option<SigningKey>,
    pub service: Option<ServiceSecret>,
}

impl Secrets {
    /// Empty strings count as not configured. The two secrets must differ.
    pub fn new(signing: Option<String>, service: Option<String>) -> Result<Self, SfuError> {
        let signing = signing.filter(|s| !s.is_empty());
        let service = service.filter(|s| !s.is_empty());

        if let (Some(a), Some(b)) = (&signing, &service) {
            if a.as_bytes().ct_eq(b.as_bytes()).into() {
                return Err(SfuError::InvalidRequest(
                    "service secret must not reuse the signing secret".to_string(),
                ));
            }
        }

        Ok(Self {
            signing: signing.map(SigningKey::new),
            service: service.map(ServiceSecret::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const TEST_SECRET: &[u8] = b"test-secret-key-for-signing";

    #[test]
    fn test_sign_verify() {
        let key = SigningKey::new(TEST_SECRET);
        let token = key.sign(&json!({"sub": "alice", "exp": 10})).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims: Value = key.verify(&token).unwrap();
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["exp"], 10);
    }

    #[test]
    fn test_verify_wrong_secret() {
        let token = SigningKey::new(TEST_SECRET).sign(&json!({"sub": "alice"})).unwrap();

        let result: Result<Value, _> = SigningKey::new(b"wrong-secret".to_vec()).verify(&token);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_verify_tampered_claims() {
        let key = SigningKey::new(TEST_SECRET);
        let token = key.sign(&json!({"sub": "alice"})).unwrap();
        let forged_claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"mallory"}"#);

        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        let result: Result<Value, _> = key.verify(&forged);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_verify_rejects_none_algorithm() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"alice"}"#);
        let token = format!("{}.{}.AAAA", header, claims);

        let result: Result<Value, _> = SigningKey::new(TEST_SECRET).verify(&token);
        assert!(matches!(result, Err(TokenError::UnsupportedAlgorithm(alg)) if alg == "none"));
    }

    #[test]
    fn test_verify_malformed() {
        let key = SigningKey::new(TEST_SECRET);
        for token in ["", "abc", "a.b", "a..c", "a.b.c.d"] {
            let result: Result<Value, _> = key.verify(token);
            assert!(result.is_err(), "accepted {:?}", token);
        }
    }

    #[test]
    fn test_service_secret() {
        let secret = ServiceSecret::new("relay-shared-secret".to_string());
        assert!(secret.matches("relay-shared-secret"));
        assert!(!secret.matches("wrong"));
        assert!(!secret.matches("relay-shared-secret-extra"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_secrets_redacted() {
        let secrets = Secrets::new(Some("sign".into()), Some("service".into())).unwrap();
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("sign\""));
        assert!(!debug.contains("service\""));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secrets_must_differ() {
        let result = Secrets::new(Some("same".into()), Some("same".into()));
        assert!(matches!(result, Err(SfuError::InvalidRequest(_))));
    }

    #[test]
    fn test_secrets_empty_means_unset() {
        let secrets = Secrets::new(Some(String::new()), None).unwrap();
        assert!(secrets.signing.is_none());
        assert!(secrets.service.is_none());
    }
}
