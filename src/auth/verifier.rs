//! Token verification
//!
//! Verification runs in two phases:
//! 1. Signature and claims, no store access.
//! 2. For write tokens only, the single-use marker lookup. With `consume`
//!    the marker is removed atomically, so at most one consuming
//!    verification can succeed per token id.

use crate::auth::claims::{unix_now, Capability, Claims, Marker};
use crate::auth::tokens::SigningKey;
use crate::config::SfuConfig;
use crate::error::SfuError;
use crate::storage::KvStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Claims that passed phase one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaims {
    pub subject: String,
    pub issuer: String,
    pub capability: Capability,
    /// Present iff `capability` is `Write`
    pub token_id: Option<String>,
}

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub capability: Capability,
    /// Display alias recorded at mint time (write tokens only)
    pub alias: Option<String>,
}

fn reject(reason: impl Into<String>) -> SfuError {
    let reason = reason.into();
    debug!(reason = %reason, "Token rejected");
    SfuError::Unauthorized(reason)
}

pub struct TokenVerifier {
    config: Arc<SfuConfig>,
    key: SigningKey,
    store: Arc<dyn KvStore>,
}

impl TokenVerifier {
    pub fn new(config: Arc<SfuConfig>, key: SigningKey, store: Arc<dyn KvStore>) -> Self {
        Self { config, key, store }
    }

    pub async fn verify(&self, token: &str, consume: bool) -> Result<VerifiedToken, SfuError> {
        self.verify_at(token, consume, unix_now()).await
    }

    /// Verify against an explicit current time
    pub async fn verify_at(
        &self,
        token: &str,
        consume: bool,
        now: i64,
    ) -> Result<VerifiedToken, SfuError> {
        let claims = self.validate(token, now)?;

        let alias = match &claims.token_id {
            Some(token_id) => self.check_marker(&claims, token_id, consume).await?,
            None => None,
        };

        info!(
            subject = %claims.subject,
            capability = %claims.capability,
            consumed = consume && claims.token_id.is_some(),
            "Token verified"
        );

        Ok(VerifiedToken {
            subject: claims.subject,
            capability: claims.capability,
            alias,
        })
    }

    /// Phase one: signature and claims
    pub fn validate(&self, token: &str, now: i64) -> Result<ValidatedClaims, SfuError> {
        let claims: Claims = self
            .key
            .verify(token.trim())
            .map_err(|e| reject(format!("invalid token: {}", e)))?;

        let skew = self.config.clock_skew.as_secs() as i64;

        if let Some(nbf) = claims.nbf {
            if nbf > now.saturating_add(skew) {
                return Err(reject("token not yet valid"));
            }
        }

        let exp = claims.exp.ok_or_else(|| reject("token has no expiry"))?;
        if now > exp.saturating_add(skew) {
            return Err(reject("token expired"));
        }

        let issuer = claims.iss.unwrap_or_default();
        if issuer != self.config.issuer {
            return Err(reject("invalid token issuer"));
        }

        let capability = claims
            .capability
            .as_deref()
            .and_then(Capability::from_claim)
            .ok_or_else(|| reject("invalid token type"))?;

        let subject = claims
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| reject("token has no subject"))?;

        let token_id = claims.jti.filter(|j| !j.is_empty());
        match (capability.is_single_use(), &token_id) {
            (true, None) => return Err(reject("write token has no token id")),
            (false, Some(_)) => return Err(reject("read token must not carry a token id")),
            _ => {}
        }

        Ok(ValidatedClaims {
            subject,
            issuer,
            capability,
            token_id,
        })
    }

    /// Phase two: single-use marker lookup, returns the recorded alias
    async fn check_marker(
        &self,
        claims: &ValidatedClaims,
        token_id: &str,
        consume: bool,
    ) -> Result<Option<String>, SfuError> {
        let key = self.config.marker_key(token_id);

        let raw = if consume {
            self.store.take(&key).await?
        } else {
            self.store.get(&key).await?
        };
        let raw = raw.ok_or_else(|| reject("token not listed or already consumed"))?;

        let marker: Marker = serde_json::from_str(&raw)
            .map_err(|e| SfuError::Internal(format!("corrupt token marker {}: {}", key, e)))?;

        if marker.sub != claims.subject || marker.iss != claims.issuer || marker.jti != token_id {
            return Err(reject("token does not match its marker"));
        }

        Ok(marker.netplay_username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issuer::TokenIssuer;
    use crate::session::Principal;
    use crate::storage::MemoryStore;
    use serde_json::{json, Map};
    use std::time::Duration;

    const SECRET: &[u8] = b"verifier-test-secret";
    const NOW: i64 = 1_700_000_000;

    struct Fixture {
        store: Arc<MemoryStore>,
        issuer: TokenIssuer,
        verifier: TokenVerifier,
    }

    fn fixture() -> Fixture {
        let config = Arc::new(SfuConfig::default());
        let store = Arc::new(MemoryStore::new());
        Fixture {
            issuer: TokenIssuer::new(config.clone(), SigningKey::new(SECRET), store.clone()),
            verifier: TokenVerifier::new(config, SigningKey::new(SECRET), store.clone()),
            store,
        }
    }

    fn sign(claims: &Claims) -> String {
        SigningKey::new(SECRET).sign(claims).unwrap()
    }

    fn read_claims() -> Claims {
        Claims {
            sub: Some("alice".into()),
            iss: Some("sfu-auth".into()),
            capability: Some("sfu:read".into()),
            jti: None,
            iat: Some(NOW),
            exp: Some(NOW + 900),
            nbf: None,
        }
    }

    fn assert_unauthorized(result: Result<impl std::fmt::Debug, SfuError>, reason: &str) {
        match result {
            Err(SfuError::Unauthorized(r)) => assert!(r.contains(reason), "reason was {:?}", r),
            other => panic!("expected Unauthorized({}), got {:?}", reason, other),
        }
    }

    #[tokio::test]
    async fn test_mint_then_verify_both_tiers() {
        let f = fixture();
        for cap in [Capability::Read, Capability::Write] {
            let minted = f
                .issuer
                .mint_at(&Principal::new("alice"), cap, NOW)
                .await
                .unwrap();
            let verified = f.verifier.verify_at(&minted.token, false, NOW).await.unwrap();
            assert_eq!(verified.subject, "alice");
            assert_eq!(verified.capability, cap);
        }
    }

    #[tokio::test]
    async fn test_write_token_consumed_once() {
        let f = fixture();
        let minted = f
            .issuer
            .mint_at(&Principal::new("alice"), Capability::Write, NOW)
            .await
            .unwrap();

        let first = f.verifier.verify_at(&minted.token, true, NOW).await.unwrap();
        assert_eq!(first.subject, "alice");

        let second = f.verifier.verify_at(&minted.token, true, NOW).await;
        assert_unauthorized(second, "already consumed");

        // Non-consuming checks also fail once the marker is gone
        let third = f.verifier.verify_at(&minted.token, false, NOW).await;
        assert_unauthorized(third, "already consumed");
    }

    #[tokio::test]
    async fn test_non_consuming_verify_is_repeatable() {
        let f = fixture();
        let settings: Map<String, serde_json::Value> =
            json!({"netplayUsername": "Ali"}).as_object().cloned().unwrap();
        let minted = f
            .issuer
            .mint_at(
                &Principal::new("alice").with_settings(settings),
                Capability::Write,
                NOW,
            )
            .await
            .unwrap();

        for _ in 0..3 {
            let v = f.verifier.verify_at(&minted.token, false, NOW).await.unwrap();
            assert_eq!(v.alias.as_deref(), Some("Ali"));
        }

        // Still consumable afterwards
        assert!(f.verifier.verify_at(&minted.token, true, NOW).await.is_ok());
    }

    #[tokio::test]
    async fn test_marker_expiry_invalidates_write_token() {
        let f = fixture();
        let minted = f
            .issuer
            .mint_at(&Principal::new("alice"), Capability::Write, NOW)
            .await
            .unwrap();

        let key = format!("sfu:auth:jti:{}", minted.token_id.unwrap());
        f.store.force_expire(&key);

        let result = f.verifier.verify_at(&minted.token, true, NOW).await;
        assert_unauthorized(result, "not listed");
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let f = fixture();
        let token = sign(&read_claims());

        // Inside the skew window
        assert!(f.verifier.verify_at(&token, false, NOW + 904).await.is_ok());
        assert!(f.verifier.verify_at(&token, false, NOW + 905).await.is_ok());

        let result = f.verifier.verify_at(&token, false, NOW + 906).await;
        assert_unauthorized(result, "expired");
    }

    #[tokio::test]
    async fn test_missing_expiry_rejected() {
        let f = fixture();
        let token = sign(&Claims {
            exp: None,
            ..read_claims()
        });
        assert_unauthorized(f.verifier.verify_at(&token, false, NOW).await, "no expiry");
    }

    #[tokio::test]
    async fn test_not_before_respects_skew() {
        let f = fixture();
        let token = sign(&Claims {
            nbf: Some(NOW + 5),
            ..read_claims()
        });
        assert!(f.verifier.verify_at(&token, false, NOW).await.is_ok());

        let token = sign(&Claims {
            nbf: Some(NOW + 60),
            ..read_claims()
        });
        assert_unauthorized(f.verifier.verify_at(&token, false, NOW).await, "not yet valid");
    }

    #[tokio::test]
    async fn test_wrong_issuer_rejected() {
        let f = fixture();
        let token = sign(&Claims {
            iss: Some("someone-else".into()),
            ..read_claims()
        });
        assert_unauthorized(f.verifier.verify_at(&token, false, NOW).await, "issuer");
    }

    #[tokio::test]
    async fn test_unknown_capability_rejected() {
        let f = fixture();
        for capability in [Some("sfu:admin".to_string()), Some("read".to_string()), None] {
            let token = sign(&Claims {
                capability,
                ..read_claims()
            });
            assert_unauthorized(f.verifier.verify_at(&token, false, NOW).await, "token type");
        }
    }

    #[tokio::test]
    async fn test_empty_subject_rejected() {
        let f = fixture();
        let token = sign(&Claims {
            sub: Some(" ".into()),
            ..read_claims()
        });
        assert_unauthorized(f.verifier.verify_at(&token, false, NOW).await, "subject");
    }

    #[tokio::test]
    async fn test_token_id_iff_write() {
        let f = fixture();

        let write_without_id = sign(&Claims {
            capability: Some("sfu:write".into()),
            exp: Some(NOW + 30),
            ..read_claims()
        });
        assert_unauthorized(
            f.verifier.verify_at(&write_without_id, false, NOW).await,
            "no token id",
        );

        let read_with_id = sign(&Claims {
            jti: Some("abc".into()),
            ..read_claims()
        });
        assert_unauthorized(
            f.verifier.verify_at(&read_with_id, false, NOW).await,
            "must not carry",
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let f = fixture();
        let token = SigningKey::new(b"other-secret".to_vec())
            .sign(&read_claims())
            .unwrap();
        assert_unauthorized(f.verifier.verify_at(&token, false, NOW).await, "signature");
    }

    #[tokio::test]
    async fn test_marker_subject_mismatch_rejected() {
        let f = fixture();
        let marker = Marker {
            sub: "bob".into(),
            iss: "sfu-auth".into(),
            jti: "forged".into(),
            iat: NOW,
            exp: NOW + 30,
            netplay_username: None,
        };
        f.store.insert_raw(
            "sfu:auth:jti:forged",
            &serde_json::to_string(&marker).unwrap(),
            Duration::from_secs(30),
        );

        let token = sign(&Claims {
            capability: Some("sfu:write".into()),
            jti: Some("forged".into()),
            exp: Some(NOW + 30),
            ..read_claims()
        });
        assert_unauthorized(f.verifier.verify_at(&token, false, NOW).await, "marker");
    }

    #[tokio::test]
    async fn test_corrupt_marker_is_internal() {
        let f = fixture();
        f.store
            .insert_raw("sfu:auth:jti:broken", "not json", Duration::from_secs(30));

        let token = sign(&Claims {
            capability: Some("sfu:write".into()),
            jti: Some("broken".into()),
            exp: Some(NOW + 30),
            ..read_claims()
        });
        let result = f.verifier.verify_at(&token, false, NOW).await;
        assert!(matches!(result, Err(SfuError::Internal(_))));
    }

    #[test]
    fn test_extreme_time_claims() {
        let f = fixture();

        let far_future = sign(&Claims {
            exp: Some(i64::MAX),
            ..read_claims()
        });
        assert!(f.verifier.validate(&far_future, NOW).is_ok());
        assert!(f.verifier.validate(&far_future, i64::MAX).is_ok());

        let far_past = sign(&Claims {
            exp: Some(i64::MIN),
            ..read_claims()
        });
        assert_unauthorized(f.verifier.validate(&far_past, NOW), "expired");

        let not_before_end = sign(&Claims {
            nbf: Some(i64::MAX),
            ..read_claims()
        });
        assert_unauthorized(f.verifier.validate(&not_before_end, NOW), "not yet valid");

        // A clock at the end of time must not overflow on the skew either
        let open_window = sign(&Claims {
            nbf: Some(i64::MAX),
            exp: Some(i64::MAX),
            ..read_claims()
        });
        assert!(f.verifier.validate(&open_window, i64::MAX).is_ok());
    }
}
