//! Token minting

use crate::auth::claims::{unix_now, Capability, Claims, Marker};
use crate::auth::tokens::SigningKey;
use crate::config::SfuConfig;
use crate::error::SfuError;
use crate::session::Principal;
use crate::storage::KvStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Token type label returned to the caller
pub const TOKEN_TYPE: &str = "bearer";

/// Settings keys that have held the netplay display name, in priority order.
///
/// Older clients stored it in camelCase and/or under a `settings.` namespace.
pub const ALIAS_KEYS: [&str; 4] = [
    "netplay_username",
    "netplayUsername",
    "settings.netplayUsername",
    "settings.netplay_username",
];

/// First non-empty alias found under `ALIAS_KEYS`
pub fn resolve_alias(settings: &Map<String, Value>) -> Option<String> {
    ALIAS_KEYS
        .iter()
        .filter_map(|key| settings.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|alias| !alias.is_empty())
        .map(str::to_string)
}

/// Capability requested by a mint call; absent means `write`
pub fn parse_capability(requested: Option<&str>) -> Result<Capability, SfuError> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Capability::Write),
        Some(s) => Capability::parse(s).ok_or_else(|| {
            SfuError::InvalidRequest(format!("unknown token type '{}': expected read or write", s))
        }),
    }
}

/// A freshly minted token, ready to be handed to the relay tier
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub token_type: &'static str,
    pub capability: Capability,
    /// Lifetime in seconds
    pub expires: u64,
    /// Present for write tokens only
    pub token_id: Option<String>,
}

/// Mints tokens for authenticated principals
pub struct TokenIssuer {
    config: Arc<SfuConfig>,
    key: SigningKey,
    store: Arc<dyn KvStore>,
}

impl TokenIssuer {
    pub fn new(config: Arc<SfuConfig>, key: SigningKey, store: Arc<dyn KvStore>) -> Self {
        Self { config, key, store }
    }

    pub async fn mint(
        &self,
        principal: &Principal,
        capability: Capability,
    ) -> Result<MintedToken, SfuError> {
        self.mint_at(principal, capability, unix_now()).await
    }

    /// Mint with an explicit issue time
    pub async fn mint_at(
        &self,
        principal: &Principal,
        capability: Capability,
        now: i64,
    ) -> Result<MintedToken, SfuError> {
        let subject = principal.username.trim();
        if subject.is_empty() {
            return Err(SfuError::InvalidRequest("principal has no username".to_string()));
        }

        let ttl = match capability {
            Capability::Read => self.config.read_ttl,
            Capability::Write => self.config.write_ttl,
        }
        .as_secs();
        let exp = now + ttl as i64;

        let token_id = capability
            .is_single_use()
            .then(|| Uuid::new_v4().simple().to_string());

        let claims = Claims {
            sub: Some(subject.to_string()),
            iss: Some(self.config.issuer.clone()),
            capability: Some(capability.claim_value().to_string()),
            jti: token_id.clone(),
            iat: Some(now),
            exp: Some(exp),
            nbf: None,
        };

        let token = self
            .key
            .sign(&claims)
            .map_err(|e| SfuError::Internal(e.to_string()))?;

        // The marker must be durable before the token leaves this function
        if let Some(jti) = &token_id {
            let marker = Marker {
                sub: subject.to_string(),
                iss: self.config.issuer.clone(),
                jti: jti.clone(),
                iat: now,
                exp,
                netplay_username: resolve_alias(&principal.ui_settings),
            };
            let payload = serde_json::to_string(&marker)
                .map_err(|e| SfuError::Internal(e.to_string()))?;

            self.store
                .set_ex(&self.config.marker_key(jti), &payload, self.config.write_ttl)
                .await
                .map_err(|e| {
                    error!(subject = %subject, error = %e, "Failed to record token marker");
                    SfuError::from(e)
                })?;

            debug!(jti = %jti, has_alias = marker.netplay_username.is_some(), "Recorded token marker");
        }

        info!(subject = %subject, capability = %capability, ttl, "Minted token");

        Ok(MintedToken {
            token,
            token_type: TOKEN_TYPE,
            capability,
            expires: ttl,
            token_id,
        })
    }
}
