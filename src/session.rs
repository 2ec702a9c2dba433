//! End-user sessions
//!
//! The primary application's session system is external; this module only
//! defines the seam it plugs into and a static implementation for local
//! deployments and tests.

use crate::error::SfuError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use subtle::ConstantTimeEq;

/// An already-authenticated user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    /// Free-form per-user UI preferences
    #[serde(default)]
    pub ui_settings: Map<String, Value>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ui_settings: Map::new(),
        }
    }

    pub fn with_settings(mut self, ui_settings: Map<String, Value>) -> Self {
        self.ui_settings = ui_settings;
        self
    }
}

/// Resolves a bearer credential to a principal
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    /// `None` if the credential does not belong to a live session
    async fn authenticate(&self, bearer: &str) -> Result<Option<Principal>, SfuError>;
}

/// Fixed bearer → principal table
#[derive(Debug, Clone, Default)]
pub struct StaticSessions {
    sessions: HashMap<String, Principal>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bearer: impl Into<String>, principal: Principal) {
        self.sessions.insert(bearer.into(), principal);
    }

    /// Load from a JSON object mapping bearer credential to principal
    pub fn from_json(json: &str) -> Result<Self, SfuError> {
        let sessions: HashMap<String, Principal> = serde_json::from_str(json)
            .map_err(|e| SfuError::InvalidRequest(format!("invalid sessions file: {}", e)))?;
        Ok(Self { sessions })
    }

    pub fn from_file(path: &Path) -> Result<Self, SfuError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SfuError::InvalidRequest(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionAuthenticator for StaticSessions {
    async fn authenticate(&self, bearer: &str) -> Result<Option<Principal>, SfuError> {
        let found = self
            .sessions
            .iter()
            .find(|(credential, _)| bool::from(credential.as_bytes().ct_eq(bearer.as_bytes())))
            .map(|(_, principal)| principal.clone());
        Ok(found)
    }
}
