//! Room registry
//!
//! Relay nodes publish one record per room; each write replaces the whole
//! record and restarts its TTL. A room that is not refreshed in time
//! disappears on its own. There is no locking across operations: readers
//! may see a record that is about to be replaced or to expire.

use crate::auth::unix_now;
use crate::config::SfuConfig;
use crate::error::SfuError;
use crate::storage::KvStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A room as published by a relay node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    #[serde(default, alias = "roomName")]
    pub room_name: String,
    /// Current occupancy
    #[serde(default)]
    pub current: u32,
    /// Capacity
    #[serde(default)]
    pub max: u32,
    #[serde(rename = "hasPassword", alias = "has_password", default)]
    pub has_password: bool,
    /// Relay node that owns the room
    #[serde(rename = "nodeId", alias = "node_id", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Where clients connect to reach the room
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Set by the registry on every upsert (unix seconds)
    #[serde(rename = "lastUpdate", default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
}

/// Listing entry: a record without registry bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_name: String,
    pub current: u32,
    pub max: u32,
    #[serde(rename = "hasPassword")]
    pub has_password: bool,
    #[serde(rename = "nodeId", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<RoomRecord> for RoomSummary {
    fn from(record: RoomRecord) -> Self {
        Self {
            room_name: record.room_name,
            current: record.current,
            max: record.max,
            has_password: record.has_password,
            node_id: record.node_id,
            url: record.url,
        }
    }
}

fn room_name(raw: &str) -> Result<&str, SfuError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SfuError::InvalidRequest("room_name is required".to_string()));
    }
    Ok(name)
}

/// TTL-backed directory of rooms
pub struct RoomRegistry {
    config: Arc<SfuConfig>,
    store: Arc<dyn KvStore>,
}

impl RoomRegistry {
    pub fn new(config: Arc<SfuConfig>, store: Arc<dyn KvStore>) -> Self {
        Self { config, store }
    }

    /// Replace a room's record and restart its TTL
    pub async fn upsert(&self, mut record: RoomRecord) -> Result<RoomRecord, SfuError> {
        record.room_name = room_name(&record.room_name)?.to_string();
        record.last_update = Some(unix_now());

        let payload =
            serde_json::to_string(&record).map_err(|e| SfuError::Internal(e.to_string()))?;
        self.store
            .set_ex(
                &self.config.room_key(&record.room_name),
                &payload,
                self.config.room_ttl,
            )
            .await?;

        debug!(
            room = %record.room_name,
            current = record.current,
            max = record.max,
            node = ?record.node_id,
            "Room upserted"
        );
        Ok(record)
    }

    /// Remove a room; returns whether it existed
    pub async fn delete(&self, name: &str) -> Result<bool, SfuError> {
        let name = room_name(name)?;
        let removed = self.store.delete(&self.config.room_key(name)).await?;

        info!(room = %name, removed, "Room deleted");
        Ok(removed)
    }

    pub async fn resolve(&self, name: &str) -> Result<RoomRecord, SfuError> {
        let name = room_name(name)?;
        let key = self.config.room_key(name);

        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| SfuError::NotFound(format!("room '{}' not found", name)))?;

        let mut record: RoomRecord = serde_json::from_str(&raw)
            .map_err(|e| SfuError::Internal(format!("corrupt room record {}: {}", key, e)))?;
        if record.room_name.is_empty() {
            record.room_name = name.to_string();
        }
        Ok(record)
    }

    /// All live rooms, keyed by name.
    ///
    /// Records that fail to decode are skipped so one bad entry cannot hide
    /// the rest. Store errors still fail the whole call.
    pub async fn list(&self) -> Result<BTreeMap<String, RoomSummary>, SfuError> {
        let prefix = &self.config.room_prefix;
        let mut rooms = BTreeMap::new();
        let mut skipped = 0usize;
        let mut cursor = 0u64;

        loop {
            let page = self
                .store
                .scan(cursor, prefix, self.config.scan_batch)
                .await?;

            for key in page.keys {
                // Expired or deleted since the scan saw it
                let Some(raw) = self.store.get(&key).await? else {
                    continue;
                };

                let mut record: RoomRecord = match serde_json::from_str(&raw) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping undecodable room record");
                        skipped += 1;
                        continue;
                    }
                };

                if record.room_name.is_empty() {
                    record.room_name = key.strip_prefix(prefix.as_str()).unwrap_or(&key).to_string();
                }
                rooms.insert(record.room_name.clone(), RoomSummary::from(record));
            }

            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(rooms = rooms.len(), skipped, "Listed rooms");
        Ok(rooms)
    }
}
