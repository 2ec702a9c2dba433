//! SFU auth - capability-scoped tokens and room registry for a media relay tier
//!
//! The primary application mints short-lived tokens for its users; relay
//! nodes verify them (write tokens exactly once) and publish room occupancy
//! to a TTL-backed registry. Both sides coordinate only through a shared
//! key-value store.

pub mod auth;
pub mod config;
pub mod error;
pub mod rooms;
pub mod server;
pub mod session;
pub mod storage;

pub use auth::{Capability, TokenIssuer, TokenVerifier, VerifiedToken};
pub use config::{RedisConfig, SfuConfig};
pub use error::SfuError;
pub use rooms::{RoomRecord, RoomRegistry, RoomSummary};
pub use server::{create_router, AppState};
pub use session::{Principal, SessionAuthenticator, StaticSessions};
pub use storage::{KvStore, MemoryStore, RedisStore};
