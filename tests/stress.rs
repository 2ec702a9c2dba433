//! Stress tests at volume
//!
//! Large registries and many outstanding write tokens must keep their
//! correctness guarantees: every room listed once, every token consumed once.

use sfu_auth::auth::{Capability, SigningKey, TokenIssuer, TokenVerifier};
use sfu_auth::rooms::{RoomRecord, RoomRegistry};
use sfu_auth::session::Principal;
use sfu_auth::storage::MemoryStore;
use sfu_auth::SfuConfig;
use std::sync::Arc;
use std::time::Instant;

/// Listing must visit every room exactly once regardless of batch boundaries
#[tokio::test]
async fn test_listing_many_rooms() {
    let room_counts = [100, 1_000, 5_000];

    for &count in &room_counts {
        let store = Arc::new(MemoryStore::new());
        let registry = RoomRegistry::new(Arc::new(SfuConfig::default()), store);

        for i in 0..count {
            registry
                .upsert(RoomRecord {
                    room_name: format!("room-{:05}", i),
                    current: (i % 4) as u32,
                    max: 4,
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let start = Instant::now();
        let rooms = registry.list().await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(rooms.len(), count);
        assert!(rooms.contains_key("room-00000"));
        assert!(rooms.contains_key(&format!("room-{:05}", count - 1)));

        println!("Rooms: {:>5}, List time: {:?}", count, elapsed);
    }
}

/// Many outstanding markers: each token still consumes exactly once
#[tokio::test]
async fn test_many_outstanding_write_tokens() {
    let count = 2_000;
    let config = Arc::new(SfuConfig::default());
    let key = SigningKey::new("stress-signing-secret");
    let store = Arc::new(MemoryStore::new());
    let issuer = TokenIssuer::new(config.clone(), key.clone(), store.clone());
    let verifier = TokenVerifier::new(config, key, store.clone());

    let mut tokens = Vec::with_capacity(count);
    for i in 0..count {
        let minted = issuer
            .mint(&Principal::new(format!("user-{}", i)), Capability::Write)
            .await
            .unwrap();
        tokens.push(minted.token);
    }
    assert_eq!(store.len(), count);

    let start = Instant::now();
    for (i, token) in tokens.iter().enumerate() {
        let verified = verifier.verify(token, true).await.unwrap();
        assert_eq!(verified.subject, format!("user-{}", i));
    }
    println!("Consumed {} tokens in {:?}", count, start.elapsed());

    assert!(store.is_empty());
    for token in tokens.iter().take(50) {
        assert!(verifier.verify(token, true).await.is_err());
    }
}
