//! Request handlers

use crate::auth::parse_capability;
use crate::error::SfuError;
use crate::rooms::{RoomRecord, RoomSummary};
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
pub struct MintRequest {
    /// `read` or `write`; absent means `write`
    #[serde(default, alias = "tokenType", alias = "capability")]
    pub token_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MintResponse {
    pub token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires: u64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
    #[serde(default)]
    pub consume: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netplay_username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRoomRequest {
    #[serde(alias = "roomName")]
    pub room_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    #[serde(default, alias = "room_name")]
    pub room: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// POST /api/sfu/token
pub async fn mint_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MintResponse>, SfuError> {
    let credential = bearer(&headers).ok_or(SfuError::Unauthenticated)?;
    let principal = state
        .sessions
        .authenticate(credential)
        .await?
        .ok_or(SfuError::Unauthenticated)?;

    // An empty body keeps older clients working
    let request: MintRequest = if body.iter().all(u8::is_ascii_whitespace) {
        MintRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| SfuError::InvalidRequest(format!("invalid request body: {}", e)))?
    };
    let capability = parse_capability(request.token_type.as_deref())?;

    let minted = state.issuer()?.mint(&principal, capability).await?;

    Ok(Json(MintResponse {
        token: minted.token,
        token_type: minted.token_type.to_string(),
        expires: minted.expires,
    }))
}

/// POST /api/sfu/internal/verify
pub async fn verify_token(
    State(state): State<AppState>,
    request: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, SfuError> {
    let Json(request) = request?;
    if request.token.trim().is_empty() {
        return Err(SfuError::InvalidRequest("token is required".to_string()));
    }

    let verified = state
        .verifier()?
        .verify(&request.token, request.consume)
        .await?;

    Ok(Json(VerifyResponse {
        sub: verified.subject,
        netplay_username: verified.alias,
    }))
}

/// POST /api/sfu/internal/rooms/upsert
pub async fn upsert_room(
    State(state): State<AppState>,
    record: Result<Json<RoomRecord>, JsonRejection>,
) -> Result<Json<OkResponse>, SfuError> {
    let Json(record) = record?;
    state.rooms.upsert(record).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// POST /api/sfu/internal/rooms/delete
pub async fn delete_room(
    State(state): State<AppState>,
    request: Result<Json<DeleteRoomRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, SfuError> {
    let Json(request) = request?;
    state.rooms.delete(&request.room_name).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// GET /api/sfu/internal/rooms/resolve?room=<name>
pub async fn resolve_room(
    State(state): State<AppState>,
    query: Result<Query<ResolveQuery>, QueryRejection>,
) -> Result<Json<RoomRecord>, SfuError> {
    let Query(query) = query?;
    let name = query
        .room
        .ok_or_else(|| SfuError::InvalidRequest("room is required".to_string()))?;
    Ok(Json(state.rooms.resolve(&name).await?))
}

/// GET /api/sfu/internal/rooms/list
pub async fn list_rooms(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, RoomSummary>>, SfuError> {
    Ok(Json(state.rooms.list().await?))
}
