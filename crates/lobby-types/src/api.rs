use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the optional-auth
/// extractor. Canonical definition lives here in lobby-types to eliminate
/// duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Rooms --

/// Payload for creating or fully re-saving a room. The owner is always the
/// authenticated caller and is never taken from the body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomRequest {
    pub name: String,
    pub category: i64,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: i64,
    pub name: String,
    pub owner: Uuid,
    pub category: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Only populated when the caller asked for the member-count annotation;
    /// the field is dropped from the JSON entirely otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_members: Option<i64>,
    pub channels: Vec<ChannelResponse>,
}

// -- Channels --

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub id: i64,
    pub name: String,
    pub owner: Uuid,
    pub topic: String,
    pub room: i64,
    pub banner: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Categories --

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}
