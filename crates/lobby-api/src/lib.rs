pub mod categories;
pub mod channels;
pub mod docs;
pub mod error;
pub mod middleware;
pub mod rooms;
mod upload;

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use lobby_db::Database;
use lobby_media::MediaStore;
use tracing::warn;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub media: MediaStore,
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC when the RFC 3339 form doesn't match.
pub(crate) fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

pub(crate) fn parse_user_id(raw: &str, context: &str) -> uuid::Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt owner id '{}' on {}: {}", raw, context, e);
        uuid::Uuid::default()
    })
}
