use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use lobby_db::filter::RoomFilter;
use lobby_db::models::RoomRow;
use lobby_types::api::{Claims, RoomRequest, RoomResponse};

use crate::channels::channel_response;
use crate::error::{ApiError, join_err};
use crate::middleware::MaybeUser;
use crate::{AppState, parse_timestamp, parse_user_id};

/// Raw query parameters of `GET /api/room/select`. Everything arrives as an
/// optional string; parsing and truthiness happen in [`ListQuery`].
#[derive(Debug, Default, Deserialize)]
pub struct RoomListParams {
    pub category: Option<String>,
    pub qty: Option<String>,
    pub by_user: Option<String>,
    #[serde(rename = "by_roomId")]
    pub by_room_id: Option<String>,
    pub with_num_members: Option<String>,
}

/// Normalized listing query: empty-string values count as absent, and the
/// boolean flags only fire on the literal `"true"`.
#[derive(Debug)]
struct ListQuery {
    category: Option<String>,
    qty: Option<String>,
    by_user: bool,
    room_id: Option<String>,
    with_num_members: bool,
}

impl ListQuery {
    fn from_params(params: RoomListParams) -> Self {
        ListQuery {
            category: non_empty(params.category),
            qty: non_empty(params.qty),
            by_user: params.by_user.as_deref() == Some("true"),
            room_id: non_empty(params.by_room_id),
            with_num_members: params.with_num_members.as_deref() == Some("true"),
        }
    }

    /// The historical auth gate, operator precedence intact: `by_user` trips
    /// it on its own, while `by_roomId` only matters for anonymous callers.
    /// TODO: decide whether authenticated `by_user` queries should pass; the
    /// deployed backend has always rejected them, so the membership filter
    /// below never runs in practice.
    fn rejects(&self, authenticated: bool) -> bool {
        self.by_user || (self.room_id.is_some() && !authenticated)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// GET /api/room/select — the filterable room listing.
///
/// Filters apply in a fixed order: category, membership, member-count
/// annotation, room id, then quantity truncation last.
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(params): Query<RoomListParams>,
    user: MaybeUser,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let query = ListQuery::from_params(params);

    if query.rejects(user.is_authenticated()) {
        return Err(ApiError::AuthenticationFailed);
    }

    let room_id = match &query.room_id {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ApiError::Validation(format!("Room id must be an integer, got \"{}\"", raw))
        })?),
        None => None,
    };
    let qty = match &query.qty {
        Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
            ApiError::Validation(format!("qty must be an integer, got \"{}\"", raw))
        })?),
        None => None,
    };

    let member_id = user
        .0
        .as_ref()
        .filter(|_| query.by_user)
        .map(|claims| claims.sub.to_string());
    let filter = RoomFilter::default()
        .category(query.category)
        .member(member_id)
        .with_member_count(query.with_num_members)
        .room_id(room_id);

    let db = state.clone();
    let mut rows = tokio::task::spawn_blocking(move || db.db.list_rooms(&filter))
        .await
        .map_err(join_err)??;

    if let Some(id) = room_id
        && rows.is_empty()
    {
        return Err(ApiError::Validation(format!("Room with id {} not found!", id)));
    }

    // Truncation is the last pipeline step, after the not-found check.
    if let Some(qty) = qty {
        rows.truncate(qty);
    }

    let rooms = serialize_rooms(&state, rows).await?;
    Ok(Json(rooms))
}

/// Attach each room's channel list in one batched query, then build the
/// response objects.
async fn serialize_rooms(state: &AppState, rows: Vec<RoomRow>) -> Result<Vec<RoomResponse>, ApiError> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let db = state.clone();
    let channel_rows = tokio::task::spawn_blocking(move || db.db.channels_for_rooms(&ids))
        .await
        .map_err(join_err)??;

    let mut by_room: HashMap<i64, Vec<_>> = HashMap::new();
    for row in channel_rows {
        by_room
            .entry(row.room_id)
            .or_default()
            .push(channel_response(row));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let channels = by_room.remove(&row.id).unwrap_or_default();
            room_response(row, channels)
        })
        .collect())
}

fn room_response(
    row: RoomRow,
    channels: Vec<lobby_types::api::ChannelResponse>,
) -> RoomResponse {
    let context = format!("room {}", row.id);
    RoomResponse {
        id: row.id,
        name: row.name,
        owner: parse_user_id(&row.owner_id, &context),
        category: row.category_id,
        description: row.description,
        created_at: parse_timestamp(&row.created_at, &context),
        num_members: row.num_members,
        channels,
    }
}

// -- Writes --

pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_category(&state, req.category).await?;

    let db = state.clone();
    let owner = claims.sub.to_string();
    let id = tokio::task::spawn_blocking(move || {
        db.db
            .create_room(&req.name, &owner, req.category, req.description.as_deref())
    })
    .await
    .map_err(join_err)??;

    let room = fetch_room(&state, id).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn update_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_category(&state, req.category).await?;

    let db = state.clone();
    let updated = tokio::task::spawn_blocking(move || {
        db.db
            .update_room(id, &req.name, req.category, req.description.as_deref())
    })
    .await
    .map_err(join_err)??;
    if !updated {
        return Err(room_not_found(id));
    }

    let room = fetch_room(&state, id).await?;
    Ok((StatusCode::OK, Json(room)))
}

/// Deleting a room cascades its channels away; their media files are removed
/// first so the cascade cannot orphan them.
pub async fn delete_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let paths = tokio::task::spawn_blocking(move || db.db.room_media_paths(id))
        .await
        .map_err(join_err)??;
    for path in &paths {
        state.media.delete(path).await?;
    }

    let db = state.clone();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_room(id))
        .await
        .map_err(join_err)??;
    if !deleted {
        return Err(room_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// -- Membership --

pub async fn join_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let room = tokio::task::spawn_blocking(move || db.db.get_room(id))
        .await
        .map_err(join_err)??;
    if room.is_none() {
        return Err(room_not_found(id));
    }

    let db = state.clone();
    let user_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || db.db.add_member(id, &user_id))
        .await
        .map_err(join_err)??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let room = tokio::task::spawn_blocking(move || db.db.get_room(id))
        .await
        .map_err(join_err)??;
    if room.is_none() {
        return Err(room_not_found(id));
    }

    let db = state.clone();
    let user_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || db.db.remove_member(id, &user_id))
        .await
        .map_err(join_err)??;
    Ok(StatusCode::NO_CONTENT)
}

// -- Helpers --

fn room_not_found(id: i64) -> ApiError {
    ApiError::Validation(format!("Room with id {} not found!", id))
}

async fn ensure_category(state: &AppState, category_id: i64) -> Result<(), ApiError> {
    let db = state.clone();
    let category = tokio::task::spawn_blocking(move || db.db.get_category(category_id))
        .await
        .map_err(join_err)??;
    if category.is_none() {
        return Err(ApiError::Validation(format!(
            "Category with id {} not found!",
            category_id
        )));
    }
    Ok(())
}

async fn fetch_room(state: &AppState, id: i64) -> Result<RoomResponse, ApiError> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_room(id))
        .await
        .map_err(join_err)??
        .ok_or_else(|| room_not_found(id))?;
    let mut rooms = serialize_rooms(state, vec![row]).await?;
    Ok(rooms.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStateInner;
    use lobby_db::Database;
    use lobby_media::MediaStore;
    use std::sync::Arc;
    use uuid::Uuid;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf()).await.unwrap();
        (Arc::new(AppStateInner { db, media }), dir)
    }

    fn user() -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            username: "tester".to_string(),
            exp: 0,
        }
    }

    fn list_params(pairs: &[(&str, &str)]) -> RoomListParams {
        let mut params = RoomListParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "category" => params.category = value,
                "qty" => params.qty = value,
                "by_user" => params.by_user = value,
                "by_roomId" => params.by_room_id = value,
                "with_num_members" => params.with_num_members = value,
                other => panic!("unknown param {other}"),
            }
        }
        params
    }

    async fn run_list(
        state: &AppState,
        pairs: &[(&str, &str)],
        user: Option<Claims>,
    ) -> Result<Vec<RoomResponse>, ApiError> {
        list_rooms(
            State(state.clone()),
            Query(list_params(pairs)),
            MaybeUser(user),
        )
        .await
        .map(|json| json.0)
    }

    #[test]
    fn empty_string_parameters_count_as_absent() {
        let query = ListQuery::from_params(list_params(&[
            ("category", ""),
            ("qty", ""),
            ("by_roomId", ""),
        ]));
        assert!(query.category.is_none());
        assert!(query.qty.is_none());
        assert!(query.room_id.is_none());
    }

    #[test]
    fn boolean_flags_require_the_literal_true() {
        let query = ListQuery::from_params(list_params(&[
            ("by_user", "True"),
            ("with_num_members", "1"),
        ]));
        assert!(!query.by_user);
        assert!(!query.with_num_members);
    }

    #[test]
    fn auth_gate_keeps_historical_precedence() {
        let by_user = ListQuery::from_params(list_params(&[("by_user", "true")]));
        // by_user trips the gate even for authenticated callers
        assert!(by_user.rejects(true));
        assert!(by_user.rejects(false));

        let by_id = ListQuery::from_params(list_params(&[("by_roomId", "1")]));
        assert!(by_id.rejects(false));
        assert!(!by_id.rejects(true));

        let neither = ListQuery::from_params(list_params(&[]));
        assert!(!neither.rejects(false));
    }

    #[tokio::test]
    async fn by_user_fails_before_any_data_access() {
        let (state, _dir) = test_state().await;
        let err = run_list(&state, &[("by_user", "true")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed));

        let err = run_list(&state, &[("by_user", "true")], Some(user()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn anonymous_room_id_lookup_is_rejected() {
        let (state, _dir) = test_state().await;
        let err = run_list(&state, &[("by_roomId", "1")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn unknown_room_id_names_the_id() {
        let (state, _dir) = test_state().await;
        let err = run_list(&state, &[("by_roomId", "99")], Some(user()))
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(msg) => assert_eq!(msg, "Room with id 99 not found!"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_room_id_is_a_distinct_error() {
        let (state, _dir) = test_state().await;
        let err = run_list(&state, &[("by_roomId", "abc")], Some(user()))
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(msg) => {
                assert!(msg.contains("integer"));
                assert!(msg.contains("abc"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn member_count_annotation_is_present_only_when_requested() {
        let (state, _dir) = test_state().await;
        let category = state.db.create_category("general", None).unwrap();
        let room = state
            .db
            .create_room("lounge", &Uuid::new_v4().to_string(), category, None)
            .unwrap();
        state.db.add_member(room, "user-a").unwrap();
        state.db.add_member(room, "user-b").unwrap();

        let rooms = run_list(&state, &[("with_num_members", "true")], None)
            .await
            .unwrap();
        assert_eq!(rooms[0].num_members, Some(2));
        let json = serde_json::to_value(&rooms[0]).unwrap();
        assert_eq!(json["num_members"], 2);

        let rooms = run_list(&state, &[], None).await.unwrap();
        assert_eq!(rooms[0].num_members, None);
        let json = serde_json::to_value(&rooms[0]).unwrap();
        assert!(json.get("num_members").is_none());
    }

    #[tokio::test]
    async fn category_filter_annotation_and_truncation_compose() {
        let (state, _dir) = test_state().await;
        let general = state.db.create_category("general", None).unwrap();
        let other = state.db.create_category("gaming", None).unwrap();
        let owner = Uuid::new_v4().to_string();

        for i in 0..5 {
            let room = state
                .db
                .create_room(&format!("general-{i}"), &owner, general, None)
                .unwrap();
            for j in 0..=i {
                state.db.add_member(room, &format!("user-{j}")).unwrap();
            }
        }
        state.db.create_room("arena", &owner, other, None).unwrap();

        let rooms = run_list(
            &state,
            &[
                ("category", "general"),
                ("with_num_members", "true"),
                ("qty", "2"),
            ],
            None,
        )
        .await
        .unwrap();

        assert_eq!(rooms.len(), 2);
        for room in &rooms {
            assert_eq!(room.category, general);
            assert!(room.num_members.is_some());
        }
        // rooms come back in id order, so truncation kept the first two
        assert_eq!(rooms[0].num_members, Some(1));
        assert_eq!(rooms[1].num_members, Some(2));
    }

    #[tokio::test]
    async fn qty_larger_than_the_match_count_returns_everything() {
        let (state, _dir) = test_state().await;
        let category = state.db.create_category("general", None).unwrap();
        state
            .db
            .create_room("only", &Uuid::new_v4().to_string(), category, None)
            .unwrap();

        let rooms = run_list(&state, &[("qty", "10")], None).await.unwrap();
        assert_eq!(rooms.len(), 1);
    }

    #[tokio::test]
    async fn listed_rooms_carry_their_channels() {
        let (state, _dir) = test_state().await;
        let category = state.db.create_category("general", None).unwrap();
        let owner = Uuid::new_v4().to_string();
        let room = state.db.create_room("lounge", &owner, category, None).unwrap();
        state.db.create_channel("intro", &owner, "hello", room).unwrap();
        state.db.create_channel("random", &owner, "anything", room).unwrap();

        let rooms = run_list(&state, &[], None).await.unwrap();
        assert_eq!(rooms[0].channels.len(), 2);
        assert_eq!(rooms[0].channels[0].name, "intro");
        assert_eq!(rooms[0].channels[0].room, room);
    }
}
