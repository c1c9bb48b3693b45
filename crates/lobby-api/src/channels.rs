use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use lobby_db::models::ChannelRow;
use lobby_media::store::{channel_banner_path, channel_icon_path};
use lobby_media::validate::{validate_icon_dimensions, validate_image_file_extension};
use lobby_types::api::{ChannelResponse, Claims};

use crate::error::{ApiError, join_err};
use crate::upload::{UploadedFile, bad_part, read_file, read_text, require, swap_media_file};
use crate::{AppState, parse_timestamp, parse_user_id};

/// Multipart form for creating or fully re-saving a channel.
#[derive(Default)]
struct ChannelForm {
    name: Option<String>,
    topic: Option<String>,
    room: Option<String>,
    icon: Option<UploadedFile>,
    banner: Option<UploadedFile>,
}

async fn read_channel_form(mut multipart: Multipart) -> Result<ChannelForm, ApiError> {
    let mut form = ChannelForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("name") => form.name = Some(read_text(field).await?),
            Some("topic") => form.topic = Some(read_text(field).await?),
            Some("room") => form.room = Some(read_text(field).await?),
            Some("icon") => form.icon = Some(read_file(field).await?),
            Some("banner") => form.banner = Some(read_file(field).await?),
            _ => {}
        }
    }
    Ok(form)
}

/// Icons are checked for dimensions before extension; banners only for
/// extension.
fn validate_media(form: &ChannelForm) -> Result<(), ApiError> {
    if let Some(icon) = &form.icon {
        validate_icon_dimensions(&icon.bytes)?;
        validate_image_file_extension(&icon.filename)?;
    }
    if let Some(banner) = &form.banner {
        validate_image_file_extension(&banner.filename)?;
    }
    Ok(())
}

fn parse_room_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::Validation(format!("Room id must be an integer, got \"{}\"", raw)))
}

/// POST /api/channel
pub async fn create_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_channel_form(multipart).await?;
    validate_media(&form)?;
    let name = require(form.name, "name")?;
    let topic = require(form.topic, "topic")?;
    let room_id = parse_room_id(&require(form.room, "room")?)?;

    ensure_room(&state, room_id).await?;

    let db = state.clone();
    let owner = claims.sub.to_string();
    let id = tokio::task::spawn_blocking(move || {
        db.db.create_channel(&name, &owner, &topic, room_id)
    })
    .await
    .map_err(join_err)??;

    // Storage paths are keyed by the channel id, so the files land after the
    // row insert.
    let mut icon = None;
    if let Some(upload) = &form.icon {
        let rel = channel_icon_path(id, &upload.filename);
        state
            .media
            .save(&rel, &upload.bytes)
            .await
            .map_err(ApiError::Internal)?;
        icon = Some(rel);
    }
    let mut banner = None;
    if let Some(upload) = &form.banner {
        let rel = channel_banner_path(id, &upload.filename);
        state
            .media
            .save(&rel, &upload.bytes)
            .await
            .map_err(ApiError::Internal)?;
        banner = Some(rel);
    }
    if icon.is_some() || banner.is_some() {
        let db = state.clone();
        let (icon_col, banner_col) = (icon.clone(), banner.clone());
        tokio::task::spawn_blocking(move || {
            db.db
                .set_channel_media(id, icon_col.as_deref(), banner_col.as_deref())
        })
        .await
        .map_err(join_err)??;
    }

    let channel = fetch_channel(&state, id).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// PUT /api/channel/{id} — full-record save; icon and banner are compared
/// and cleaned up independently.
pub async fn update_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_channel_form(multipart).await?;
    validate_media(&form)?;
    let name = require(form.name, "name")?;
    let topic = require(form.topic, "topic")?;
    let room_id = parse_room_id(&require(form.room, "room")?)?;

    let db = state.clone();
    let existing = tokio::task::spawn_blocking(move || db.db.get_channel(id))
        .await
        .map_err(join_err)??
        .ok_or_else(|| channel_not_found(id))?;
    ensure_room(&state, room_id).await?;

    let incoming_icon = form
        .icon
        .as_ref()
        .map(|upload| channel_icon_path(id, &upload.filename));
    swap_media_file(
        &state.media,
        existing.icon.as_deref(),
        incoming_icon.as_deref(),
        form.icon.as_ref().map(|upload| upload.bytes.as_ref()),
    )
    .await?;

    let incoming_banner = form
        .banner
        .as_ref()
        .map(|upload| channel_banner_path(id, &upload.filename));
    swap_media_file(
        &state.media,
        existing.banner.as_deref(),
        incoming_banner.as_deref(),
        form.banner.as_ref().map(|upload| upload.bytes.as_ref()),
    )
    .await?;

    let icon = incoming_icon.or(existing.icon);
    let banner = incoming_banner.or(existing.banner);
    let db = state.clone();
    let updated = tokio::task::spawn_blocking(move || {
        db.db
            .update_channel(id, &name, &topic, room_id, icon.as_deref(), banner.as_deref())
    })
    .await
    .map_err(join_err)??;
    if !updated {
        return Err(channel_not_found(id));
    }

    let channel = fetch_channel(&state, id).await?;
    Ok((StatusCode::OK, Json(channel)))
}

/// DELETE /api/channel/{id} — every stored media field is removed from
/// storage before the row goes.
pub async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let existing = tokio::task::spawn_blocking(move || db.db.get_channel(id))
        .await
        .map_err(join_err)??
        .ok_or_else(|| channel_not_found(id))?;

    for path in [&existing.icon, &existing.banner].into_iter().flatten() {
        state.media.delete(path).await.map_err(ApiError::Internal)?;
    }

    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.delete_channel(id))
        .await
        .map_err(join_err)??;
    Ok(StatusCode::NO_CONTENT)
}

fn channel_not_found(id: i64) -> ApiError {
    ApiError::Validation(format!("Channel with id {} not found!", id))
}

async fn ensure_room(state: &AppState, room_id: i64) -> Result<(), ApiError> {
    let db = state.clone();
    let room = tokio::task::spawn_blocking(move || db.db.get_room(room_id))
        .await
        .map_err(join_err)??;
    if room.is_none() {
        return Err(ApiError::Validation(format!(
            "Room with id {} not found!",
            room_id
        )));
    }
    Ok(())
}

async fn fetch_channel(state: &AppState, id: i64) -> Result<ChannelResponse, ApiError> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_channel(id))
        .await
        .map_err(join_err)??
        .ok_or_else(|| channel_not_found(id))?;
    Ok(channel_response(row))
}

pub(crate) fn channel_response(row: ChannelRow) -> ChannelResponse {
    let context = format!("channel {}", row.id);
    ChannelResponse {
        id: row.id,
        name: row.name,
        owner: parse_user_id(&row.owner_id, &context),
        topic: row.topic,
        room: row.room_id,
        banner: row.banner,
        icon: row.icon,
        created_at: parse_timestamp(&row.created_at, &context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStateInner;
    use axum::body::Bytes;
    use lobby_db::Database;
    use lobby_media::MediaStore;
    use std::io::Cursor;
    use std::sync::Arc;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf()).await.unwrap();
        (Arc::new(AppStateInner { db, media }), dir)
    }

    fn png_upload(filename: &str, width: u32, height: u32) -> UploadedFile {
        let img = image::RgbaImage::new(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        UploadedFile {
            filename: filename.to_string(),
            bytes: Bytes::from(buf.into_inner()),
        }
    }

    #[test]
    fn oversized_icon_fails_validation_with_its_dimensions() {
        let form = ChannelForm {
            icon: Some(png_upload("big.gif", 71, 70)),
            ..Default::default()
        };
        match validate_media(&form).unwrap_err() {
            ApiError::Validation(msg) => {
                assert!(msg.contains("70x70"));
                assert!(msg.contains("(71, 70)"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn icon_dimensions_are_checked_before_the_extension() {
        // dimensions are fine, so the extension quirk rejects the .png name
        let form = ChannelForm {
            icon: Some(png_upload("logo.png", 70, 70)),
            ..Default::default()
        };
        match validate_media(&form).unwrap_err() {
            ApiError::Validation(msg) => assert_eq!(msg, "Unsupported file extension"),
            other => panic!("expected validation error, got {other:?}"),
        }

        // oversized AND badly named: the dimension error wins
        let form = ChannelForm {
            icon: Some(png_upload("big.png", 71, 71)),
            ..Default::default()
        };
        match validate_media(&form).unwrap_err() {
            ApiError::Validation(msg) => assert!(msg.contains("70x70")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn banner_only_needs_a_valid_extension() {
        // banners skip the dimension check entirely
        let form = ChannelForm {
            banner: Some(png_upload("wide.gif", 500, 200)),
            ..Default::default()
        };
        assert!(validate_media(&form).is_ok());

        let form = ChannelForm {
            banner: Some(png_upload("wide.bmp", 500, 200)),
            ..Default::default()
        };
        assert!(validate_media(&form).is_err());
    }

    #[tokio::test]
    async fn replacing_the_icon_leaves_the_banner_alone() {
        let (state, _dir) = test_state().await;
        let category = state.db.create_category("general", None).unwrap();
        let room = state.db.create_room("lounge", "u", category, None).unwrap();
        let id = state.db.create_channel("intro", "u", "hi", room).unwrap();

        let old_icon = channel_icon_path(id, "old.gif");
        let banner = channel_banner_path(id, "banner.gif");
        state.media.save(&old_icon, b"icon").await.unwrap();
        state.media.save(&banner, b"banner").await.unwrap();
        state
            .db
            .set_channel_media(id, Some(old_icon.as_str()), Some(banner.as_str()))
            .unwrap();

        let new_icon = channel_icon_path(id, "new.gif");
        swap_media_file(
            &state.media,
            Some(old_icon.as_str()),
            Some(new_icon.as_str()),
            Some(b"v2".as_slice()),
        )
            .await
            .unwrap();
        state
            .db
            .set_channel_media(id, Some(new_icon.as_str()), Some(banner.as_str()))
            .unwrap();

        assert!(!state.media.exists(&old_icon).await);
        assert!(state.media.exists(&new_icon).await);
        assert!(state.media.exists(&banner).await);
    }

    #[tokio::test]
    async fn deleting_a_channel_removes_both_media_files() {
        let (state, _dir) = test_state().await;
        let category = state.db.create_category("general", None).unwrap();
        let room = state.db.create_room("lounge", "u", category, None).unwrap();
        let id = state.db.create_channel("intro", "u", "hi", room).unwrap();

        let icon = channel_icon_path(id, "icon.gif");
        let banner = channel_banner_path(id, "banner.gif");
        state.media.save(&icon, b"icon").await.unwrap();
        state.media.save(&banner, b"banner").await.unwrap();
        state
            .db
            .set_channel_media(id, Some(icon.as_str()), Some(banner.as_str()))
            .unwrap();

        let status = delete_channel(State(state.clone()), Path(id)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!state.media.exists(&icon).await);
        assert!(!state.media.exists(&banner).await);
        assert!(state.db.get_channel(id).unwrap().is_none());
    }
}
