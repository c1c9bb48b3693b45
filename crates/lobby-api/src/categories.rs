use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use lobby_db::models::CategoryRow;
use lobby_media::store::category_icon_path;
use lobby_types::api::CategoryResponse;

use crate::error::{ApiError, join_err};
use crate::upload::{UploadedFile, bad_part, read_file, read_text, require, swap_media_file};
use crate::{AppState, parse_timestamp};

/// Multipart form for creating or fully re-saving a category. The icon is a
/// plain stored file; it carries no validators.
#[derive(Default)]
struct CategoryForm {
    name: Option<String>,
    description: Option<String>,
    icon: Option<UploadedFile>,
}

async fn read_category_form(mut multipart: Multipart) -> Result<CategoryForm, ApiError> {
    let mut form = CategoryForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("name") => form.name = Some(read_text(field).await?),
            Some("description") => form.description = Some(read_text(field).await?),
            Some("icon") => form.icon = Some(read_file(field).await?),
            _ => {}
        }
    }
    Ok(form)
}

/// POST /api/category
pub async fn create_category(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_category_form(multipart).await?;
    let name = require(form.name, "name")?;

    let db = state.clone();
    let description = form.description.clone();
    let id =
        tokio::task::spawn_blocking(move || db.db.create_category(&name, description.as_deref()))
            .await
            .map_err(join_err)??;

    // The storage path is keyed by the id, so the file lands after the row.
    if let Some(upload) = &form.icon {
        let rel = category_icon_path(id, &upload.filename);
        state
            .media
            .save(&rel, &upload.bytes)
            .await
            .map_err(ApiError::Internal)?;

        let db = state.clone();
        let icon = rel.clone();
        tokio::task::spawn_blocking(move || db.db.set_category_icon(id, Some(icon.as_str())))
            .await
            .map_err(join_err)??;
    }

    let category = fetch_category(&state, id).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/category/{id} — full-record save. A supplied icon replaces the
/// stored one (deleting the old file when the path differs); an omitted icon
/// part leaves it untouched.
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_category_form(multipart).await?;
    let name = require(form.name, "name")?;

    let db = state.clone();
    let existing = tokio::task::spawn_blocking(move || db.db.get_category(id))
        .await
        .map_err(join_err)??
        .ok_or_else(|| category_not_found(id))?;

    let incoming = form
        .icon
        .as_ref()
        .map(|upload| category_icon_path(id, &upload.filename));
    swap_media_file(
        &state.media,
        existing.icon.as_deref(),
        incoming.as_deref(),
        form.icon.as_ref().map(|upload| upload.bytes.as_ref()),
    )
    .await?;

    let icon = incoming.or(existing.icon);
    let db = state.clone();
    let description = form.description.clone();
    tokio::task::spawn_blocking(move || {
        db.db
            .update_category(id, &name, description.as_deref(), icon.as_deref())
    })
    .await
    .map_err(join_err)??;

    let category = fetch_category(&state, id).await?;
    Ok((StatusCode::OK, Json(category)))
}

/// DELETE /api/category/{id} — removes the category icon and the media of
/// every channel the cascade is about to take down, then the row itself.
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let paths = tokio::task::spawn_blocking(move || db.db.category_media_paths(id))
        .await
        .map_err(join_err)??;
    for path in &paths {
        state.media.delete(path).await.map_err(ApiError::Internal)?;
    }

    let db = state.clone();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_category(id))
        .await
        .map_err(join_err)??;
    if !deleted {
        return Err(category_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn category_not_found(id: i64) -> ApiError {
    ApiError::Validation(format!("Category with id {} not found!", id))
}

async fn fetch_category(state: &AppState, id: i64) -> Result<CategoryResponse, ApiError> {
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_category(id))
        .await
        .map_err(join_err)??
        .ok_or_else(|| category_not_found(id))?;
    Ok(category_response(row))
}

pub(crate) fn category_response(row: CategoryRow) -> CategoryResponse {
    let context = format!("category {}", row.id);
    CategoryResponse {
        id: row.id,
        name: row.name,
        description: row.description,
        icon: row.icon,
        created_at: parse_timestamp(&row.created_at, &context),
    }
}
