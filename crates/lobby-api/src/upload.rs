use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};

use lobby_media::MediaStore;
use lobby_media::store::stale_path;

use crate::error::ApiError;

/// One file part of a multipart write request.
pub(crate) struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

pub(crate) async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(bad_part)
}

pub(crate) async fn read_file(field: Field<'_>) -> Result<UploadedFile, ApiError> {
    let filename = field
        .file_name()
        .map(str::to_owned)
        .ok_or_else(|| ApiError::Validation("Expected a file part".to_string()))?;
    let bytes = field.bytes().await.map_err(bad_part)?;
    Ok(UploadedFile { filename, bytes })
}

pub(crate) fn bad_part(err: MultipartError) -> ApiError {
    ApiError::Validation(format!("Malformed multipart body: {}", err))
}

pub(crate) fn require<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Validation(format!("{} is required", field)))
}

/// The two-step media swap of a full-record save: delete the stale file (if
/// the incoming reference differs from the stored one), then write the new
/// bytes. Runs before the row commit so a replaced file never outlives the
/// reference to it.
pub(crate) async fn swap_media_file(
    media: &MediaStore,
    existing: Option<&str>,
    incoming: Option<&str>,
    bytes: Option<&[u8]>,
) -> Result<(), ApiError> {
    if let Some(old) = stale_path(existing, incoming) {
        media.delete(&old).await.map_err(ApiError::Internal)?;
    }
    if let (Some(rel), Some(bytes)) = (incoming, bytes) {
        media.save(rel, bytes).await.map_err(ApiError::Internal)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn swap_replaces_a_differing_file() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf()).await.unwrap();
        media.save("category/1/category_icon/old.gif", b"old").await.unwrap();

        swap_media_file(
            &media,
            Some("category/1/category_icon/old.gif"),
            Some("category/1/category_icon/new.gif"),
            Some(b"new".as_slice()),
        )
        .await
        .unwrap();

        assert!(!media.exists("category/1/category_icon/old.gif").await);
        assert!(media.exists("category/1/category_icon/new.gif").await);
    }

    #[tokio::test]
    async fn swap_with_the_same_path_just_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf()).await.unwrap();
        media.save("category/1/category_icon/a.gif", b"v1").await.unwrap();

        swap_media_file(
            &media,
            Some("category/1/category_icon/a.gif"),
            Some("category/1/category_icon/a.gif"),
            Some(b"v2".as_slice()),
        )
        .await
        .unwrap();

        assert!(media.exists("category/1/category_icon/a.gif").await);
        let stored = tokio::fs::read(media.absolute("category/1/category_icon/a.gif"))
            .await
            .unwrap();
        assert_eq!(stored, b"v2");
    }

    #[tokio::test]
    async fn swap_without_an_upload_keeps_the_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf()).await.unwrap();
        media.save("room/1/room_icon/keep.gif", b"keep").await.unwrap();

        swap_media_file(&media, Some("room/1/room_icon/keep.gif"), None, None)
            .await
            .unwrap();

        assert!(media.exists("room/1/room_icon/keep.gif").await);
    }
}
