use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// On-disk media storage.
///
/// Records hold relative paths like `category/3/category_icon/logo.gif`; the
/// store resolves them under its root. One path per entity field at a time —
/// replacing a file means deleting the old path and saving the new one.
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).await?;
        info!("Media storage directory: {}", root.display());
        Ok(Self { root })
    }

    /// Absolute filesystem path for a stored relative path.
    pub fn absolute(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub async fn save(&self, rel: &str, bytes: &[u8]) -> Result<()> {
        let path = self.absolute(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    /// Delete a stored file. A path that is already gone is tolerated — the
    /// record mutation it accompanies must still go through.
    pub async fn delete(&self, rel: &str) -> Result<()> {
        let path = self.absolute(rel);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted media file {}", rel);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media file {} already gone", rel);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, rel: &str) -> bool {
        fs::try_exists(self.absolute(rel)).await.unwrap_or(false)
    }
}

/// The stored path to delete when a record save replaces a media reference:
/// the old path, but only if a new one is coming in and it differs.
pub fn stale_path(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    match (existing, incoming) {
        (Some(old), Some(new)) if old != new => Some(old.to_string()),
        _ => None,
    }
}

pub fn category_icon_path(category_id: i64, filename: &str) -> String {
    format!("category/{}/category_icon/{}", category_id, leaf(filename))
}

pub fn channel_icon_path(channel_id: i64, filename: &str) -> String {
    format!("room/{}/room_icon/{}", channel_id, leaf(filename))
}

pub fn channel_banner_path(channel_id: i64, filename: &str) -> String {
    format!("room/{}/room_banner/{}", channel_id, leaf(filename))
}

/// Strip any client-supplied directory components from an upload filename.
fn leaf(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_unique_per_entity_and_field() {
        assert_eq!(
            category_icon_path(3, "logo.gif"),
            "category/3/category_icon/logo.gif"
        );
        assert_eq!(channel_icon_path(5, "a.gif"), "room/5/room_icon/a.gif");
        assert_eq!(channel_banner_path(5, "a.gif"), "room/5/room_banner/a.gif");
        assert_ne!(channel_icon_path(5, "a.gif"), channel_banner_path(5, "a.gif"));
    }

    #[test]
    fn upload_filenames_cannot_escape_the_store() {
        assert_eq!(
            category_icon_path(1, "../../etc/passwd"),
            "category/1/category_icon/passwd"
        );
        assert_eq!(channel_icon_path(1, ".."), "room/1/room_icon/upload");
    }

    #[test]
    fn stale_path_only_fires_on_a_differing_replacement() {
        assert_eq!(
            stale_path(Some("a/old.gif"), Some("a/new.gif")),
            Some("a/old.gif".to_string())
        );
        assert_eq!(stale_path(Some("a/old.gif"), Some("a/old.gif")), None);
        assert_eq!(stale_path(Some("a/old.gif"), None), None);
        assert_eq!(stale_path(None, Some("a/new.gif")), None);
    }

    #[tokio::test]
    async fn save_and_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf()).await.unwrap();

        let rel = category_icon_path(1, "logo.gif");
        store.save(&rel, b"gifdata").await.unwrap();
        assert!(store.exists(&rel).await);

        store.delete(&rel).await.unwrap();
        assert!(!store.exists(&rel).await);

        // deleting an already-missing file is not an error
        store.delete(&rel).await.unwrap();
    }
}
