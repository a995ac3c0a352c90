//! Media source abstraction
//!
//! The engine never talks to a photo library directly: it consumes a
//! [`MediaSource`] (item listing + content loading) and, optionally, a
//! [`LibraryOps`] capability for favorite-marking and permanent deletion.
//! [`FsMediaSource`] is the provided reference implementation scanning a
//! directory tree.

use crate::cache::LoadPriority;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File extensions treated as media items by the filesystem source
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "heif", "webp", "bmp", "tif", "tiff",
];

/// One listed item: identity plus creation timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    /// Stable identifier, unique within the source
    pub id: String,
    /// Creation timestamp used for default ordering
    pub created_at: DateTime<Utc>,
}

/// Loaded displayable content for one item
#[derive(Debug, Clone)]
pub struct MediaContent {
    /// Item this content belongs to
    pub id: String,
    /// Encoded content bytes
    pub bytes: Vec<u8>,
}

impl MediaContent {
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Provider of triageable items
///
/// Implementations may be slow (network, cold storage); the predictive cache
/// keeps those costs off the interactive path.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// List every item, newest first
    async fn list_items(&self) -> Result<Vec<SourceItem>>;

    /// Load displayable content for one item
    ///
    /// `target_size` is a long-edge pixel hint; providers that cannot scale
    /// return the content as stored. The priority describes why the load was
    /// requested and may inform provider-side scheduling.
    async fn load_content(
        &self,
        id: &str,
        target_size: u32,
        priority: LoadPriority,
    ) -> Result<MediaContent>;
}

/// Optional library-side operations
///
/// Engine invariants never depend on these succeeding; failures are logged
/// and the session continues.
#[async_trait]
pub trait LibraryOps: Send + Sync {
    /// Toggle the favorite flag for an item, returning the new state
    async fn mark_favorite(&self, id: &str) -> Result<bool>;

    /// Permanently delete items from the library, returning how many were
    /// actually removed
    async fn permanently_delete(&self, ids: &[String]) -> Result<usize>;
}

/// No-op library capability for sources without one
pub struct NullLibraryOps;

#[async_trait]
impl LibraryOps for NullLibraryOps {
    async fn mark_favorite(&self, id: &str) -> Result<bool> {
        debug!("No library backing; favorite for '{}' ignored", id);
        Ok(false)
    }

    async fn permanently_delete(&self, ids: &[String]) -> Result<usize> {
        debug!("No library backing; permanent delete of {} items ignored", ids.len());
        Ok(0)
    }
}

/// Filesystem-backed media source
///
/// Items are image files under a root directory. Ids are root-relative
/// paths; creation timestamps come from file modification time. Listing
/// order is newest first with the id as a deterministic tie-break.
pub struct FsMediaSource {
    root: PathBuf,
}

impl FsMediaSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_image_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let lower = ext.to_ascii_lowercase();
                IMAGE_EXTENSIONS.contains(&lower.as_str())
            })
            .unwrap_or(false)
    }

    /// Reject ids that would resolve outside the root
    fn checked_path(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(Error::InvalidInput(format!("id escapes source root: '{}'", id)));
        }
        Ok(self.root.join(relative))
    }

    fn scan(root: &Path) -> Vec<SourceItem> {
        let mut items = Vec::new();
        for entry in walkdir::WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !Self::is_image_file(entry.path()) {
                continue;
            }

            let id = match entry.path().strip_prefix(root) {
                Ok(relative) => relative.to_string_lossy().into_owned(),
                Err(_) => continue,
            };
            let created_at = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(Utc::now);

            items.push(SourceItem { id, created_at });
        }

        // Newest first, stable across rescans
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }
}

#[async_trait]
impl MediaSource for FsMediaSource {
    async fn list_items(&self) -> Result<Vec<SourceItem>> {
        if !self.root.is_dir() {
            return Err(Error::Source(format!(
                "photos root is not a directory: {}",
                self.root.display()
            )));
        }

        let root = self.root.clone();
        let items = tokio::task::spawn_blocking(move || Self::scan(&root))
            .await
            .map_err(|e| Error::Internal(format!("scan task failed: {}", e)))?;

        debug!("Scanned {} items under {}", items.len(), self.root.display());
        Ok(items)
    }

    async fn load_content(
        &self,
        id: &str,
        _target_size: u32,
        priority: LoadPriority,
    ) -> Result<MediaContent> {
        let path = self.checked_path(id)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            warn!("Content read failed for '{}' (priority {:?}): {}", id, priority, e);
            Error::Io(e)
        })?;

        Ok(MediaContent {
            id: id.to_string(),
            bytes,
        })
    }
}

/// Shared-handle media source alias used across the engine
pub type DynMediaSource = Arc<dyn MediaSource>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension_detection() {
        assert!(FsMediaSource::is_image_file(Path::new("a/b/photo.jpg")));
        assert!(FsMediaSource::is_image_file(Path::new("SHOUTING.JPEG")));
        assert!(FsMediaSource::is_image_file(Path::new("scan.Tiff")));
        assert!(!FsMediaSource::is_image_file(Path::new("notes.txt")));
        assert!(!FsMediaSource::is_image_file(Path::new("no_extension")));
        assert!(!FsMediaSource::is_image_file(Path::new("archive.zip")));
    }

    #[test]
    fn test_checked_path_rejects_traversal() {
        let source = FsMediaSource::new("/photos");
        assert!(source.checked_path("../etc/passwd").is_err());
        assert!(source.checked_path("/etc/passwd").is_err());
        assert!(source.checked_path("2024/img.jpg").is_ok());
    }

    #[tokio::test]
    async fn test_list_items_missing_root_errors() {
        let source = FsMediaSource::new("/definitely/not/a/real/photosift/root");
        let err = source.list_items().await.unwrap_err();
        assert!(matches!(err, Error::Source(_)));
    }

    #[tokio::test]
    async fn test_scan_lists_images_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        std::fs::create_dir(root.join("sub")).unwrap();
        std::fs::write(root.join("older.jpg"), b"older").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        std::fs::write(root.join("sub").join("newer.png"), b"newer").unwrap();
        std::fs::write(root.join("ignored.txt"), b"not an image").unwrap();

        let source = FsMediaSource::new(root);
        let items = source.list_items().await.unwrap();

        assert_eq!(items.len(), 2, "only image files should be listed");
        assert!(
            items[0].id.ends_with("newer.png"),
            "newest file should come first, got {:?}",
            items
        );
        assert!(items[1].id.ends_with("older.jpg"));
    }

    #[tokio::test]
    async fn test_load_content_returns_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pic.jpg"), b"jpeg bytes here").unwrap();

        let source = FsMediaSource::new(dir.path());
        let content = source
            .load_content("pic.jpg", 1800, LoadPriority::Immediate)
            .await
            .unwrap();

        assert_eq!(content.id, "pic.jpg");
        assert_eq!(content.bytes, b"jpeg bytes here");
        assert_eq!(content.byte_len(), 15);
    }

    #[tokio::test]
    async fn test_load_content_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsMediaSource::new(dir.path());
        let err = source
            .load_content("absent.jpg", 1800, LoadPriority::Prefetch)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_null_library_ops_are_noops() {
        let ops = NullLibraryOps;
        assert!(!ops.mark_favorite("x").await.unwrap());
        assert_eq!(ops.permanently_delete(&["a".to_string()]).await.unwrap(), 0);
    }
}
