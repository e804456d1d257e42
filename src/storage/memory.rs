use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::error::StorageError;
use crate::core::types::{MediaAsset, MediaId, ViewLogEntry};

use super::MetadataStore;

// ---------------------------------------------------------------------------
// InMemoryMetadataStore
// ---------------------------------------------------------------------------

/// In-memory record store for media assets and the view log.
///
/// Assets live in a `HashMap` behind a `RwLock`; the view log is a plain
/// append-only `Vec`, which also preserves insertion order for the
/// view-log endpoint. No external dependencies required.
pub struct InMemoryMetadataStore {
    assets: Arc<RwLock<HashMap<MediaId, MediaAsset>>>,
    views: Arc<RwLock<Vec<ViewLogEntry>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            assets: Arc::new(RwLock::new(HashMap::new())),
            views: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    async fn save_media(&self, asset: MediaAsset) -> Result<MediaId, StorageError> {
        let id = asset.id;
        let mut assets = self.assets.write().await;
        assets.insert(id, asset);
        Ok(id)
    }

    async fn find_media(&self, id: MediaId) -> Result<Option<MediaAsset>, StorageError> {
        let assets = self.assets.read().await;
        Ok(assets.get(&id).cloned())
    }

    async fn append_view(&self, entry: ViewLogEntry) -> Result<(), StorageError> {
        let mut views = self.views.write().await;
        views.push(entry);
        Ok(())
    }

    async fn views_for(&self, id: MediaId) -> Result<Vec<ViewLogEntry>, StorageError> {
        let views = self.views.read().await;
        Ok(views
            .iter()
            .filter(|v| v.media_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
impl InMemoryMetadataStore {
    pub async fn view_count(&self) -> usize {
        self.views.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MediaType;

    #[tokio::test]
    async fn test_save_and_find_media() {
        let store = InMemoryMetadataStore::new();
        let asset = MediaAsset::new(
            "Demo".to_string(),
            MediaType::Video,
            "/files/demo.mp4".to_string(),
        );
        let id = store.save_media(asset.clone()).await.unwrap();

        let found = store.find_media(id).await.unwrap().unwrap();
        assert_eq!(found.title, "Demo");
        assert_eq!(found.file_url, "/files/demo.mp4");
    }

    #[tokio::test]
    async fn test_find_unknown_media_is_none() {
        let store = InMemoryMetadataStore::new();
        assert!(store.find_media(MediaId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_view_log_keeps_insertion_order_per_asset() {
        let store = InMemoryMetadataStore::new();
        let a = MediaId::new();
        let b = MediaId::new();

        for client in ["1.1.1.1", "2.2.2.2", "3.3.3.3"] {
            store
                .append_view(ViewLogEntry::new(a, client.to_string()))
                .await
                .unwrap();
        }
        store
            .append_view(ViewLogEntry::new(b, "9.9.9.9".to_string()))
            .await
            .unwrap();

        let views = store.views_for(a).await.unwrap();
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].viewed_by, "1.1.1.1");
        assert_eq!(views[2].viewed_by, "3.3.3.3");
        assert_eq!(store.views_for(b).await.unwrap().len(), 1);
    }
}
