use base64::{engine::general_purpose, Engine};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::config::StorageMode;
use crate::core::errors::{StorageError, StorageResult};
use crate::core::types::{ResultId, ResultImage};
use crate::storage::cleanup::{CleanupTask, RetentionSweeper};
use crate::storage::image_store::ImageStorage;

/// Where display JPEGs go after analysis, and how they come back.
///
/// Disk mode writes `<id>.jpg` through `ImageStorage`; inline mode embeds
/// base64 into the result record. Fetches evict expired images lazily. With
/// an on-demand cleanup attached, every store may trigger a due cleanup pass,
/// which stands in for the background loop on serverless deployments.
pub struct ResultImages {
    mode: StorageMode,
    storage: Arc<dyn ImageStorage>,
    sweeper: Arc<RetentionSweeper>,
    on_demand: Option<Arc<CleanupTask>>,
}

impl ResultImages {
    pub fn new(
        mode: StorageMode,
        storage: Arc<dyn ImageStorage>,
        sweeper: Arc<RetentionSweeper>,
    ) -> Self {
        Self {
            mode,
            storage,
            sweeper,
            on_demand: None,
        }
    }

    pub fn with_on_demand_cleanup(mut self, cleanup: Arc<CleanupTask>) -> Self {
        self.on_demand = Some(cleanup);
        self
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Persist a display JPEG according to the storage mode
    pub async fn persist(&self, jpeg: Vec<u8>) -> StorageResult<ResultImage> {
        let image = match self.mode {
            StorageMode::Inline => ResultImage::Inline {
                jpeg_base64: general_purpose::STANDARD.encode(&jpeg),
            },
            StorageMode::Disk => {
                let id = ResultId::generate();
                let storage = Arc::clone(&self.storage);
                let save_id = id.clone();
                tokio::task::spawn_blocking(move || storage.save(&save_id, &jpeg))
                    .await
                    .map_err(|e| StorageError::TaskJoinFailed(e.to_string()))??;
                debug!("Stored result image {}", id);
                ResultImage::Stored { id }
            }
        };

        if let Some(ref cleanup) = self.on_demand {
            cleanup.spawn_if_due();
        }
        Ok(image)
    }

    /// Load a stored JPEG; expired images are deleted and reported missing.
    pub async fn fetch(&self, id: &ResultId) -> StorageResult<Option<Vec<u8>>> {
        let storage = Arc::clone(&self.storage);
        let sweeper = Arc::clone(&self.sweeper);
        let id = id.clone();

        tokio::task::spawn_blocking(move || {
            let Some(modified) = storage.modified(&id)? else {
                return Ok(None);
            };
            if sweeper.is_expired(modified) {
                info!("Evicting expired result image {} on access", id);
                storage.remove(&id)?;
                return Ok(None);
            }
            storage.load(&id)
        })
        .await
        .map_err(|e| StorageError::TaskJoinFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AnalysisResult, Dimensions, Flash, SessionId};
    use crate::storage::clock::{Clock, ManualClock};
    use crate::storage::flash::FlashStore;
    use crate::storage::image_store::MemoryImageStorage;
    use crate::storage::result_store::{MemoryResultStore, ResultStore};
    use std::time::{Duration, SystemTime};

    const DAY: Duration = Duration::from_secs(24 * 3600);
    const HOUR: Duration = Duration::from_secs(3600);

    fn images(
        mode: StorageMode,
        clock: Arc<ManualClock>,
    ) -> (ResultImages, Arc<MemoryImageStorage>) {
        let storage = Arc::new(MemoryImageStorage::new(clock.clone()));
        let sweeper = Arc::new(RetentionSweeper::new(storage.clone(), clock, DAY, HOUR));
        (ResultImages::new(mode, storage.clone(), sweeper), storage)
    }

    fn stored_result(id: ResultId, created_at: SystemTime) -> AnalysisResult {
        AnalysisResult {
            image: ResultImage::Stored { id },
            disease_id: 6,
            disease_name: "Healthy Plant".into(),
            confidence: 88.0,
            description: String::new(),
            treatment: String::new(),
            prevention: String::new(),
            affected_areas: Vec::new(),
            analysis_size: Dimensions::new(8, 8),
            display_size: Dimensions::new(8, 8),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_inline_mode_embeds_base64() {
        let (images, storage) = images(StorageMode::Inline, Arc::new(ManualClock::starting_now()));
        let stored = images.persist(vec![0xFF, 0xD8, 0xFF]).await.unwrap();
        assert_eq!(
            stored,
            ResultImage::Inline {
                jpeg_base64: "/9j/".to_string()
            }
        );
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_disk_mode_roundtrip() {
        let (images, _) = images(StorageMode::Disk, Arc::new(ManualClock::starting_now()));
        let ResultImage::Stored { id } = images.persist(b"jpeg".to_vec()).await.unwrap() else {
            panic!("disk mode must store by reference");
        };
        assert_eq!(images.fetch(&id).await.unwrap().as_deref(), Some(&b"jpeg"[..]));
        assert_eq!(images.fetch(&ResultId::generate()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_evicts_expired_image() {
        let clock = Arc::new(ManualClock::starting_now());
        let (images, storage) = images(StorageMode::Disk, clock.clone());
        let ResultImage::Stored { id } = images.persist(b"jpeg".to_vec()).await.unwrap() else {
            panic!("disk mode must store by reference");
        };

        clock.advance(DAY + Duration::from_secs(1));
        assert_eq!(images.fetch(&id).await.unwrap(), None);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_store_triggers_due_cleanup() {
        let clock = Arc::new(ManualClock::starting_now());
        let storage = Arc::new(MemoryImageStorage::new(clock.clone()));
        let sweeper = Arc::new(RetentionSweeper::new(storage.clone(), clock.clone(), DAY, HOUR));
        let results = Arc::new(MemoryResultStore::new(clock.clone(), DAY));
        let flashes = Arc::new(FlashStore::new(clock.clone(), DAY));
        let cleanup = Arc::new(CleanupTask::new(
            sweeper.clone(),
            results.clone(),
            flashes.clone(),
            HOUR,
        ));
        let images = ResultImages::new(StorageMode::Disk, storage.clone(), sweeper)
            .with_on_demand_cleanup(cleanup);

        let abandoned = SessionId::generate();
        let ResultImage::Stored { id: first } = images.persist(b"a".to_vec()).await.unwrap() else {
            panic!("disk mode must store by reference");
        };
        results.put(&abandoned, stored_result(first, clock.now()));
        flashes.push(&abandoned, Flash::warning("never read"));

        clock.advance(DAY + HOUR);
        images.persist(b"b".to_vec()).await.unwrap();

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while storage.len() != 1 || !results.is_empty() || !flashes.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(drained.is_ok(), "store did not clean up stale state");
    }
}
