use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tutor_core::model::{Progress, ProgressKey};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for saved lesson progress.
///
/// Records are keyed by the slugs in [`ProgressKey`]; storing a record
/// replaces any previous one under the same key.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the record for `key`, or `None` if nothing was saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored record is
    /// unreadable, or other storage errors.
    async fn load(&self, key: &ProgressKey) -> Result<Option<Progress>, StorageError>;

    /// Persist or replace a record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn store(&self, progress: &Progress) -> Result<(), StorageError>;

    /// Remove one record. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails.
    async fn delete(&self, key: &ProgressKey) -> Result<bool, StorageError>;

    /// Remove every record of the course with slug `course`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails.
    async fn delete_course(&self, course: &str) -> Result<u64, StorageError>;

    /// Remove every record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails.
    async fn delete_all(&self) -> Result<u64, StorageError>;
}

/// In-memory repository for tests and `--memory` runs.
///
/// Records are held as JSON text so reads go through the same
/// deserialization path as a file-backed store.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<ProgressKey, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes raw text under `key`, bypassing serialization.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_raw(&self, key: ProgressKey, raw: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key, raw.into());
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load(&self, key: &ProgressKey) -> Result<Option<Progress>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(key)
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn store(&self, progress: &Progress) -> Result<(), StorageError> {
        let raw = serde_json::to_string(progress)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(progress.key(), raw);
        Ok(())
    }

    async fn delete(&self, key: &ProgressKey) -> Result<bool, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.remove(key).is_some())
    }

    async fn delete_course(&self, course: &str) -> Result<u64, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let before = guard.len();
        guard.retain(|key, _| key.course != course);
        Ok((before - guard.len()) as u64)
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let removed = guard.len() as u64;
        guard.clear();
        Ok(removed)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_progress(course: &str, lesson: &str) -> Progress {
        let mut progress = Progress::new(course, lesson);
        progress.current_question = 2;
        progress.correct_answers = 1;
        progress.multistep_cursor.insert(2, 3);
        progress
    }

    #[tokio::test]
    async fn round_trips_progress_with_cursor() {
        let repo = InMemoryRepository::new();
        let progress = build_progress("Expression Basics", "Numbers");
        repo.store(&progress).await.unwrap();

        let fetched = repo.load(&progress.key()).await.unwrap().unwrap();
        assert_eq!(fetched, progress);
        assert_eq!(fetched.current_step(), Some(3));
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let repo = InMemoryRepository::new();
        let key = ProgressKey::new("c", "l");
        assert!(repo.load(&key).await.unwrap().is_none());
        assert!(!repo.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_record_is_serialization_error() {
        let repo = InMemoryRepository::new();
        let key = ProgressKey::new("c", "l");
        repo.insert_raw(key.clone(), "{not json").unwrap();
        let err = repo.load(&key).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn delete_course_keeps_other_courses() {
        let repo = InMemoryRepository::new();
        repo.store(&build_progress("A", "one")).await.unwrap();
        repo.store(&build_progress("A", "two")).await.unwrap();
        repo.store(&build_progress("B", "one")).await.unwrap();

        assert_eq!(repo.delete_course("A").await.unwrap(), 2);
        assert!(repo.load(&ProgressKey::new("B", "one")).await.unwrap().is_some());
        assert_eq!(repo.delete_all().await.unwrap(), 1);
    }
}
