use std::sync::Arc;

use storage::repository::{ProgressRepository, Storage};
use tracing::{debug, warn};
use tutor_core::model::{Progress, ProgressKey, slugify};

use crate::error::ProgressStoreError;

/// Lesson progress with recovery semantics on top of a repository.
///
/// Loading never fails: a missing, unreadable, or unreachable record yields
/// a fresh one. Writes report their errors so callers can decide whether to
/// surface them.
#[derive(Clone)]
pub struct ProgressStore {
    repo: Arc<dyn ProgressRepository>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>) -> Self {
        Self { repo }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage) -> Self {
        Self::new(Arc::clone(&storage.progress))
    }

    /// Stored progress for the lesson, or a fresh record.
    pub async fn get(&self, course: &str, lesson: &str) -> Progress {
        let key = ProgressKey::new(course, lesson);
        match self.repo.load(&key).await {
            Ok(Some(progress)) => progress,
            Ok(None) => Progress::new(course, lesson),
            Err(err) => {
                warn!(record = %key.record_name(), error = %err, "discarding unreadable progress");
                Progress::new(course, lesson)
            }
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressStoreError` if the record cannot be written.
    pub async fn save(&self, progress: &Progress) -> Result<(), ProgressStoreError> {
        self.repo.store(progress).await?;
        debug!(
            record = %progress.key().record_name(),
            question = progress.current_question,
            completed = progress.completed,
            "progress saved"
        );
        Ok(())
    }

    /// Deletes one lesson's record. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError` if the backend fails.
    pub async fn reset_lesson(&self, course: &str, lesson: &str) -> Result<bool, ProgressStoreError> {
        Ok(self.repo.delete(&ProgressKey::new(course, lesson)).await?)
    }

    /// Deletes every record of `course`, leaving other courses untouched.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError` if the backend fails.
    pub async fn reset_course(&self, course: &str) -> Result<u64, ProgressStoreError> {
        let removed = self.repo.delete_course(&slugify(course)).await?;
        debug!(course, removed, "course progress reset");
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns `ProgressStoreError` if the backend fails.
    pub async fn delete_all(&self) -> Result<u64, ProgressStoreError> {
        let removed = self.repo.delete_all().await?;
        debug!(removed, "all progress deleted");
        Ok(removed)
    }
}
