use chrono::Utc;
use tutor_core::model::{Progress, ProgressKey};

use super::SqliteRepository;
use super::mapping::{cursor_to_json, map_progress_row, usize_to_i64};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load(&self, key: &ProgressKey) -> Result<Option<Progress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT course_name, lesson_name, current_question, completed, correct_answers, attempts, multistep_cursor
            FROM progress WHERE course_slug = ?1 AND lesson_slug = ?2
            ",
        )
        .bind(&key.course)
        .bind(&key.lesson)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn store(&self, progress: &Progress) -> Result<(), StorageError> {
        let key = progress.key();
        let cursor = cursor_to_json(&progress.multistep_cursor)?;

        sqlx::query(
            r"
            INSERT INTO progress (record_name, course_slug, lesson_slug, course_name, lesson_name, current_question, completed, correct_answers, attempts, multistep_cursor, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(course_slug, lesson_slug) DO UPDATE SET
                record_name = excluded.record_name,
                course_name = excluded.course_name,
                lesson_name = excluded.lesson_name,
                current_question = excluded.current_question,
                completed = excluded.completed,
                correct_answers = excluded.correct_answers,
                attempts = excluded.attempts,
                multistep_cursor = excluded.multistep_cursor,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key.record_name())
        .bind(&key.course)
        .bind(&key.lesson)
        .bind(&progress.course_name)
        .bind(&progress.lesson_name)
        .bind(usize_to_i64("current_question", progress.current_question)?)
        .bind(i64::from(progress.completed))
        .bind(i64::from(progress.correct_answers))
        .bind(i64::from(progress.attempts))
        .bind(cursor)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &ProgressKey) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM progress WHERE course_slug = ?1 AND lesson_slug = ?2")
            .bind(&key.course)
            .bind(&key.lesson)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_course(&self, course: &str) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM progress WHERE course_slug = ?1")
            .bind(course)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(res.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM progress")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(res.rows_affected())
    }
}
