use std::collections::BTreeMap;

use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tutor_core::model::Progress;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_usize(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range")))
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn cursor_to_json(cursor: &BTreeMap<usize, usize>) -> Result<String, StorageError> {
    serde_json::to_string(cursor).map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<Progress, StorageError> {
    let cursor: String = row.try_get("multistep_cursor").map_err(ser)?;
    Ok(Progress {
        course_name: row.try_get("course_name").map_err(ser)?,
        lesson_name: row.try_get("lesson_name").map_err(ser)?,
        current_question: i64_to_usize(
            "current_question",
            row.try_get("current_question").map_err(ser)?,
        )?,
        completed: row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        correct_answers: i64_to_u32(
            "correct_answers",
            row.try_get("correct_answers").map_err(ser)?,
        )?,
        attempts: i64_to_u32("attempts", row.try_get("attempts").map_err(ser)?)?,
        multistep_cursor: serde_json::from_str(&cursor).map_err(ser)?,
    })
}
