use storage::repository::{ProgressRepository, Storage, StorageError};
use storage::sqlite::SqliteRepository;
use tutor_core::model::{Progress, ProgressKey};

fn build_progress(course: &str, lesson: &str, question: usize) -> Progress {
    let mut progress = Progress::new(course, lesson);
    progress.current_question = question;
    progress.correct_answers = 2;
    progress.attempts = 1;
    progress
}

#[tokio::test]
async fn sqlite_roundtrip_persists_cursor_and_counts() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let mut progress = build_progress("Expression Basics", "Building Values", 4);
    progress.multistep_cursor.insert(4, 2);
    repo.store(&progress).await.unwrap();

    let fetched = repo
        .load(&ProgressKey::new("Expression Basics", "Building Values"))
        .await
        .expect("load")
        .expect("record");
    assert_eq!(fetched, progress);
    assert_eq!(fetched.current_step(), Some(2));

    progress.advance();
    progress.completed = true;
    repo.store(&progress).await.unwrap();
    let updated = repo.load(&progress.key()).await.unwrap().unwrap();
    assert!(updated.completed);
    assert_eq!(updated.current_question, 5);
    assert!(updated.multistep_cursor.is_empty());
}

#[tokio::test]
async fn sqlite_keeps_lookalike_course_and_lesson_pairs_apart() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_lookalike?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let first = build_progress("a_", "b", 2);
    let second = build_progress("a", "_b", 3);
    repo.store(&first).await.unwrap();
    repo.store(&second).await.unwrap();

    assert_eq!(repo.load(&first.key()).await.unwrap(), Some(first.clone()));
    assert_eq!(repo.load(&second.key()).await.unwrap(), Some(second));

    assert_eq!(repo.delete_course("a").await.unwrap(), 1);
    assert_eq!(repo.load(&first.key()).await.unwrap(), Some(first));
}

#[tokio::test]
async fn sqlite_deletes_by_lesson_course_and_all() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_deletes?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.store(&build_progress("A", "one", 1)).await.unwrap();
    repo.store(&build_progress("A", "two", 1)).await.unwrap();
    repo.store(&build_progress("B", "one", 1)).await.unwrap();

    assert!(repo.delete(&ProgressKey::new("A", "one")).await.unwrap());
    assert!(!repo.delete(&ProgressKey::new("A", "one")).await.unwrap());
    assert_eq!(repo.delete_course("A").await.unwrap(), 1);
    assert!(repo.load(&ProgressKey::new("B", "one")).await.unwrap().is_some());
    assert_eq!(repo.delete_all().await.unwrap(), 1);
    assert!(repo.load(&ProgressKey::new("B", "one")).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_reports_corrupt_cursor() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_corrupt?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let progress = build_progress("C", "one", 0);
    repo.store(&progress).await.unwrap();
    sqlx::query("UPDATE progress SET multistep_cursor = 'oops'")
        .execute(repo.pool())
        .await
        .unwrap();

    let err = repo.load(&progress.key()).await.unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first");
    repo.migrate().await.expect("second");
}

#[tokio::test]
async fn storage_facade_uses_sqlite() {
    let storage = Storage::sqlite("sqlite:file:memdb_facade?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage
        .progress
        .store(&build_progress("D", "one", 0))
        .await
        .unwrap();
    assert!(
        storage
            .progress
            .load(&ProgressKey::new("D", "one"))
            .await
            .unwrap()
            .is_some()
    );
}
