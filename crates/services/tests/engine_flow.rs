use std::sync::Arc;

use async_trait::async_trait;
use services::{
    EngineConfig, ProgressStore, Session, SessionState, StaticCourses, Transition, TutorEngine,
};
use storage::repository::{InMemoryRepository, ProgressRepository, Storage, StorageError};
use tutor_core::eval::Value;
use tutor_core::model::{Course, Lesson, Progress, ProgressKey, Question};

const COURSE: &str = "Test Course";

fn engine_with(lessons: Vec<Lesson>, store: ProgressStore) -> TutorEngine {
    let course = Course::new(COURSE, lessons).unwrap();
    TutorEngine::new(&StaticCourses::new(vec![course]), store)
}

fn memory_store() -> ProgressStore {
    ProgressStore::from_storage(&Storage::in_memory())
}

async fn feed(engine: &TutorEngine, mut session: Session, inputs: &[&str]) -> Transition {
    let mut output = Vec::new();
    for input in inputs {
        let next = engine.handle(session, input).await;
        output.extend(next.output);
        session = next.session;
    }
    Transition { session, output }
}

fn saw(output: &[String], needle: &str) -> bool {
    output.iter().any(|line| line.contains(needle))
}

fn two_code_questions() -> Lesson {
    Lesson::new(
        "Arithmetic",
        vec![
            Question::code("What is 8?", "8").with_hint("Add two fours."),
            Question::code("Type 1.", "1"),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn wrong_answers_count_attempts_and_reveal_on_exhaustion() {
    let engine = engine_with(vec![two_code_questions()], memory_store());
    let t = feed(&engine, engine.start().session, &["1", "1", "5+2"]).await;
    assert!(saw(&t.output, "your code produced 7"));
    assert!(saw(&t.output, "Try again (attempt 2 of 3)."));

    let t = feed(&engine, t.session, &["1 + 1"]).await;
    assert!(saw(&t.output, "Try again (attempt 3 of 3)."));
    assert_eq!(t.session.state(), &SessionState::AwaitingAnswer { attempt: 3 });
    assert_eq!(t.session.progress().unwrap().current_question, 1);

    let t = feed(&engine, t.session, &["0"]).await;
    assert!(saw(&t.output, "The answer was: 8"));
    assert!(saw(&t.output, "Hint: Add two fours."));
    let progress = t.session.progress().unwrap();
    assert_eq!(progress.current_question, 2);
    assert_eq!(progress.correct_answers, 0);
    assert_eq!(t.session.state(), &SessionState::AwaitingAnswer { attempt: 1 });
}

#[tokio::test]
async fn hints_never_consume_attempts() {
    let engine = engine_with(vec![two_code_questions()], memory_store());
    let t = feed(
        &engine,
        engine.start().session,
        &["1", "1", "hint", "?", "7", "HELP", "hint"],
    )
    .await;
    assert_eq!(t.session.state(), &SessionState::AwaitingAnswer { attempt: 2 });
    assert!(saw(&t.output, "Hint: Add two fours."));

    let t = feed(&engine, t.session, &["4+4"]).await;
    assert!(saw(&t.output, "Correct!"));
    assert_eq!(t.session.progress().unwrap().correct_answers, 1);
}

#[tokio::test]
async fn skip_advances_without_credit() {
    let engine = engine_with(vec![two_code_questions()], memory_store());
    let t = feed(&engine, engine.start().session, &["1", "1", "3", "skip"]).await;
    let progress = t.session.progress().unwrap();
    assert_eq!(progress.current_question, 2);
    assert_eq!(progress.correct_answers, 0);
    assert_eq!(progress.attempts, 0);
}

#[tokio::test]
async fn custom_attempt_limit_is_respected() {
    let engine = engine_with(vec![two_code_questions()], memory_store())
        .with_config(EngineConfig::new(1));
    let t = feed(&engine, engine.start().session, &["1", "1", "9"]).await;
    assert!(saw(&t.output, "The answer was: 8"));
    assert_eq!(t.session.progress().unwrap().current_question, 2);
}

#[tokio::test]
async fn evaluation_errors_consume_an_attempt() {
    let engine = engine_with(vec![two_code_questions()], memory_store());
    let t = feed(&engine, engine.start().session, &["1", "1", "4 +"]).await;
    assert!(saw(&t.output, "Your code produced an error"));
    assert_eq!(t.session.state(), &SessionState::AwaitingAnswer { attempt: 2 });
}

#[tokio::test]
async fn multi_step_collects_fragments_then_finalizes_once() {
    let lesson = Lesson::new(
        "Steps",
        vec![
            Question::multi_step("Build it.", vec!["Set a to 2.".into(), "Multiply a by 4.".into()])
                .unwrap()
                .with_step_hints(vec![Some("Type `a = 2`.".into()), None])
                .with_hint("Two statements.")
                .with_final_answer("8"),
            Question::code("Type 1.", "1"),
        ],
    )
    .unwrap();
    let engine = engine_with(vec![lesson], memory_store());

    let t = feed(&engine, engine.start().session, &["1", "1"]).await;
    assert!(saw(&t.output, "Step 1 of 2: Set a to 2."));

    let t = feed(&engine, t.session, &["hint", "nope(", "a = 2"]).await;
    assert!(saw(&t.output, "Hint: Type `a = 2`."));
    assert!(saw(&t.output, "That step did not run"));
    assert!(saw(&t.output, "Step 2 of 2: Multiply a by 4."));
    assert_eq!(t.session.progress().unwrap().multistep_cursor.get(&1), Some(&2));

    let t = feed(&engine, t.session, &["done"]).await;
    assert!(saw(&t.output, "1 step remaining."));

    let t = feed(&engine, t.session, &["hint", "a * 4"]).await;
    assert!(saw(&t.output, "Hint: Two statements."));
    assert_eq!(
        t.session.state(),
        &SessionState::MultiStep {
            step: 3,
            fragments: vec!["a = 2".into(), "a * 4".into()],
        }
    );

    let t = feed(&engine, t.session, &["done"]).await;
    assert!(saw(&t.output, "Correct!"));
    let progress = t.session.progress().unwrap();
    assert_eq!(progress.current_question, 2);
    assert_eq!(progress.correct_answers, 1);
    assert!(progress.multistep_cursor.is_empty());
}

#[tokio::test]
async fn multi_step_mismatch_is_reported_not_retried() {
    let lesson = Lesson::new(
        "Steps",
        vec![
            Question::multi_step("Build it.", vec!["one".into()])
                .unwrap()
                .with_final_answer("10"),
            Question::code("Type 1.", "1"),
        ],
    )
    .unwrap();
    let engine = engine_with(vec![lesson], memory_store());
    let t = feed(&engine, engine.start().session, &["1", "1", "3", "done"]).await;
    assert!(saw(&t.output, "did not produce the expected result"));
    let progress = t.session.progress().unwrap();
    assert_eq!(progress.current_question, 2);
    assert_eq!(progress.correct_answers, 0);
}

#[tokio::test]
async fn display_only_and_link_questions_are_unscored() {
    let lesson = Lesson::new(
        "Mixed",
        vec![
            Question::message("Welcome."),
            Question::confirm_link("Read the docs.", "https://example.com/docs"),
            Question::code("Type 1.", "1"),
        ],
    )
    .unwrap();
    let engine = engine_with(vec![lesson], memory_store());

    let t = feed(&engine, engine.start().session, &["1", "1"]).await;
    assert!(saw(&t.output, "Welcome."));
    assert!(saw(&t.output, "Open this link? (yes/no)"));
    assert_eq!(t.session.progress().unwrap().current_question, 2);

    let t = feed(&engine, t.session, &["y"]).await;
    assert!(saw(&t.output, "Opening https://example.com/docs"));

    let t = feed(&engine, t.session, &["1"]).await;
    assert!(saw(&t.output, "Lesson complete: 1 of 1 scored questions correct."));
    assert_eq!(t.session.state(), &SessionState::Complete);
    let progress = t.session.progress().unwrap();
    assert!(progress.completed);
    assert_eq!(progress.current_question, 4);
}

#[tokio::test]
async fn single_choice_reports_format_help() {
    let lesson = Lesson::new(
        "Choice",
        vec![
            Question::single_choice(
                "Pick the third.",
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
                3,
            )
            .unwrap(),
        ],
    )
    .unwrap();
    let engine = engine_with(vec![lesson], memory_store());
    let t = feed(&engine, engine.start().session, &["1", "1"]).await;
    assert!(saw(&t.output, "  3: c"));

    let t = feed(&engine, t.session, &["two"]).await;
    assert!(saw(&t.output, "Please enter the corresponding number (1-4)."));
    let t = feed(&engine, t.session, &["2"]).await;
    assert!(saw(&t.output, "Option 2 is not correct."));
    let t = feed(&engine, t.session, &["3"]).await;
    assert!(saw(&t.output, "Correct!"));
}

#[tokio::test]
async fn menu_persists_and_resume_restores_attempts() {
    let store = memory_store();
    let lesson = Lesson::new(
        "Three",
        vec![
            Question::code("one", "1"),
            Question::code("two", "2"),
            Question::code("three", "3"),
        ],
    )
    .unwrap();
    let engine = engine_with(vec![lesson], store.clone());

    let t = feed(&engine, engine.start().session, &["1", "1", "1", "5", "menu"]).await;
    assert_eq!(t.session.state(), &SessionState::MenuLesson);
    assert!(saw(&t.output, "[in progress, question 2 of 3]"));

    let saved = store.get(COURSE, "Three").await;
    assert_eq!(saved.current_question, 2);
    assert_eq!(saved.attempts, 1);

    // A brand new session picks up from storage.
    let t = feed(&engine, engine.start().session, &["1", "1"]).await;
    assert!(saw(&t.output, "Resuming at question 2 of 3."));
    assert!(saw(&t.output, "(attempt 2 of 3)"));
    assert_eq!(t.session.state(), &SessionState::AwaitingAnswer { attempt: 2 });
}

fn two_step_lesson() -> Lesson {
    Lesson::new(
        "Steps",
        vec![
            Question::multi_step("Build it.", vec!["Set a to 2.".into(), "Multiply a by 4.".into()])
                .unwrap()
                .with_hint("Two statements.")
                .with_final_answer("8"),
            Question::code("Type 1.", "1"),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn exit_persists_cursor_and_a_new_session_restarts_the_steps() {
    let store = memory_store();
    let lesson = Lesson::new(
        "Steps",
        vec![
            Question::multi_step("Build.", vec!["first".into(), "second".into()]).unwrap(),
        ],
    )
    .unwrap();
    let engine = engine_with(vec![lesson], store.clone());

    let t = feed(&engine, engine.start().session, &["1", "1", "a = 1", "quit"]).await;
    assert!(t.is_finished());

    let saved = store.get(COURSE, "Steps").await;
    assert_eq!(saved.multistep_cursor.get(&1), Some(&2));

    // The fragments lived only in the old session.
    let t = feed(&engine, engine.start().session, &["1", "1"]).await;
    assert!(saw(&t.output, "starting this question again from step 1"));
    assert!(saw(&t.output, "Step 1 of 2: first"));
    assert_eq!(
        t.session.state(),
        &SessionState::MultiStep {
            step: 1,
            fragments: Vec::new(),
        }
    );
    assert_eq!(store.get(COURSE, "Steps").await.multistep_cursor.get(&1), Some(&1));
}

#[tokio::test]
async fn menu_keeps_collected_steps_for_done_on_return() {
    let store = memory_store();
    let engine = engine_with(vec![two_step_lesson()], store.clone());

    let t = feed(
        &engine,
        engine.start().session,
        &["1", "1", "a = 2", "a * 4", "menu"],
    )
    .await;
    assert_eq!(t.session.state(), &SessionState::MenuLesson);
    assert_eq!(store.get(COURSE, "Steps").await.multistep_cursor.get(&1), Some(&3));

    let t = feed(&engine, t.session, &["1"]).await;
    assert!(saw(&t.output, "All steps are entered."));
    assert!(!saw(&t.output, "starting this question again"));

    let t = feed(&engine, t.session, &["done"]).await;
    assert!(saw(&t.output, "Correct!"));
    let progress = t.session.progress().unwrap();
    assert_eq!(progress.correct_answers, 1);
    assert_eq!(progress.current_question, 2);
}

#[tokio::test]
async fn menu_midway_resumes_at_the_next_step() {
    let engine = engine_with(vec![two_step_lesson()], memory_store());
    let t = feed(
        &engine,
        engine.start().session,
        &["1", "1", "a = 2", "back", "1"],
    )
    .await;
    assert!(saw(&t.output, "Step 2 of 2: Multiply a by 4."));
    assert_eq!(
        t.session.state(),
        &SessionState::MultiStep {
            step: 2,
            fragments: vec!["a = 2".into()],
        }
    );

    let t = feed(&engine, t.session, &["a * 4", "done"]).await;
    assert_eq!(t.session.progress().unwrap().correct_answers, 1);
}

#[tokio::test]
async fn hint_and_skip_work_after_the_last_step() {
    let engine = engine_with(vec![two_step_lesson()], memory_store());
    let t = feed(&engine, engine.start().session, &["1", "1", "a = 2", "a * 4"]).await;
    assert!(saw(&t.output, "All steps are entered."));

    let t = feed(&engine, t.session, &["hint", "a + 1"]).await;
    assert!(saw(&t.output, "Hint: Two statements."));
    assert!(saw(&t.output, "All steps are entered."));
    assert!(matches!(
        t.session.state(),
        SessionState::MultiStep { step: 3, .. }
    ));

    let t = feed(&engine, t.session, &["skip"]).await;
    assert!(saw(&t.output, "Skipped."));
    let progress = t.session.progress().unwrap();
    assert_eq!(progress.current_question, 2);
    assert_eq!(progress.correct_answers, 0);
    assert!(progress.multistep_cursor.is_empty());
    assert_eq!(t.session.state(), &SessionState::AwaitingAnswer { attempt: 1 });
}

#[tokio::test]
async fn bindings_outlive_a_completed_lesson() {
    let lessons = vec![
        Lesson::new(
            "Names",
            vec![
                Question::code("Set x to 5.", "x = 5"),
                Question::code("Double x.", "x * 2"),
            ],
        )
        .unwrap(),
        Lesson::new("More", vec![Question::code("Add one to x.", "x + 1")]).unwrap(),
    ];
    let engine = engine_with(lessons, memory_store());

    let t = feed(&engine, engine.start().session, &["1", "1", "x = 5", "x * 2"]).await;
    assert!(saw(&t.output, "Lesson complete: 2 of 2 scored questions correct."));
    assert_eq!(t.session.state(), &SessionState::Complete);

    let t = feed(&engine, t.session, &["anything"]).await;
    assert_eq!(t.session.state(), &SessionState::MenuLesson);
    assert!(t.session.progress().is_none());
    assert_eq!(t.session.context().get("x"), Some(&Value::Int(5)));

    let t = feed(&engine, t.session, &["2", "x + 1"]).await;
    assert!(saw(&t.output, "Correct!"));
    assert!(saw(&t.output, "Lesson complete: 1 of 1 scored questions correct."));
}

#[tokio::test]
async fn completed_lesson_asks_before_restarting() {
    let store = memory_store();
    let lesson = Lesson::new("Single", vec![Question::code("one", "1")]).unwrap();
    let engine = engine_with(vec![lesson], store.clone());

    let t = feed(&engine, engine.start().session, &["1", "1", "1", ""]).await;
    assert!(saw(&t.output, "[complete, 1/1 correct]"));

    let t = feed(&engine, t.session, &["1"]).await;
    assert_eq!(t.session.state(), &SessionState::AwaitingRestartConfirm { lesson: 0 });

    let t = feed(&engine, t.session, &["no"]).await;
    assert_eq!(t.session.state(), &SessionState::MenuLesson);
    assert!(store.get(COURSE, "Single").await.completed);

    let t = feed(&engine, t.session, &["1", "YES"]).await;
    assert_eq!(t.session.state(), &SessionState::AwaitingAnswer { attempt: 1 });
    let fresh = store.get(COURSE, "Single").await;
    assert!(!fresh.completed);
    assert_eq!(fresh.current_question, 1);
}

#[tokio::test]
async fn lesson_menu_resets() {
    let store = memory_store();
    let lessons = vec![
        Lesson::new("First", vec![Question::code("one", "1"), Question::code("two", "2")]).unwrap(),
        Lesson::new("Second", vec![Question::code("one", "1"), Question::code("two", "2")]).unwrap(),
    ];
    let engine = engine_with(lessons, store.clone());

    let mut other = Progress::new("Other Course", "First");
    other.current_question = 2;
    store.save(&other).await.unwrap();

    let t = feed(
        &engine,
        engine.start().session,
        &["1", "1", "1", "menu", "2", "1", "back"],
    )
    .await;
    assert_eq!(store.get(COURSE, "First").await.current_question, 2);
    assert_eq!(store.get(COURSE, "Second").await.current_question, 2);

    let t = feed(&engine, t.session, &["reset 1"]).await;
    assert!(saw(&t.output, "Progress for \"First\" has been reset."));
    assert_eq!(store.get(COURSE, "First").await.current_question, 1);
    assert_eq!(store.get(COURSE, "Second").await.current_question, 2);

    let t = feed(&engine, t.session, &["reset all"]).await;
    assert_eq!(t.session.state(), &SessionState::AwaitingResetAllConfirm);
    let t = feed(&engine, t.session, &["nah"]).await;
    assert!(saw(&t.output, "Nothing was reset."));
    assert_eq!(store.get(COURSE, "Second").await.current_question, 2);

    let t = feed(&engine, t.session, &["reset all", "y"]).await;
    assert_eq!(t.session.state(), &SessionState::MenuLesson);
    assert_eq!(store.get(COURSE, "Second").await.current_question, 1);
    assert_eq!(store.get("Other Course", "First").await, other);
}

#[tokio::test]
async fn menus_reprompt_on_bad_input() {
    let engine = engine_with(vec![two_code_questions()], memory_store());
    let t = feed(&engine, engine.start().session, &["abc"]).await;
    assert_eq!(t.session.state(), &SessionState::MenuCourse);
    assert!(saw(&t.output, "Please enter a course number (1-1), or 0 to exit."));

    let t = feed(&engine, t.session, &["1", "7"]).await;
    assert_eq!(t.session.state(), &SessionState::MenuLesson);
    assert!(saw(&t.output, "Please enter a lesson number (1-1)"));

    let t = feed(&engine, t.session, &["0", "-1"]).await;
    assert!(t.is_finished());
}

#[tokio::test]
async fn inconsistent_saved_progress_starts_fresh() {
    let repo = InMemoryRepository::new();
    let mut stale = Progress::new(COURSE, "Arithmetic");
    stale.current_question = 40;
    repo.store(&stale).await.unwrap();
    let engine = engine_with(vec![two_code_questions()], ProgressStore::new(Arc::new(repo)));

    let t = feed(&engine, engine.start().session, &["1", "1"]).await;
    assert_eq!(t.session.progress().unwrap().current_question, 1);
    assert!(!saw(&t.output, "Resuming"));
}

struct FailingRepo;

#[async_trait]
impl ProgressRepository for FailingRepo {
    async fn load(&self, _key: &ProgressKey) -> Result<Option<Progress>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn store(&self, _progress: &Progress) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn delete(&self, _key: &ProgressKey) -> Result<bool, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn delete_course(&self, _course: &str) -> Result<u64, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn storage_failures_do_not_interrupt_the_session() {
    let engine = engine_with(
        vec![two_code_questions()],
        ProgressStore::new(Arc::new(FailingRepo)),
    );
    let t = feed(&engine, engine.start().session, &["1", "1", "8", "1"]).await;
    assert!(saw(&t.output, "Lesson complete: 2 of 2 scored questions correct."));

    let t = feed(&engine, t.session, &["", "reset 1"]).await;
    assert!(saw(&t.output, "Progress could not be reset."));
    assert_eq!(t.session.state(), &SessionState::MenuLesson);
}
