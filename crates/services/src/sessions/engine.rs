use std::sync::Arc;

use tracing::{debug, info, warn};
use tutor_core::eval::evaluate;
use tutor_core::model::{Course, CourseProvider, Lesson, Progress, QuestionKind};
use tutor_core::text::{PlainRenderer, Renderer};

use super::command::{AnswerCommand, CourseMenuCommand, LessonMenuCommand, is_yes};
use super::progress::LessonStatus;
use super::state::{ActiveLesson, ParkedSteps, Session, SessionState, Transition};
use super::view;
use crate::progress_store::ProgressStore;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Tunables for the answer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    max_attempts: u32,
}

impl EngineConfig {
    /// `max_attempts` is raised to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Drives lesson sessions.
///
/// The engine holds no per-learner state: every call takes the [`Session`]
/// by value and hands back the next one together with the lines to show.
#[derive(Clone)]
pub struct TutorEngine {
    courses: Vec<Course>,
    store: ProgressStore,
    renderer: Arc<dyn Renderer + Send + Sync>,
    config: EngineConfig,
}

impl TutorEngine {
    #[must_use]
    pub fn new(provider: &dyn CourseProvider, store: ProgressStore) -> Self {
        Self {
            courses: provider.list_courses(),
            store,
            renderer: Arc::new(PlainRenderer),
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer + Send + Sync>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    #[must_use]
    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    /// A new session at the course menu.
    #[must_use]
    pub fn start(&self) -> Transition {
        Transition {
            session: Session::new(),
            output: view::course_menu(&self.courses),
        }
    }

    /// Processes one line of learner input.
    pub async fn handle(&self, mut session: Session, input: &str) -> Transition {
        let mut out = Vec::new();
        let input = input.trim();
        match session.state.clone() {
            SessionState::MenuCourse => self.on_course_menu(&mut session, input, &mut out).await,
            SessionState::MenuLesson => self.on_lesson_menu(&mut session, input, &mut out).await,
            SessionState::AwaitingRestartConfirm { lesson } => {
                self.on_restart_confirm(&mut session, lesson, input, &mut out)
                    .await;
            }
            SessionState::AwaitingResetAllConfirm => {
                self.on_reset_all_confirm(&mut session, input, &mut out)
                    .await;
            }
            SessionState::Displaying => self.present(&mut session, &mut out).await,
            SessionState::AwaitingAnswer { attempt } => {
                self.on_answer(&mut session, attempt, input, &mut out).await;
            }
            SessionState::MultiStep { step, fragments } => {
                self.on_step(&mut session, step, fragments, input, &mut out)
                    .await;
            }
            SessionState::Complete => {
                session.active = None;
                self.show_lesson_menu(&mut session, &mut out).await;
            }
            SessionState::Ended => out.push("The session has ended.".to_owned()),
        }
        debug!(state = ?session.state, lines = out.len(), "input handled");
        Transition {
            session,
            output: out,
        }
    }

    /// Persists the active lesson and ends the session, as on end of input.
    pub async fn shutdown(&self, mut session: Session) -> Transition {
        let mut out = Vec::new();
        if session.state != SessionState::Ended {
            self.leave_session(&mut session, &mut out).await;
        }
        Transition {
            session,
            output: out,
        }
    }

    // ─── MENUS ─────────────────────────────────────────────────────────────────

    async fn on_course_menu(&self, session: &mut Session, input: &str, out: &mut Vec<String>) {
        match CourseMenuCommand::parse(input) {
            CourseMenuCommand::Exit => {
                session.state = SessionState::Ended;
                out.push("Goodbye!".to_owned());
            }
            CourseMenuCommand::Select(n) if (1..=self.courses.len()).contains(&n) => {
                session.course = Some(n - 1);
                self.show_lesson_menu(session, out).await;
            }
            _ => {
                out.push(view::course_menu_help(self.courses.len()));
                out.extend(view::course_menu(&self.courses));
            }
        }
    }

    async fn show_lesson_menu(&self, session: &mut Session, out: &mut Vec<String>) {
        let Some(course) = self.course(session) else {
            self.show_course_menu(session, out);
            return;
        };
        let mut statuses = Vec::with_capacity(course.lessons().len());
        for lesson in course.lessons() {
            let progress = self.store.get(course.name(), lesson.name()).await;
            statuses.push(LessonStatus::from_progress(&progress, lesson));
        }
        out.extend(view::lesson_menu(course, &statuses));
        session.state = SessionState::MenuLesson;
    }

    fn show_course_menu(&self, session: &mut Session, out: &mut Vec<String>) {
        session.course = None;
        session.active = None;
        session.state = SessionState::MenuCourse;
        out.extend(view::course_menu(&self.courses));
    }

    async fn on_lesson_menu(&self, session: &mut Session, input: &str, out: &mut Vec<String>) {
        let Some(course) = self.course(session) else {
            self.show_course_menu(session, out);
            return;
        };
        let count = course.lessons().len();
        match LessonMenuCommand::parse(input) {
            LessonMenuCommand::Back => self.show_course_menu(session, out),
            LessonMenuCommand::Select(n) if (1..=count).contains(&n) => {
                self.open_lesson(session, n - 1, out).await;
            }
            LessonMenuCommand::Reset(n) if (1..=count).contains(&n) => {
                let lesson = &course.lessons()[n - 1];
                match self.store.reset_lesson(course.name(), lesson.name()).await {
                    Ok(_) => out.push(format!("Progress for \"{}\" has been reset.", lesson.title())),
                    Err(err) => {
                        warn!(lesson = lesson.name(), error = %err, "lesson reset failed");
                        out.push("Progress could not be reset.".to_owned());
                    }
                }
                self.show_lesson_menu(session, out).await;
            }
            LessonMenuCommand::ResetAll => {
                out.push(format!(
                    "Delete progress for every lesson in \"{}\"? (yes/no)",
                    course.name()
                ));
                session.state = SessionState::AwaitingResetAllConfirm;
            }
            _ => {
                out.push(view::lesson_menu_help(count));
                self.show_lesson_menu(session, out).await;
            }
        }
    }

    async fn on_reset_all_confirm(&self, session: &mut Session, input: &str, out: &mut Vec<String>) {
        let Some(course) = self.course(session) else {
            self.show_course_menu(session, out);
            return;
        };
        if is_yes(input) {
            match self.store.reset_course(course.name()).await {
                Ok(_) => out.push(format!("All progress in \"{}\" has been reset.", course.name())),
                Err(err) => {
                    warn!(course = course.name(), error = %err, "course reset failed");
                    out.push("Progress could not be reset.".to_owned());
                }
            }
        } else {
            out.push("Nothing was reset.".to_owned());
        }
        self.show_lesson_menu(session, out).await;
    }

    async fn on_restart_confirm(
        &self,
        session: &mut Session,
        lesson_index: usize,
        input: &str,
        out: &mut Vec<String>,
    ) {
        let Some(course) = self.course(session) else {
            self.show_course_menu(session, out);
            return;
        };
        let Some(lesson) = course.lesson(lesson_index) else {
            self.show_lesson_menu(session, out).await;
            return;
        };
        if !is_yes(input) {
            out.push("Keeping your completed lesson.".to_owned());
            self.show_lesson_menu(session, out).await;
            return;
        }
        let progress = Progress::new(course.name(), lesson.name());
        self.save(&progress).await;
        self.begin(session, lesson_index, progress, out).await;
    }

    // ─── LESSON FLOW ───────────────────────────────────────────────────────────

    async fn open_lesson(&self, session: &mut Session, lesson_index: usize, out: &mut Vec<String>) {
        let Some(course) = self.course(session) else {
            self.show_course_menu(session, out);
            return;
        };
        let Some(lesson) = course.lesson(lesson_index) else {
            self.show_lesson_menu(session, out).await;
            return;
        };
        let mut progress = self.store.get(course.name(), lesson.name()).await;
        if !progress.is_consistent_with(lesson) {
            warn!(
                course = course.name(),
                lesson = lesson.name(),
                "saved progress does not fit the lesson; starting over"
            );
            progress = Progress::new(course.name(), lesson.name());
        }
        if progress.completed {
            out.push(format!(
                "You have already completed \"{}\". Start it again? (yes/no)",
                lesson.title()
            ));
            session.state = SessionState::AwaitingRestartConfirm {
                lesson: lesson_index,
            };
            return;
        }
        self.begin(session, lesson_index, progress, out).await;
    }

    async fn begin(
        &self,
        session: &mut Session,
        lesson_index: usize,
        progress: Progress,
        out: &mut Vec<String>,
    ) {
        if let Some(lesson) = self.course(session).and_then(|c| c.lesson(lesson_index)) {
            out.extend(view::lesson_banner(lesson));
            if progress.current_question > 1 {
                out.push(format!(
                    "Resuming at question {} of {}.",
                    progress.current_question,
                    lesson.len()
                ));
            }
            info!(lesson = lesson.name(), question = progress.current_question, "lesson started");
        }
        session.active = Some(ActiveLesson {
            lesson: lesson_index,
            progress,
        });
        self.present(session, out).await;
    }

    /// Shows the current question, running setup snippets and skipping past
    /// display-only questions, and moves to the state that awaits its input.
    async fn present(&self, session: &mut Session, out: &mut Vec<String>) {
        let Some(lesson) = self.current_lesson(session) else {
            self.show_lesson_menu(session, out).await;
            return;
        };
        loop {
            session.state = SessionState::Displaying;
            let Some(active) = session.active.as_mut() else {
                return;
            };
            let index = active.progress.current_question;
            let Some(question) = index.checked_sub(1).and_then(|i| lesson.question(i)) else {
                self.finish_lesson(session, lesson, out).await;
                return;
            };

            if let Some(setup) = question.setup() {
                let result = evaluate(setup, &mut session.context);
                if let Some(err) = result.error() {
                    warn!(question = index, error = %err, "setup snippet failed");
                }
            }
            out.extend(question.display(self.renderer.as_ref()));

            match question.kind() {
                QuestionKind::Message => {
                    active.progress.advance();
                    self.save(&active.progress).await;
                }
                QuestionKind::ConfirmLink { .. } => {
                    out.push("Open this link? (yes/no)".to_owned());
                    session.state = SessionState::AwaitingAnswer { attempt: 1 };
                    return;
                }
                QuestionKind::MultiStep(multi) => {
                    let mut step = active.progress.current_step().unwrap_or(1);
                    let course = session.course.unwrap_or_default();
                    let fragments = match session.parked.take() {
                        Some(parked) if parked.resumes(course, active.lesson, index, step) => {
                            parked.fragments
                        }
                        other => {
                            session.parked = other;
                            Vec::new()
                        }
                    };
                    let restarted = step > 1 && fragments.is_empty();
                    if restarted {
                        out.push(view::STEPS_RESTARTED.to_owned());
                        step = 1;
                    }
                    active.progress.multistep_cursor.insert(index, step);
                    if restarted {
                        self.save(&active.progress).await;
                    }
                    if step > multi.required_steps() {
                        out.push(view::ALL_STEPS_ENTERED.to_owned());
                    } else {
                        out.push(view::step_prompt(multi, step, self.renderer.as_ref()));
                    }
                    session.state = SessionState::MultiStep { step, fragments };
                    return;
                }
                _ => {
                    let attempt = (active.progress.attempts + 1).min(self.config.max_attempts);
                    if attempt > 1 {
                        out.push(format!(
                            "(attempt {attempt} of {})",
                            self.config.max_attempts
                        ));
                    }
                    session.state = SessionState::AwaitingAnswer { attempt };
                    return;
                }
            }
        }
    }

    async fn finish_lesson(&self, session: &mut Session, lesson: &Lesson, out: &mut Vec<String>) {
        if let Some(active) = session.active.as_mut() {
            let progress = &mut active.progress;
            progress.completed = true;
            progress.current_question = lesson.len() + 1;
            progress.attempts = 0;
            progress.multistep_cursor.clear();
            self.save(progress).await;
            out.push(format!(
                "Lesson complete: {} of {} scored questions correct.",
                progress.correct_answers,
                lesson.scored_count()
            ));
            info!(
                lesson = lesson.name(),
                correct = progress.correct_answers,
                "lesson completed"
            );
        }
        out.push("Press Enter to return to the lesson menu.".to_owned());
        session.state = SessionState::Complete;
    }

    async fn on_answer(&self, session: &mut Session, attempt: u32, input: &str, out: &mut Vec<String>) {
        let Some(lesson) = self.current_lesson(session) else {
            self.show_lesson_menu(session, out).await;
            return;
        };
        let Some(active) = session.active.as_mut() else {
            return;
        };
        let index = active.progress.current_question;
        let Some(question) = index.checked_sub(1).and_then(|i| lesson.question(i)) else {
            self.present(session, out).await;
            return;
        };
        let renderer = self.renderer.as_ref();

        let raw = match AnswerCommand::parse(input, false) {
            AnswerCommand::Hint => {
                out.push(view::hint_line(question.hint(), renderer));
                return;
            }
            AnswerCommand::Skip => {
                out.push("Skipped.".to_owned());
                active.progress.advance();
                self.save(&active.progress).await;
                self.present(session, out).await;
                return;
            }
            AnswerCommand::Menu => {
                self.leave_to_menu(session, out).await;
                return;
            }
            AnswerCommand::Exit => {
                self.leave_session(session, out).await;
                return;
            }
            AnswerCommand::Done | AnswerCommand::Answer(_) => input,
        };

        if let QuestionKind::ConfirmLink { url } = question.kind() {
            if is_yes(raw) {
                out.push(format!("Opening {url}"));
            }
            active.progress.advance();
            self.save(&active.progress).await;
            self.present(session, out).await;
            return;
        }

        if raw.is_empty() {
            out.push("Type an answer, or `hint`, `skip`, `menu`, `exit`.".to_owned());
            return;
        }

        let (_, outcome) = question.check(raw, &mut session.context);
        let max = self.config.max_attempts;
        active.progress.attempts = attempt;
        debug!(question = index, attempt, correct = outcome.correct, "answer checked");

        if outcome.correct {
            out.push(outcome.message);
            active.progress.correct_answers += 1;
            active.progress.advance();
            self.save(&active.progress).await;
            self.present(session, out).await;
        } else if attempt >= max {
            out.push(outcome.message);
            out.push(format!("The answer was: {}", question.reveal()));
            if let Some(hint) = question.hint() {
                out.push(format!("Hint: {}", hint.render(renderer)));
            }
            active.progress.advance();
            self.save(&active.progress).await;
            self.present(session, out).await;
        } else {
            out.push(outcome.message);
            out.push(format!("Try again (attempt {} of {max}).", attempt + 1));
            self.save(&active.progress).await;
            session.state = SessionState::AwaitingAnswer {
                attempt: attempt + 1,
            };
        }
    }

    async fn on_step(
        &self,
        session: &mut Session,
        step: usize,
        mut fragments: Vec<String>,
        input: &str,
        out: &mut Vec<String>,
    ) {
        let Some(lesson) = self.current_lesson(session) else {
            self.show_lesson_menu(session, out).await;
            return;
        };
        let Some(active) = session.active.as_mut() else {
            return;
        };
        let index = active.progress.current_question;
        let Some(question) = index.checked_sub(1).and_then(|i| lesson.question(i)) else {
            self.present(session, out).await;
            return;
        };
        let Some(multi) = question.as_multi_step() else {
            self.present(session, out).await;
            return;
        };
        let renderer = self.renderer.as_ref();
        let required = multi.required_steps();

        match AnswerCommand::parse(input, true) {
            AnswerCommand::Hint => {
                let hint = multi.step_hint(step).or_else(|| question.hint());
                out.push(view::hint_line(hint, renderer));
            }
            AnswerCommand::Skip => {
                out.push("Skipped.".to_owned());
                active.progress.advance();
                self.save(&active.progress).await;
                self.present(session, out).await;
            }
            AnswerCommand::Menu => self.leave_to_menu(session, out).await,
            AnswerCommand::Exit => self.leave_session(session, out).await,
            AnswerCommand::Done if step <= required => {
                out.push(view::steps_remaining(required - step + 1));
                out.push(view::step_prompt(multi, step, renderer));
            }
            AnswerCommand::Done => {
                let combined = fragments.join("\n");
                let (_, outcome) = question.check(&combined, &mut session.context);
                debug!(question = index, correct = outcome.correct, "multi-step answer checked");
                if outcome.correct {
                    out.push(outcome.message);
                    active.progress.correct_answers += 1;
                } else {
                    out.push(format!("Your steps did not produce the expected result. {}", outcome.message));
                    out.push(format!("The answer was: {}", question.reveal()));
                }
                active.progress.advance();
                self.save(&active.progress).await;
                self.present(session, out).await;
            }
            AnswerCommand::Answer(_) if step > required => {
                out.push(view::ALL_STEPS_ENTERED.to_owned());
            }
            AnswerCommand::Answer("") => {
                out.push(view::step_prompt(multi, step, renderer));
            }
            AnswerCommand::Answer(fragment) => {
                match question.evaluate_input(fragment, &mut session.context).into_result() {
                    Err(err) => {
                        out.push(format!("That step did not run: {err}"));
                        out.push(view::step_prompt(multi, step, renderer));
                    }
                    Ok(value) => {
                        out.push(format!("=> {value}"));
                        fragments.push(fragment.to_owned());
                        let next = step + 1;
                        active.progress.multistep_cursor.insert(index, next);
                        self.save(&active.progress).await;
                        if next > required {
                            out.push(view::ALL_STEPS_ENTERED.to_owned());
                        } else {
                            out.push(view::step_prompt(multi, next, renderer));
                        }
                        session.state = SessionState::MultiStep {
                            step: next,
                            fragments,
                        };
                    }
                }
            }
        }
    }

    // ─── LEAVING ───────────────────────────────────────────────────────────────

    async fn leave_to_menu(&self, session: &mut Session, out: &mut Vec<String>) {
        self.persist(session).await;
        park_steps(session);
        session.active = None;
        self.show_lesson_menu(session, out).await;
    }

    async fn leave_session(&self, session: &mut Session, out: &mut Vec<String>) {
        self.persist(session).await;
        session.active = None;
        session.state = SessionState::Ended;
        out.push(view::GOODBYE.to_owned());
    }

    async fn persist(&self, session: &Session) {
        if let Some(active) = &session.active {
            self.save(&active.progress).await;
        }
    }

    async fn save(&self, progress: &Progress) {
        if let Err(err) = self.store.save(progress).await {
            warn!(
                record = %progress.key().record_name(),
                error = %err,
                "failed to save progress"
            );
        }
    }

    fn course(&self, session: &Session) -> Option<&Course> {
        session.course.and_then(|i| self.courses.get(i))
    }

    fn current_lesson(&self, session: &Session) -> Option<&Lesson> {
        let active = session.active.as_ref()?;
        self.course(session)?.lesson(active.lesson)
    }
}

/// Keeps the fragments of an unfinished multi-step question so reopening the
/// lesson in this session can pick up where the learner stopped.
fn park_steps(session: &mut Session) {
    let SessionState::MultiStep { fragments, .. } = &session.state else {
        return;
    };
    let (Some(course), Some(active)) = (session.course, session.active.as_ref()) else {
        return;
    };
    if fragments.is_empty() {
        return;
    }
    session.parked = Some(ParkedSteps {
        course,
        lesson: active.lesson,
        question: active.progress.current_question,
        fragments: fragments.clone(),
    });
}
