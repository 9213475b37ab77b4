//! Conversation controller
//!
//! Owns the transcript and the current question, turns submitted text into
//! remote operations, and resolves each operation's placeholder message once
//! its result arrives. At most one operation is outstanding at a time; a
//! submission made while one is in flight is rejected without touching the
//! transcript.
//!
//! Remote calls run as spawned tasks and report back over a channel. The
//! owner of the controller applies those completions on its own task via
//! [`Controller::try_settle`] or [`Controller::settle_next`], so every
//! mutation of controller state happens on a single task.

use tokio::sync::mpsc;

use crate::client::{DynExamBackend, GradeRequest};
use crate::config::Config;
use crate::error::ClientError;
use crate::locale::{Locale, Strings};
use crate::state::{Message, MessageHandle, MessagePatch, Transcript};

/// Submitting exactly this (after trimming) asks for a new question.
pub const NEW_QUESTION_TOKEN: &str = "！";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Generate,
    Grade,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPayload {
    Question { institution: String },
    Grade(GradeRequest),
}

/// One in-flight remote call and the placeholder it will resolve.
#[derive(Debug, Clone)]
pub struct RemoteOperation {
    pub id: u64,
    pub kind: OperationKind,
    pub request: RequestPayload,
    pub target: MessageHandle,
}

/// Result of a remote call, delivered back to the controller's task.
#[derive(Debug)]
pub struct Completion {
    pub id: u64,
    pub result: Result<String, ClientError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingQuestion,
    AwaitingGrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// Another operation is still outstanding; nothing happened.
    Busy,
    Issued(OperationKind),
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub institution: String,
    pub min_words: u32,
    pub max_words: u32,
    pub locale: Locale,
    pub status_badges: bool,
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        let (min_words, max_words) = config.word_limits();
        Self {
            institution: config.institution(),
            min_words,
            max_words,
            locale: config.locale(),
            status_badges: config.status_badges(),
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Controller {
    backend: DynExamBackend,
    transcript: Transcript,
    question_context: String,
    in_flight: Option<RemoteOperation>,
    next_operation_id: u64,
    institution: String,
    min_words: u32,
    max_words: u32,
    strings: &'static Strings,
    status_badges: bool,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Controller {
    pub fn new(backend: DynExamBackend, options: ControllerOptions) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            transcript: Transcript::new(),
            question_context: String::new(),
            in_flight: None,
            next_operation_id: 0,
            institution: options.institution,
            min_words: options.min_words,
            max_words: options.max_words,
            strings: options.locale.strings(),
            status_badges: options.status_badges,
            completions_tx,
            completions_rx,
        }
    }

    // Accessors
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn question_context(&self) -> &str {
        &self.question_context
    }

    pub fn in_flight(&self) -> Option<&RemoteOperation> {
        self.in_flight.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> ControllerState {
        match self.in_flight.as_ref().map(|op| op.kind) {
            None => ControllerState::Idle,
            Some(OperationKind::Generate) => ControllerState::AwaitingQuestion,
            Some(OperationKind::Grade) => ControllerState::AwaitingGrade,
        }
    }

    pub fn institution(&self) -> &str {
        &self.institution
    }

    /// Takes effect for the next question request.
    pub fn set_institution(&mut self, institution: impl Into<String>) {
        self.institution = institution.into();
    }

    pub fn strings(&self) -> &'static Strings {
        self.strings
    }

    /// Session start: fetch the first question without echoing anything.
    pub fn start(&mut self) -> SubmitOutcome {
        if self.is_busy() {
            return SubmitOutcome::Busy;
        }
        self.issue_question();
        SubmitOutcome::Issued(OperationKind::Generate)
    }

    /// Route one submission from the input surface.
    pub fn submit(&mut self, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::Ignored;
        }
        if self.is_busy() {
            tracing::debug!("submission rejected while an operation is outstanding");
            return SubmitOutcome::Busy;
        }

        self.transcript.append(Message::user(text));

        if text == NEW_QUESTION_TOKEN {
            self.issue_question();
            SubmitOutcome::Issued(OperationKind::Generate)
        } else {
            // Snapshot now; the grade must not see a later question.
            let request = GradeRequest {
                problem: self.question_context.clone(),
                answer: text.to_string(),
                min_words: self.min_words,
                max_words: self.max_words,
            };
            self.issue_grade(request);
            SubmitOutcome::Issued(OperationKind::Grade)
        }
    }

    fn issue_question(&mut self) {
        let institution = self.institution.clone();
        let target = self.append_placeholder(self.strings.generating);
        let id = self.next_id();

        tracing::info!(id, %institution, "requesting question");

        let backend = self.backend.clone();
        let tx = self.completions_tx.clone();
        let request_institution = institution.clone();
        tokio::spawn(async move {
            let result = backend.request_question(&request_institution).await;
            let _ = tx.send(Completion { id, result });
        });

        self.in_flight = Some(RemoteOperation {
            id,
            kind: OperationKind::Generate,
            request: RequestPayload::Question { institution },
            target,
        });
    }

    fn issue_grade(&mut self, request: GradeRequest) {
        let target = self.append_placeholder(self.strings.grading);
        let id = self.next_id();

        tracing::info!(id, problem_empty = request.problem.is_empty(), "requesting grade");

        let backend = self.backend.clone();
        let tx = self.completions_tx.clone();
        let payload = request.clone();
        tokio::spawn(async move {
            let result = backend.request_grade(&payload).await;
            let _ = tx.send(Completion { id, result });
        });

        self.in_flight = Some(RemoteOperation {
            id,
            kind: OperationKind::Grade,
            request: RequestPayload::Grade(request),
            target,
        });
    }

    fn append_placeholder(&mut self, label: &str) -> MessageHandle {
        let placeholder = if self.status_badges {
            Message::provisional(label)
        } else {
            Message::pending()
        };
        self.transcript.append(placeholder)
    }

    fn next_id(&mut self) -> u64 {
        self.next_operation_id += 1;
        self.next_operation_id
    }

    /// Apply every completion that has already arrived. Never blocks.
    pub fn try_settle(&mut self) -> usize {
        let mut settled = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if self.apply(completion).is_some() {
                settled += 1;
            }
        }
        settled
    }

    /// Wait for the outstanding operation to finish and apply it.
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn settle_next(&mut self) -> Option<OperationKind> {
        while self.in_flight.is_some() {
            let completion = self.completions_rx.recv().await?;
            if let Some(kind) = self.apply(completion) {
                return Some(kind);
            }
        }
        None
    }

    fn apply(&mut self, completion: Completion) -> Option<OperationKind> {
        let operation = match self.in_flight.take() {
            Some(op) if op.id == completion.id => op,
            other => {
                tracing::warn!(id = completion.id, "dropping completion for an unknown operation");
                self.in_flight = other;
                return None;
            }
        };

        let content = match completion.result {
            Ok(text) => {
                tracing::info!(id = operation.id, kind = ?operation.kind, "operation settled");
                if operation.kind == OperationKind::Generate {
                    self.question_context = text.clone();
                }
                text
            }
            Err(e) => {
                tracing::warn!(id = operation.id, kind = ?operation.kind, error = %e, "operation failed");
                self.strings.error.to_string()
            }
        };

        if let Err(e) = self.transcript.update(operation.target, MessagePatch::settle(content)) {
            tracing::error!(error = %e, "could not resolve placeholder");
        }

        Some(operation.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ExamBackend;
    use crate::state::{ChatRole, RenderState};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Question(String),
        Grade(GradeRequest),
    }

    /// Backend that replays queued results and records every call.
    #[derive(Default)]
    struct ScriptedBackend {
        questions: Mutex<VecDeque<Result<String, ClientError>>>,
        grades: Mutex<VecDeque<Result<String, ClientError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedBackend {
        fn question(self, result: Result<&str, u16>) -> Self {
            self.questions.lock().unwrap().push_back(to_result(result));
            self
        }

        fn grade(self, result: Result<&str, u16>) -> Self {
            self.grades.lock().unwrap().push_back(to_result(result));
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn to_result(result: Result<&str, u16>) -> Result<String, ClientError> {
        result
            .map(str::to_string)
            .map_err(|status| ClientError::RemoteError { status })
    }

    #[async_trait]
    impl ExamBackend for ScriptedBackend {
        async fn request_question(&self, institution: &str) -> Result<String, ClientError> {
            self.calls.lock().unwrap().push(Call::Question(institution.to_string()));
            self.questions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ClientError::MalformedResponse { expected: &[] }))
        }

        async fn request_grade(&self, request: &GradeRequest) -> Result<String, ClientError> {
            self.calls.lock().unwrap().push(Call::Grade(request.clone()));
            self.grades
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ClientError::MalformedResponse { expected: &[] }))
        }
    }

    fn controller(backend: Arc<ScriptedBackend>) -> Controller {
        let options = ControllerOptions {
            institution: "Example Univ".to_string(),
            ..ControllerOptions::default()
        };
        Controller::new(backend, options)
    }

    fn contents(controller: &Controller) -> Vec<(ChatRole, String)> {
        controller
            .transcript()
            .iter()
            .map(|(_, m)| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_session_start_generates_question() {
        let backend = Arc::new(ScriptedBackend::default().question(Ok("Define entropy.")));
        let mut controller = controller(backend.clone());

        assert_eq!(controller.start(), SubmitOutcome::Issued(OperationKind::Generate));
        assert_eq!(controller.state(), ControllerState::AwaitingQuestion);

        let placeholder = controller.transcript().last().unwrap();
        assert_eq!(placeholder.render_state, RenderState::ProvisionalStatus);
        assert_eq!(placeholder.status_label.as_deref(), Some("問題を生成中"));

        assert_eq!(controller.settle_next().await, Some(OperationKind::Generate));
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.question_context(), "Define entropy.");
        assert_eq!(backend.calls(), vec![Call::Question("Example Univ".to_string())]);

        let settled = controller.transcript().last().unwrap();
        assert_eq!(controller.transcript().len(), 1);
        assert_eq!(settled.content, "Define entropy.");
        assert!(settled.is_settled());
    }

    #[tokio::test]
    async fn test_trigger_token_requests_new_question() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .question(Ok("Q1"))
                .question(Ok("Q2")),
        );
        let mut controller = controller(backend);
        controller.start();
        controller.settle_next().await;

        assert_eq!(controller.submit("  ！ "), SubmitOutcome::Issued(OperationKind::Generate));
        assert_eq!(controller.transcript().len(), 3);
        let echoed = controller.transcript().iter().nth(1).unwrap().1;
        assert_eq!(echoed.role, ChatRole::User);
        assert_eq!(echoed.content, "！");

        controller.settle_next().await;
        assert_eq!(controller.question_context(), "Q2");
        assert_eq!(
            contents(&controller),
            vec![
                (ChatRole::Assistant, "Q1".to_string()),
                (ChatRole::User, "！".to_string()),
                (ChatRole::Assistant, "Q2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_answer_is_graded_against_current_question() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .question(Ok("Define entropy."))
                .grade(Ok("Score: 7/10")),
        );
        let mut controller = controller(backend.clone());
        controller.start();
        controller.settle_next().await;

        assert_eq!(
            controller.submit("Entropy measures disorder."),
            SubmitOutcome::Issued(OperationKind::Grade)
        );
        assert_eq!(controller.state(), ControllerState::AwaitingGrade);
        assert_eq!(
            controller.transcript().last().unwrap().status_label.as_deref(),
            Some("採点中")
        );

        controller.settle_next().await;

        let expected = GradeRequest {
            problem: "Define entropy.".to_string(),
            answer: "Entropy measures disorder.".to_string(),
            min_words: 40,
            max_words: 60,
        };
        assert_eq!(backend.calls()[1], Call::Grade(expected));
        assert_eq!(controller.transcript().last().unwrap().content, "Score: 7/10");
    }

    #[tokio::test]
    async fn test_grade_captures_question_at_issue_time() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .question(Ok("Q1"))
                .grade(Ok("ok"))
                .question(Ok("Q2"))
                .grade(Ok("ok")),
        );
        let mut controller = controller(backend.clone());
        controller.start();
        controller.settle_next().await;

        controller.submit("answer one");
        match &controller.in_flight().unwrap().request {
            RequestPayload::Grade(request) => assert_eq!(request.problem, "Q1"),
            other => panic!("unexpected payload {:?}", other),
        }
        controller.settle_next().await;

        controller.submit("！");
        controller.settle_next().await;
        controller.submit("answer two");
        controller.settle_next().await;

        let problems: Vec<String> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Grade(r) => Some(r.problem),
                Call::Question(_) => None,
            })
            .collect();
        assert_eq!(problems, vec!["Q1".to_string(), "Q2".to_string()]);
    }

    #[tokio::test]
    async fn test_answer_before_any_question_uses_empty_problem() {
        let backend = Arc::new(ScriptedBackend::default().grade(Ok("ungraded")));
        let mut controller = controller(backend.clone());

        controller.submit("an early answer");
        controller.settle_next().await;

        match &backend.calls()[0] {
            Call::Grade(request) => assert_eq!(request.problem, ""),
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_whitespace_submission_is_ignored() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut controller = controller(backend.clone());

        assert_eq!(controller.submit(""), SubmitOutcome::Ignored);
        assert_eq!(controller.submit(" \t\n　"), SubmitOutcome::Ignored);

        assert!(controller.transcript().is_empty());
        assert_eq!(controller.state(), ControllerState::Idle);
        tokio::task::yield_now().await;
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submission_while_busy_is_rejected() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .question(Ok("Q1"))
                .grade(Ok("graded")),
        );
        let mut controller = controller(backend.clone());
        controller.start();

        assert_eq!(controller.submit("too early"), SubmitOutcome::Busy);
        assert_eq!(controller.submit("！"), SubmitOutcome::Busy);
        assert_eq!(controller.start(), SubmitOutcome::Busy);
        assert_eq!(controller.transcript().len(), 1);
        assert_eq!(controller.transcript().unsettled_count(), 1);

        controller.settle_next().await;
        assert_eq!(controller.submit("now"), SubmitOutcome::Issued(OperationKind::Grade));
        controller.settle_next().await;
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_grade_settles_to_error_and_recovers() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .question(Ok("Define entropy."))
                .grade(Err(500))
                .grade(Ok("Score: 9/10")),
        );
        let mut controller = controller(backend);
        controller.start();
        controller.settle_next().await;

        controller.submit("first try");
        controller.settle_next().await;

        let failed = controller.transcript().last().unwrap();
        assert!(failed.is_settled());
        assert_eq!(failed.content, controller.strings().error);
        assert_eq!(controller.question_context(), "Define entropy.");
        assert_eq!(controller.state(), ControllerState::Idle);

        assert_eq!(controller.submit("second try"), SubmitOutcome::Issued(OperationKind::Grade));
        controller.settle_next().await;
        assert_eq!(controller.transcript().last().unwrap().content, "Score: 9/10");
    }

    #[tokio::test]
    async fn test_question_context_tracks_last_successful_generation() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .question(Ok("Q1"))
                .question(Err(503))
                .question(Ok("Q3"))
                .question(Err(500)),
        );
        let mut controller = controller(backend);
        controller.start();
        controller.settle_next().await;
        assert_eq!(controller.question_context(), "Q1");

        controller.submit("！");
        controller.settle_next().await;
        assert_eq!(controller.question_context(), "Q1");

        controller.submit("！");
        controller.settle_next().await;
        assert_eq!(controller.question_context(), "Q3");

        controller.submit("！");
        controller.settle_next().await;
        assert_eq!(controller.question_context(), "Q3");
        assert_eq!(controller.transcript().unsettled_count(), 0);
    }

    #[tokio::test]
    async fn test_command_like_text_is_graded() {
        let backend = Arc::new(ScriptedBackend::default().grade(Ok("graded")));
        let mut controller = controller(backend.clone());

        for text in ["!", "！！", "/new", "！ please"] {
            assert_eq!(controller.submit(text), SubmitOutcome::Issued(OperationKind::Grade), "{text}");
            controller.settle_next().await;
        }
        assert!(backend.calls().iter().all(|c| matches!(c, Call::Grade(_))));
    }

    #[tokio::test]
    async fn test_institution_read_at_issue_time() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .question(Ok("Q1"))
                .question(Ok("Q2")),
        );
        let mut controller = controller(backend.clone());
        controller.start();
        controller.settle_next().await;

        controller.set_institution("京都大学");
        controller.submit("！");
        controller.settle_next().await;

        assert_eq!(
            backend.calls(),
            vec![
                Call::Question("Example Univ".to_string()),
                Call::Question("京都大学".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_pending_placeholder_without_badges() {
        let backend = Arc::new(ScriptedBackend::default().question(Ok("Q1")));
        let options = ControllerOptions {
            status_badges: false,
            ..ControllerOptions::default()
        };
        let mut controller = Controller::new(backend, options);
        controller.start();

        let placeholder = controller.transcript().last().unwrap();
        assert_eq!(placeholder.render_state, RenderState::Pending);
        assert_eq!(placeholder.status_label, None);
        controller.settle_next().await;
    }

    #[tokio::test]
    async fn test_try_settle_applies_ready_completions() {
        let backend = Arc::new(ScriptedBackend::default().question(Ok("Q1")));
        let mut controller = controller(backend);
        controller.start();

        while controller.try_settle() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(controller.question_context(), "Q1");
        assert_eq!(controller.try_settle(), 0);
    }

    #[tokio::test]
    async fn test_settle_next_when_idle() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut controller = controller(backend);
        assert_eq!(controller.settle_next().await, None);
    }
}
