//! End-to-end session scenarios with scripted collaborators

use async_trait::async_trait;
use quizpilot::{
    AnswerProvider, AuthCredential, AuthStore, Captcha, Category, FetchOutcome, LoginTicket,
    LoginTransport, ModelChoice, PollOutcome, ProviderError, Question, QuizTransport,
    SessionController, SessionEvent, SessionOutcome, SessionState, TransportError,
    VerificationRequest, VerificationResponse,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

const QR_URL: &str = "https://example/qr?code=abc";

/// Enable log output for a test run via RUST_LOG; repeated calls are no-ops.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init();
}

/// Login transport that replays a scripted poll sequence.
struct ScriptedLogin {
    polls: Mutex<VecDeque<PollOutcome>>,
}

impl ScriptedLogin {
    fn new(polls: Vec<PollOutcome>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
        }
    }

    fn instant() -> Self {
        Self::new(vec![PollOutcome::Authenticated(credential())])
    }
}

#[async_trait]
impl LoginTransport for ScriptedLogin {
    async fn get_ticket(&self) -> Result<LoginTicket, quizpilot::AuthError> {
        Ok(LoginTicket {
            auth_code: "abc".to_string(),
            url: QR_URL.to_string(),
            expires_in: 180,
        })
    }

    async fn poll_status(&self, _auth_code: &str) -> PollOutcome {
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PollOutcome::Pending)
    }
}

/// Quiz transport that replays a scripted fetch sequence and records what
/// was submitted.
struct ScriptedQuiz {
    fetches: Mutex<VecDeque<FetchOutcome>>,
    categories: Vec<Category>,
    captcha: Captcha,
    verification_verdict: bool,
    answers: Mutex<Vec<(u64, String)>>,
    verifications: Mutex<Vec<(String, String, Vec<u64>)>>,
}

impl ScriptedQuiz {
    fn new(fetches: Vec<FetchOutcome>) -> Self {
        Self {
            fetches: Mutex::new(fetches.into()),
            verification_verdict: true,
            categories: vec![
                Category {
                    id: 1,
                    label: "animals".to_string(),
                },
                Category {
                    id: 2,
                    label: "plants".to_string(),
                },
            ],
            captcha: Captcha {
                image_url: "https://example/captcha.png".to_string(),
                token: "tok-1".to_string(),
            },
            answers: Mutex::new(Vec::new()),
            verifications: Mutex::new(Vec::new()),
        }
    }

    /// Make the upstream reject every verification submission.
    fn rejecting_verification(mut self) -> Self {
        self.verification_verdict = false;
        self
    }
}

#[async_trait]
impl QuizTransport for ScriptedQuiz {
    async fn fetch_next(
        &self,
        _credential: &AuthCredential,
    ) -> Result<FetchOutcome, TransportError> {
        Ok(self
            .fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FetchOutcome::NoMoreQuestions))
    }

    async fn submit_answer(
        &self,
        _credential: &AuthCredential,
        question: &Question,
        answer: &str,
    ) -> Result<(), TransportError> {
        self.answers
            .lock()
            .unwrap()
            .push((question.id, answer.to_string()));
        Ok(())
    }

    async fn get_categories(
        &self,
        _credential: &AuthCredential,
    ) -> Result<Vec<Category>, TransportError> {
        Ok(self.categories.clone())
    }

    async fn get_captcha(&self, _credential: &AuthCredential) -> Result<Captcha, TransportError> {
        Ok(self.captcha.clone())
    }

    async fn submit_verification(
        &self,
        _credential: &AuthCredential,
        code: &str,
        token: &str,
        ids: &[u64],
    ) -> Result<bool, TransportError> {
        self.verifications
            .lock()
            .unwrap()
            .push((code.to_string(), token.to_string(), ids.to_vec()));
        Ok(self.verification_verdict)
    }
}

struct FixedProvider(&'static str);

#[async_trait]
impl AnswerProvider for FixedProvider {
    async fn ask(&self, _question: &str) -> Result<String, ProviderError> {
        Ok(self.0.to_string())
    }
}

struct FailingProvider;

#[async_trait]
impl AnswerProvider for FailingProvider {
    async fn ask(&self, _question: &str) -> Result<String, ProviderError> {
        Err(ProviderError("model unavailable".to_string()))
    }
}

fn credential() -> AuthCredential {
    AuthCredential::new("token", "csrf", "42", "sid=1")
}

fn question(id: u64, text: &str) -> FetchOutcome {
    FetchOutcome::Question(Question {
        id,
        text: text.to_string(),
    })
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Deliver a verification answer, retrying until the worker's gate wait is
/// registered (the request event is emitted just before the wait starts).
async fn deliver(controller: &SessionController, response: VerificationResponse) {
    while !controller.resolve_verification(response.clone()).await {
        tokio::task::yield_now().await;
    }
}

/// Wait for the next VerificationNeeded event, skipping everything else.
async fn next_verification(rx: &mut broadcast::Receiver<SessionEvent>) -> VerificationRequest {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a verification request")
            .expect("event stream closed");
        if let SessionEvent::VerificationNeeded(request) = event {
            return request;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_login_then_answers_until_completed() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let quiz = Arc::new(ScriptedQuiz::new(vec![question(7, "2+2=?")]));
    let login = Arc::new(ScriptedLogin::new(vec![
        PollOutcome::Pending,
        PollOutcome::Pending,
        PollOutcome::Authenticated(credential()),
    ]));
    let store = AuthStore::with_path(dir.path().join("auth.json"));
    let controller = SessionController::new(
        quiz.clone(),
        Arc::new(FixedProvider("4")),
        login,
        store.clone(),
    );
    let mut rx = controller.subscribe();

    controller.start(ModelChoice::DeepSeek).await.unwrap();
    let outcome = controller.join().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Completed);

    // The answer made it upstream.
    assert_eq!(*quiz.answers.lock().unwrap(), vec![(7, "4".to_string())]);
    // The credential was persisted for the next run.
    assert!(store.load().unwrap().is_some());

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::QrReady { url } if url == QR_URL)));
    let states: Vec<SessionState> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            SessionState::Authenticating,
            SessionState::Running,
            SessionState::Stopped
        ]
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::Finished(SessionOutcome::Completed))));
}

#[tokio::test]
async fn verification_episode_resolves_and_session_resumes() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let quiz = Arc::new(ScriptedQuiz::new(vec![
        FetchOutcome::VerificationRequired,
        question(9, "capital of France?"),
    ]));
    let controller = SessionController::new(
        quiz.clone(),
        Arc::new(FixedProvider("Paris")),
        Arc::new(ScriptedLogin::instant()),
        AuthStore::with_path(dir.path().join("auth.json")),
    );
    let mut rx = controller.subscribe();

    controller.start(ModelChoice::Gemini).await.unwrap();

    // Category selection always comes first within an episode.
    let request = next_verification(&mut rx).await;
    match request {
        VerificationRequest::CategorySelection { candidates } => {
            assert_eq!(candidates.len(), 2);
            assert_eq!(candidates[0].label, "animals");
        }
        other => panic!("expected category selection, got {:?}", other),
    }
    deliver(&controller, VerificationResponse::Categories(vec![1])).await;

    // Then the captcha.
    let request = next_verification(&mut rx).await;
    match request {
        VerificationRequest::CaptchaChallenge { image_url } => {
            assert_eq!(image_url, "https://example/captcha.png");
        }
        other => panic!("expected captcha challenge, got {:?}", other),
    }
    deliver(&controller, VerificationResponse::Captcha("ab12".to_string())).await;

    let outcome = controller.join().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Completed);

    // Both pieces were submitted together.
    assert_eq!(
        *quiz.verifications.lock().unwrap(),
        vec![("ab12".to_string(), "tok-1".to_string(), vec![1])]
    );
    // The session resumed and answered the follow-up question.
    assert_eq!(*quiz.answers.lock().unwrap(), vec![(9, "Paris".to_string())]);
}

#[tokio::test]
async fn stop_while_awaiting_verification_ends_as_stopped_by_user() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let controller = SessionController::new(
        Arc::new(ScriptedQuiz::new(vec![FetchOutcome::VerificationRequired])),
        Arc::new(FixedProvider("4")),
        Arc::new(ScriptedLogin::instant()),
        AuthStore::with_path(dir.path().join("auth.json")),
    );
    let mut rx = controller.subscribe();

    controller.start(ModelChoice::DeepSeek).await.unwrap();
    let _request = next_verification(&mut rx).await;

    // The gate wait is in flight now; stop must cancel it promptly.
    let outcome = timeout(Duration::from_secs(5), controller.stop())
        .await
        .expect("stop did not return promptly");
    assert_eq!(outcome, Some(SessionOutcome::StoppedByUser));
}

#[tokio::test(start_paused = true)]
async fn unanswered_verification_times_out_as_abandoned() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let controller = SessionController::new(
        Arc::new(ScriptedQuiz::new(vec![FetchOutcome::VerificationRequired])),
        Arc::new(FixedProvider("4")),
        Arc::new(ScriptedLogin::instant()),
        AuthStore::with_path(dir.path().join("auth.json")),
    );

    controller.start(ModelChoice::DeepSeek).await.unwrap();
    // Nobody answers; the 30-second gate timeout fires under paused time.
    let outcome = controller.join().await.unwrap();
    assert_eq!(outcome, SessionOutcome::VerificationAbandoned);
}

#[tokio::test]
async fn rejected_verification_submits_are_bounded() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let quiz = Arc::new(
        ScriptedQuiz::new(vec![FetchOutcome::VerificationRequired]).rejecting_verification(),
    );
    let controller = Arc::new(SessionController::new(
        quiz.clone(),
        Arc::new(FixedProvider("4")),
        Arc::new(ScriptedLogin::instant()),
        AuthStore::with_path(dir.path().join("auth.json")),
    ));
    let mut rx = controller.subscribe();

    controller.start(ModelChoice::DeepSeek).await.unwrap();
    // Answers keep routing while another task sits in join.
    let joiner = tokio::spawn({
        let controller = controller.clone();
        async move { controller.join().await }
    });

    // Three full episodes, each rejected upstream.
    for _ in 0..3 {
        match next_verification(&mut rx).await {
            VerificationRequest::CategorySelection { .. } => {}
            other => panic!("expected category selection, got {:?}", other),
        }
        deliver(&controller, VerificationResponse::Categories(vec![1])).await;
        match next_verification(&mut rx).await {
            VerificationRequest::CaptchaChallenge { .. } => {}
            other => panic!("expected captcha challenge, got {:?}", other),
        }
        deliver(&controller, VerificationResponse::Captcha("bad".to_string())).await;
    }

    let outcome = joiner.await.unwrap();
    assert_eq!(outcome, Some(SessionOutcome::VerificationAbandoned));
    // No fourth submission past the retry bound.
    assert_eq!(quiz.verifications.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn answerer_cancel_abandons_the_session() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let controller = SessionController::new(
        Arc::new(ScriptedQuiz::new(vec![FetchOutcome::VerificationRequired])),
        Arc::new(FixedProvider("4")),
        Arc::new(ScriptedLogin::instant()),
        AuthStore::with_path(dir.path().join("auth.json")),
    );
    let mut rx = controller.subscribe();

    controller.start(ModelChoice::DeepSeek).await.unwrap();
    let _request = next_verification(&mut rx).await;
    deliver(&controller, VerificationResponse::Cancelled).await;

    let outcome = controller.join().await.unwrap();
    assert_eq!(outcome, SessionOutcome::VerificationAbandoned);
}

#[tokio::test]
async fn failing_provider_skips_question_and_completes() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let quiz = Arc::new(ScriptedQuiz::new(vec![question(3, "2+2=?")]));
    let controller = SessionController::new(
        quiz.clone(),
        Arc::new(FailingProvider),
        Arc::new(ScriptedLogin::instant()),
        AuthStore::with_path(dir.path().join("auth.json")),
    );

    controller.start(ModelChoice::Custom).await.unwrap();
    let outcome = controller.join().await.unwrap();

    // The question was skipped, not fatal for the session.
    assert_eq!(outcome, SessionOutcome::Completed);
    assert!(quiz.answers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cached_credential_skips_login_polling() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let store = AuthStore::with_path(dir.path().join("auth.json"));
    store.save(&credential()).unwrap();

    // A login transport that would fail the test if ever polled.
    let login = Arc::new(ScriptedLogin::new(vec![PollOutcome::Expired]));
    let controller = SessionController::new(
        Arc::new(ScriptedQuiz::new(vec![])),
        Arc::new(FixedProvider("4")),
        login.clone(),
        store,
    );
    let mut rx = controller.subscribe();

    controller.start(ModelChoice::DeepSeek).await.unwrap();
    let outcome = controller.join().await.unwrap();
    assert_eq!(outcome, SessionOutcome::Completed);

    // No QR ticket was ever issued.
    assert!(!drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SessionEvent::QrReady { .. })));
    assert_eq!(login.polls.lock().unwrap().len(), 1);
}
