//! Question-flow state machine.
//!
//! `Session` consumes one `QuizEvent` at a time and answers with the
//! `Command`s the runtime must execute (start or stop the ticker, call the
//! gateway, feed a follow-up event back in). It never performs I/O itself,
//! which keeps every transition testable without a clock or a network.

use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::config::{GradingMode, QuizConfig, TimerMode};
use crate::error::{GatewayError, LoadError, QuizError, SessionError, ValidationError};
use crate::gateway::{
    ExplanationRequest, GatewayCall, GeneratedQuiz, GenerateRequest, QuizResults, SubmitRequest,
};
use crate::grading;
use crate::model::{Answer, Level, Question, TIMEOUT_SENTINEL};
use crate::timer::{self, Countdown, Tick, TimerDisplay, TimerToken};

/// Validated quiz parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSetup {
    pub topic: String,
    pub level: Level,
    pub count: u32,
}

impl QuizSetup {
    pub fn new(topic: &str, level: Level, count: i64) -> Result<Self, ValidationError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        let count = u32::try_from(count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| ValidationError::InvalidCount(count.to_string()))?;
        Ok(Self { topic: topic.to_string(), level, count })
    }

    /// Validate raw form input.
    pub fn parse(topic: &str, level: &str, count: &str) -> Result<Self, ValidationError> {
        if topic.trim().is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        let level: Level = level.parse()?;
        let count: i64 = count
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidCount(count.to_string()))?;
        Self::new(topic, level, count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    /// Waiting for generated questions. Start is disabled.
    Loading,
    Playing,
    /// Waiting for the service to grade. Navigation is disabled.
    Submitting,
    Results,
}

/// Message shown on the setup view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Invalid(ValidationError),
    Failed(String),
    /// The service returned fewer questions than requested.
    PartialResult { requested: u32, received: usize },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Invalid(e) => write!(f, "{}", e),
            Notice::Failed(message) => write!(f, "{}", message),
            Notice::PartialResult { requested, received } => write!(
                f,
                "Could not generate the requested number of questions ({}). Received {}. \
                 Please try different parameters or a broader topic.",
                requested, received
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplanationState {
    Loading,
    Loaded(String),
    Failed(String),
}

/// Expandable explanation under one result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplanationPanel {
    pub open: bool,
    pub state: Option<ExplanationState>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayReply {
    Quiz(GeneratedQuiz),
    Results(QuizResults),
    Explanation { index: usize, text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuizEvent {
    StartRequested { topic: String, level: String, count: String },
    UserAnswered { index: usize, key: Option<String> },
    UserAdvanced,
    UserRetreated,
    TimerTicked(TimerToken),
    TimerExpired(TimerToken),
    GatewayResponded { epoch: u64, reply: GatewayReply },
    GatewayFailed { epoch: u64, call: GatewayCall, question: Option<usize>, error: GatewayError },
    ExplanationToggled(usize),
    RestartRequested,
    Quit,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Generate { epoch: u64, request: GenerateRequest },
    Submit { epoch: u64, request: SubmitRequest },
    Explain { epoch: u64, index: usize, request: ExplanationRequest },
    StartTimer { token: TimerToken, seconds: u32 },
    CancelTimer,
    /// Process this event right after the current one has been rendered.
    Dispatch(QuizEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub grading: GradingMode,
    pub timer: TimerMode,
    pub allow_previous: bool,
}

impl From<&QuizConfig> for SessionOptions {
    fn from(config: &QuizConfig) -> Self {
        Self { grading: config.grading, timer: config.timer, allow_previous: config.allow_previous }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    options: SessionOptions,
    /// Bumped on every start and restart; replies tagged with an older
    /// epoch are dropped.
    epoch: u64,
    phase: Phase,
    setup: Option<QuizSetup>,
    questions: Vec<Question>,
    answers: Vec<Answer>,
    index: usize,
    time_limit: Option<u32>,
    countdown: Countdown,
    results: Option<QuizResults>,
    panels: Vec<ExplanationPanel>,
    notice: Option<Notice>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            epoch: 0,
            phase: Phase::Setup,
            setup: None,
            questions: Vec::new(),
            answers: Vec::new(),
            index: 0,
            time_limit: None,
            countdown: Countdown::new(),
            results: None,
            panels: Vec::new(),
            notice: None,
        }
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn setup(&self) -> Option<&QuizSetup> {
        self.setup.as_ref()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Playing => self.questions.get(self.index),
            _ => None,
        }
    }

    pub fn is_last_question(&self) -> bool {
        self.index + 1 == self.questions.len()
    }

    /// Seconds per question for this quiz, `None` when untimed.
    pub fn time_limit(&self) -> Option<u32> {
        self.time_limit
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn timer_display(&self) -> TimerDisplay {
        self.countdown.display()
    }

    pub fn results(&self) -> Option<&QuizResults> {
        self.results.as_ref()
    }

    pub fn panels(&self) -> &[ExplanationPanel] {
        &self.panels
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Apply one event. Rejected transitions are logged and leave the
    /// session unchanged.
    #[instrument(target = "quiz_session::session", skip(self), fields(phase = ?self.phase, index = self.index))]
    pub fn handle(&mut self, event: QuizEvent) -> Vec<Command> {
        let outcome: Result<Vec<Command>, QuizError> = match event {
            QuizEvent::StartRequested { topic, level, count } => self.start_session(&topic, &level, &count),
            QuizEvent::UserAnswered { index, key } => {
                self.record_answer(index, key.as_deref()).map(|_| Vec::new()).map_err(Into::into)
            }
            QuizEvent::UserAdvanced => self.advance().map_err(Into::into),
            QuizEvent::UserRetreated => self.retreat().map_err(Into::into),
            QuizEvent::TimerTicked(token) => Ok(self.on_tick(token)),
            QuizEvent::TimerExpired(token) => Ok(self.on_expired(token)),
            QuizEvent::GatewayResponded { epoch, reply } => self.on_reply(epoch, reply),
            QuizEvent::GatewayFailed { epoch, call, question, error } => {
                Ok(self.on_failure(epoch, call, question, error))
            }
            QuizEvent::ExplanationToggled(index) => self.toggle_explanation(index).map_err(Into::into),
            QuizEvent::RestartRequested => Ok(self.restart()),
            QuizEvent::Quit => Ok(self.teardown()),
        };

        debug_assert_eq!(self.answers.len(), self.questions.len());

        match outcome {
            Ok(commands) => commands,
            Err(e) => {
                warn!(error = %e, "Event rejected");
                Vec::new()
            }
        }
    }

    /// Validate the form and ask for questions. Validation failures are
    /// also kept as the setup notice.
    pub fn start_session(&mut self, topic: &str, level: &str, count: &str) -> Result<Vec<Command>, QuizError> {
        if self.phase != Phase::Setup {
            return Err(SessionError::Busy.into());
        }
        let setup = match QuizSetup::parse(topic, level, count) {
            Ok(setup) => setup,
            Err(e) => {
                self.notice = Some(Notice::Invalid(e.clone()));
                return Err(e.into());
            }
        };

        self.epoch += 1;
        self.phase = Phase::Loading;
        self.notice = None;
        info!(topic = %setup.topic, level = %setup.level, count = setup.count, epoch = self.epoch, "Requesting quiz");

        let request = GenerateRequest {
            topic: setup.topic.clone(),
            question_number: setup.count,
            level: setup.level,
        };
        self.setup = Some(setup);
        Ok(vec![Command::Generate { epoch: self.epoch, request }])
    }

    /// Install generated questions and enter play, or return to setup with a
    /// notice when the list is short or unusable.
    pub fn load_quiz(&mut self, quiz: GeneratedQuiz) -> Result<Vec<Command>, QuizError> {
        let Some(setup) = self.setup.clone() else {
            return Err(SessionError::NotPlaying.into());
        };
        let GeneratedQuiz { mut questions, time_limit } = quiz;

        let received = questions.len();
        if received == 0 || received < setup.count as usize {
            warn!(requested = setup.count, received, "Service returned fewer questions than requested");
            self.return_to_setup(Some(Notice::PartialResult { requested: setup.count, received }));
            return Ok(Vec::new());
        }
        questions.truncate(setup.count as usize);

        if let Err(e) = self.check_questions(&questions) {
            self.return_to_setup(Some(Notice::Failed(format!("Error generating quiz: {}", e))));
            return Err(e.into());
        }

        self.time_limit = match self.options.timer {
            TimerMode::Off => None,
            TimerMode::Level => Some(setup.level.time_limit_secs()),
            TimerMode::Service => Some(timer::service_time_limit(time_limit)),
        };
        self.answers = vec![Answer::Unset; questions.len()];
        self.questions = questions;
        self.index = 0;
        self.results = None;
        self.panels.clear();
        self.phase = Phase::Playing;
        info!(questions = self.questions.len(), time_limit = ?self.time_limit, "Quiz started");

        Ok(self.enter_question())
    }

    fn check_questions(&self, questions: &[Question]) -> Result<(), LoadError> {
        for (i, question) in questions.iter().enumerate() {
            if question.options.is_empty() {
                return Err(LoadError::NoOptions(i + 1));
            }
            if question.options.contains_key(TIMEOUT_SENTINEL) {
                return Err(LoadError::ReservedKey(i + 1));
            }
            if self.options.grading == GradingMode::Client && question.correct.is_none() {
                return Err(LoadError::MissingCorrect(i + 1));
            }
        }
        Ok(())
    }

    fn enter_question(&mut self) -> Vec<Command> {
        match self.time_limit {
            Some(seconds) => {
                let token = self.countdown.start(self.index, seconds);
                vec![Command::StartTimer { token, seconds }]
            }
            None => Vec::new(),
        }
    }

    /// Set the answer slot of the current question. `None` clears it.
    pub fn record_answer(&mut self, index: usize, key: Option<&str>) -> Result<(), SessionError> {
        if self.phase != Phase::Playing {
            return Err(SessionError::NotPlaying);
        }
        if index != self.index {
            return Err(SessionError::NotCurrentQuestion { index, current: self.index });
        }
        if self.answers[index] == Answer::TimedOut {
            return Err(SessionError::AnswerFrozen(index));
        }
        self.answers[index] = match key {
            Some(key) if self.questions[index].options.contains_key(key) => Answer::Chosen(key.to_string()),
            Some(key) => return Err(SessionError::UnknownOption { index, key: key.to_string() }),
            None => Answer::Unset,
        };
        debug!(index, answer = ?self.answers[index], "Answer recorded");
        Ok(())
    }

    /// Leave the current question. The timer is stopped before anything
    /// else so no late tick can touch the slot being left.
    pub fn advance(&mut self) -> Result<Vec<Command>, SessionError> {
        if self.phase != Phase::Playing {
            return Err(SessionError::NotPlaying);
        }
        let mut commands = self.stop_timer();

        if self.is_last_question() {
            self.index = self.questions.len();
            commands.extend(self.begin_scoring());
        } else {
            self.index += 1;
            debug!(index = self.index, "Advanced");
            commands.extend(self.enter_question());
        }
        Ok(commands)
    }

    /// Go back one question, keeping stored answers.
    pub fn retreat(&mut self) -> Result<Vec<Command>, SessionError> {
        if !self.options.allow_previous {
            return Err(SessionError::RetreatDisabled);
        }
        if self.phase != Phase::Playing {
            return Err(SessionError::NotPlaying);
        }
        if self.index == 0 {
            return Err(SessionError::AtFirstQuestion);
        }
        let mut commands = self.stop_timer();
        self.index -= 1;
        debug!(index = self.index, "Went back");
        commands.extend(self.enter_question());
        Ok(commands)
    }

    /// The running countdown expired: an existing selection stands, an
    /// empty slot becomes the timeout sentinel, then the quiz moves on.
    pub fn timeout_current_question(&mut self) -> Vec<Command> {
        if self.phase != Phase::Playing {
            return Vec::new();
        }
        let index = self.index;
        if self.answers[index].is_unset() {
            self.answers[index] = Answer::TimedOut;
            info!(index, "Question timed out without an answer");
        } else {
            info!(index, answer = ?self.answers[index], "Question timed out, keeping selection");
        }
        self.advance().unwrap_or_default()
    }

    fn on_tick(&mut self, token: TimerToken) -> Vec<Command> {
        match self.countdown.tick(token) {
            // render 00:00 before the expiry is processed
            Tick::Elapsed => vec![Command::Dispatch(QuizEvent::TimerExpired(token))],
            Tick::Remaining(_) => Vec::new(),
            Tick::Ignored => {
                debug!(?token, "Ignoring tick from a stale countdown");
                Vec::new()
            }
        }
    }

    fn on_expired(&mut self, token: TimerToken) -> Vec<Command> {
        if self.phase == Phase::Playing && token.question == self.index && self.countdown.expire(token) {
            self.timeout_current_question()
        } else {
            debug!(?token, "Ignoring expiry from a stale countdown");
            Vec::new()
        }
    }

    fn stop_timer(&mut self) -> Vec<Command> {
        self.countdown.cancel();
        match self.time_limit {
            Some(_) => vec![Command::CancelTimer],
            None => Vec::new(),
        }
    }

    fn begin_scoring(&mut self) -> Vec<Command> {
        match self.options.grading {
            GradingMode::Client => {
                let results = grading::grade(&self.questions, &self.answers);
                info!(score = results.score, total = results.total_questions, "Quiz finished");
                self.show_results(results);
                Vec::new()
            }
            GradingMode::Server => {
                self.phase = Phase::Submitting;
                info!(answers = ?self.answers, "Submitting quiz");
                vec![Command::Submit {
                    epoch: self.epoch,
                    request: SubmitRequest { questions: self.questions.clone(), user_answers: self.answers.clone() },
                }]
            }
        }
    }

    fn show_results(&mut self, results: QuizResults) {
        self.panels = vec![ExplanationPanel::default(); results.results.len()];
        self.results = Some(results);
        self.phase = Phase::Results;
    }

    fn on_reply(&mut self, epoch: u64, reply: GatewayReply) -> Result<Vec<Command>, QuizError> {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "Dropping reply for an earlier session");
            return Ok(Vec::new());
        }
        match (self.phase, reply) {
            (Phase::Loading, GatewayReply::Quiz(quiz)) => self.load_quiz(quiz),
            (Phase::Submitting, GatewayReply::Results(results)) => {
                if results.results.len() != self.questions.len() {
                    let e = LoadError::ResultCount { questions: self.questions.len(), results: results.results.len() };
                    self.return_to_setup(Some(Notice::Failed(format!("Error submitting quiz: {}", e))));
                    return Err(e.into());
                }
                info!(score = results.score, total = results.total_questions, "Quiz graded");
                self.show_results(results);
                Ok(Vec::new())
            }
            (Phase::Results, GatewayReply::Explanation { index, text }) => {
                if let Some(panel) = self.panels.get_mut(index) {
                    panel.state = Some(ExplanationState::Loaded(text));
                }
                Ok(Vec::new())
            }
            (phase, reply) => {
                debug!(?phase, ?reply, "Dropping reply that no longer fits the session");
                Ok(Vec::new())
            }
        }
    }

    fn on_failure(&mut self, epoch: u64, call: GatewayCall, question: Option<usize>, error: GatewayError) -> Vec<Command> {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "Dropping failure for an earlier session");
            return Vec::new();
        }
        warn!(%call, error = %error, "Gateway call failed");
        match (self.phase, call) {
            (Phase::Loading, GatewayCall::Generate) => {
                self.return_to_setup(Some(Notice::Failed(format!("Error generating quiz: {}", error))));
            }
            (Phase::Submitting, GatewayCall::Submit) => {
                self.return_to_setup(Some(Notice::Failed(format!("Error submitting quiz: {}", error))));
            }
            (Phase::Results, GatewayCall::Explain) => {
                if let Some(panel) = question.and_then(|i| self.panels.get_mut(i)) {
                    panel.state = Some(ExplanationState::Failed(error.to_string()));
                }
            }
            _ => {}
        }
        Vec::new()
    }

    /// Show or hide one explanation panel. The first opening fetches the
    /// explanation unless one is already known; later toggles reuse it.
    pub fn toggle_explanation(&mut self, index: usize) -> Result<Vec<Command>, SessionError> {
        if self.phase != Phase::Results {
            return Err(SessionError::NotPlaying);
        }
        let known = self.known_explanation(index);
        let (Some(setup), Some(panel)) = (self.setup.as_ref(), self.panels.get_mut(index)) else {
            return Err(SessionError::NotCurrentQuestion { index, current: self.index });
        };

        panel.open = !panel.open;
        if !panel.open {
            return Ok(Vec::new());
        }
        if matches!(panel.state, Some(ExplanationState::Loading | ExplanationState::Loaded(_))) {
            return Ok(Vec::new());
        }
        if let Some(text) = known {
            panel.state = Some(ExplanationState::Loaded(text));
            return Ok(Vec::new());
        }

        panel.state = Some(ExplanationState::Loading);
        debug!(index, "Fetching explanation");
        Ok(vec![Command::Explain {
            epoch: self.epoch,
            index,
            request: ExplanationRequest {
                topic: setup.topic.clone(),
                level: setup.level,
                num_questions: self.questions.len(),
                question_index: index,
            },
        }])
    }

    fn known_explanation(&self, index: usize) -> Option<String> {
        let from_results = self
            .results
            .as_ref()
            .and_then(|r| r.results.get(index))
            .and_then(|r| r.explanation.clone());
        from_results
            .or_else(|| self.questions.get(index).and_then(|q| q.explanation.clone()))
            .filter(|text| !text.trim().is_empty())
    }

    /// Discard the session and go back to an empty setup form.
    pub fn restart(&mut self) -> Vec<Command> {
        let commands = self.teardown();
        self.epoch += 1;
        self.setup = None;
        self.return_to_setup(None);
        info!(epoch = self.epoch, "Session restarted");
        commands
    }

    fn teardown(&mut self) -> Vec<Command> {
        self.countdown.cancel();
        vec![Command::CancelTimer]
    }

    fn return_to_setup(&mut self, notice: Option<Notice>) {
        self.countdown.cancel();
        self.questions.clear();
        self.answers.clear();
        self.index = 0;
        self.time_limit = None;
        self.results = None;
        self.panels.clear();
        self.notice = notice;
        self.phase = Phase::Setup;
    }
}
