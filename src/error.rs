use thiserror::Error;

use crate::gateway::GatewayCall;

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Invalid quiz: {0}")]
    Load(#[from] LoadError),
    #[error("Rejected: {0}")]
    Session(#[from] SessionError),
}

/// Bad setup input. Caught before any request is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a quiz topic.")]
    EmptyTopic,
    #[error("Please enter a valid number of questions (got '{0}').")]
    InvalidCount(String),
    #[error("Unknown difficulty level '{0}'. Choose from beginner, intermediate, advanced.")]
    UnknownLevel(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Transport(String),
    /// Error detail reported by the service, surfaced verbatim.
    #[error("{detail}")]
    Service { detail: String },
    #[error("Failed to {call}. Status: {status}")]
    Status { call: GatewayCall, status: u16 },
    #[error("Unexpected response from the quiz service: {0}")]
    Decode(String),
}

/// A question list the session refuses to play.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("question {0} has no options")]
    NoOptions(usize),
    #[error("question {0} uses the reserved option key \"TIMEOUT\"")]
    ReservedKey(usize),
    #[error("question {0} has no correct answer, which client-side grading needs")]
    MissingCorrect(usize),
    #[error("the service returned {results} results for {questions} questions")]
    ResultCount { questions: usize, results: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no quiz is in progress")]
    NotPlaying,
    #[error("question {index} is not the current question ({current})")]
    NotCurrentQuestion { index: usize, current: usize },
    #[error("question {index} has no option '{key}'")]
    UnknownOption { index: usize, key: String },
    #[error("question {0} already timed out")]
    AnswerFrozen(usize),
    #[error("going back is disabled")]
    RetreatDisabled,
    #[error("already at the first question")]
    AtFirstQuestion,
    #[error("a request is still pending")]
    Busy,
}
