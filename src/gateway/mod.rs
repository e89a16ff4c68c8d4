//! Remote quiz service: generate, grade and explain.
//!
//! `QuizGateway` is the seam between the session and the service. Calls are
//! single request/response, never retried.

use async_trait::async_trait;
use std::fmt::{self, Debug};

use crate::error::GatewayError;

pub mod flexible;
pub mod http;
pub mod mock;
pub mod models;

pub use flexible::*;
pub use http::*;
pub use mock::*;
pub use models::*;

/// Which remote operation a request or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    Generate,
    Submit,
    Explain,
}

impl GatewayCall {
    pub fn path(self) -> &'static str {
        match self {
            GatewayCall::Generate => "/generate-quiz",
            GatewayCall::Submit => "/submit-quiz",
            GatewayCall::Explain => "/get-explanation",
        }
    }
}

impl fmt::Display for GatewayCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayCall::Generate => write!(f, "generate quiz"),
            GatewayCall::Submit => write!(f, "submit quiz"),
            GatewayCall::Explain => write!(f, "fetch explanation"),
        }
    }
}

#[async_trait]
pub trait QuizGateway: Send + Sync + Debug {
    async fn generate_quiz(&self, request: GenerateRequest) -> Result<GeneratedQuiz, GatewayError>;

    async fn submit_quiz(&self, request: SubmitRequest) -> Result<QuizResults, GatewayError>;

    async fn get_explanation(&self, request: ExplanationRequest) -> Result<String, GatewayError>;

    /// Clone this gateway into a boxed trait object
    fn clone_box(&self) -> Box<dyn QuizGateway>;
}

impl Clone for Box<dyn QuizGateway> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl QuizGateway for Box<dyn QuizGateway> {
    async fn generate_quiz(&self, request: GenerateRequest) -> Result<GeneratedQuiz, GatewayError> {
        self.as_ref().generate_quiz(request).await
    }

    async fn submit_quiz(&self, request: SubmitRequest) -> Result<QuizResults, GatewayError> {
        self.as_ref().submit_quiz(request).await
    }

    async fn get_explanation(&self, request: ExplanationRequest) -> Result<String, GatewayError> {
        self.as_ref().get_explanation(request).await
    }

    fn clone_box(&self) -> Box<dyn QuizGateway> {
        self.as_ref().clone_box()
    }
}
