use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use super::http::{HttpGateway, HttpGatewayConfig};
use super::mock::{MockGateway, MockHandle, MockResponse};
use super::{ExplanationRequest, GeneratedQuiz, GenerateRequest, QuizGateway, QuizResults, SubmitRequest};
use crate::config::{KeyFromEnv, QuizConfig};
use crate::error::GatewayError;

/// Gateway type for lazy initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayType {
    Http,
    Mock,
}

impl GatewayType {
    /// Build the gateway this type names. HTTP reads its URL from the env.
    pub fn build(self) -> Result<Box<dyn QuizGateway>, GatewayError> {
        match self {
            GatewayType::Http => Ok(Box::new(HttpGateway::new(HttpGatewayConfig::default())?)),
            GatewayType::Mock => {
                // nobody can script this one; use FlexibleGateway::mock() for that
                let (gateway, _handle) = MockGateway::new();
                Ok(Box::new(gateway))
            }
        }
    }
}

impl Default for GatewayType {
    /// HTTP when a service URL is configured, the built-in bank otherwise.
    fn default() -> Self {
        if HttpGateway::find_key().is_some() {
            Self::Http
        } else {
            Self::Mock
        }
    }
}

impl FromStr for GatewayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown gateway type: '{}'. Supported: http, mock", s)),
        }
    }
}

impl fmt::Display for GatewayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayType::Http => write!(f, "http"),
            GatewayType::Mock => write!(f, "mock"),
        }
    }
}

/// Wraps any `QuizGateway` behind one concrete, cloneable type.
#[derive(Debug, Clone)]
pub struct FlexibleGateway {
    inner: Arc<Mutex<Box<dyn QuizGateway>>>,
}

impl FlexibleGateway {
    pub fn new(gateway: Box<dyn QuizGateway>) -> Self {
        Self { inner: Arc::new(Mutex::new(gateway)) }
    }

    pub fn new_lazy(kind: GatewayType) -> Result<Self, GatewayError> {
        Ok(Self::new(kind.build()?))
    }

    pub fn http(config: &QuizConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(Box::new(HttpGateway::from_config(config)?)))
    }

    /// Mock gateway plus the handle that scripts it.
    pub fn mock() -> (Self, Arc<MockHandle>) {
        let (gateway, handle) = MockGateway::new();
        (Self::new(Box::new(gateway)), handle)
    }

    pub fn mock_with_responses(responses: Vec<MockResponse>) -> (Self, Arc<MockHandle>) {
        let (gateway, handle) = MockGateway::with_responses(responses);
        (Self::new(Box::new(gateway)), handle)
    }

    pub fn into_inner(self) -> Box<dyn QuizGateway> {
        self.current()
    }

    /// Clone the wrapped gateway so the lock is never held across an await.
    fn current(&self) -> Box<dyn QuizGateway> {
        let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.clone_box()
    }
}

#[async_trait]
impl QuizGateway for FlexibleGateway {
    async fn generate_quiz(&self, request: GenerateRequest) -> Result<GeneratedQuiz, GatewayError> {
        self.current().generate_quiz(request).await
    }

    async fn submit_quiz(&self, request: SubmitRequest) -> Result<QuizResults, GatewayError> {
        self.current().submit_quiz(request).await
    }

    async fn get_explanation(&self, request: ExplanationRequest) -> Result<String, GatewayError> {
        self.current().get_explanation(request).await
    }

    fn clone_box(&self) -> Box<dyn QuizGateway> {
        Box::new(self.clone())
    }
}
