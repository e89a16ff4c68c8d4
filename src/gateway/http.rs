use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::models::{ErrorBody, ExplanationResponse, GenerateResponse};
use super::{ExplanationRequest, GatewayCall, GeneratedQuiz, GenerateRequest, QuizGateway, QuizResults, SubmitRequest};
use crate::config::{KeyFromEnv, QuizConfig, ServiceUrl, DEFAULT_SERVICE_URL};
use crate::error::GatewayError;
use crate::interceptors::{FileInterceptor, Interceptor};

/// Configuration for the HTTP gateway
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: HttpGateway::find_key().unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&QuizConfig> for HttpGatewayConfig {
    fn from(config: &QuizConfig) -> Self {
        Self {
            base_url: config.service_url.clone(),
            timeout: config.request_timeout,
        }
    }
}

/// Talks JSON over HTTP to the quiz service.
#[derive(Clone)]
pub struct HttpGateway {
    config: HttpGatewayConfig,
    client: Client,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .field("interceptor", &self.interceptor.is_some())
            .finish()
    }
}

impl KeyFromEnv for HttpGateway {
    const KEY_NAME: &'static str = ServiceUrl::KEY_NAME;
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        info!(base_url = %config.base_url, timeout_secs = config.timeout.as_secs(), "Creating new HTTP gateway");
        // every request carries the timeout
        let client = Client::builder().timeout(config.timeout).build().map_err(|e| {
            error!(error = %e, "Failed to build HTTP client");
            GatewayError::Transport(e.to_string())
        })?;
        Ok(Self { config, client, interceptor: None })
    }

    /// Gateway configured from the quiz config, recording exchanges if a
    /// record directory is set.
    pub fn from_config(config: &QuizConfig) -> Result<Self, GatewayError> {
        let gateway = Self::new(HttpGatewayConfig::from(config))?;
        Ok(match &config.record_dir {
            Some(dir) => gateway.with_interceptor(Arc::new(FileInterceptor::new(dir.clone()))),
            None => gateway,
        })
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, call: GatewayCall) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), call.path())
    }

    async fn post<Req, Resp>(&self, call: GatewayCall, body: &Req) -> Result<Resp, GatewayError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(call);
        debug!(%url, "Sending request to quiz service");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, %call, "HTTP request failed");
                GatewayError::Transport(e.to_string())
            })?;

        let status = response.status();
        debug!(status = %status, "Received response from quiz service");

        let text = response.text().await.map_err(|e| {
            error!(error = %e, "Failed to read response body");
            GatewayError::Transport(e.to_string())
        })?;

        if let Some(interceptor) = &self.interceptor {
            let request = serde_json::to_string(body).unwrap_or_default();
            if let Err(e) = interceptor.save(call, &request, &text).await {
                warn!(error = %e, "Interceptor failed to record exchange");
            }
        }

        decode_response(call, status, &text)
    }
}

/// Map a raw service response onto the expected body or a gateway error.
pub(crate) fn decode_response<Resp: DeserializeOwned>(
    call: GatewayCall,
    status: StatusCode,
    body: &str,
) -> Result<Resp, GatewayError> {
    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.detail_text());
        error!(status = %status, %call, detail = ?detail, "Quiz service error");
        return Err(match detail {
            Some(detail) => GatewayError::Service { detail },
            None => GatewayError::Status { call, status: status.as_u16() },
        });
    }

    serde_json::from_str(body).map_err(|e| {
        error!(error = %e, %call, "Failed to parse quiz service response JSON");
        GatewayError::Decode(e.to_string())
    })
}

#[async_trait]
impl QuizGateway for HttpGateway {
    #[instrument(skip(self, request), fields(topic = %request.topic, difficulty = %request.level, count = request.question_number))]
    async fn generate_quiz(&self, request: GenerateRequest) -> Result<GeneratedQuiz, GatewayError> {
        let response: GenerateResponse = self.post(GatewayCall::Generate, &request).await?;
        let quiz = response.into_quiz();
        info!(received = quiz.questions.len(), time_limit = ?quiz.time_limit, "Quiz generated");
        Ok(quiz)
    }

    #[instrument(skip(self, request), fields(questions = request.questions.len()))]
    async fn submit_quiz(&self, request: SubmitRequest) -> Result<QuizResults, GatewayError> {
        let results: QuizResults = self.post(GatewayCall::Submit, &request).await?;
        info!(score = results.score, total = results.total_questions, "Quiz graded by service");
        Ok(results)
    }

    #[instrument(skip(self, request), fields(question_index = request.question_index))]
    async fn get_explanation(&self, request: ExplanationRequest) -> Result<String, GatewayError> {
        let response: ExplanationResponse = self.post(GatewayCall::Explain, &request).await?;
        info!(explanation_len = response.explanation.len(), "Explanation received");
        Ok(response.explanation)
    }

    fn clone_box(&self) -> Box<dyn QuizGateway> {
        Box::new(self.clone())
    }
}
