use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::{
    ExplanationRequest, GatewayCall, GeneratedQuiz, GenerateRequest, QuestionResult, QuizGateway, QuizResults,
    SubmitRequest,
};
use crate::error::GatewayError;
use crate::model::{Level, Question};

/// A scripted reply for the next call of one kind.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Quiz(GeneratedQuiz),
    Results(QuizResults),
    Explanation(String),
    /// Failure for the next call of the named kind.
    Error(GatewayCall, GatewayError),
}

/// Record of one call the mock received.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Generate(GenerateRequest),
    Submit(SubmitRequest),
    Explain(ExplanationRequest),
}

impl MockCall {
    pub fn kind(&self) -> GatewayCall {
        match self {
            MockCall::Generate(_) => GatewayCall::Generate,
            MockCall::Submit(_) => GatewayCall::Submit,
            MockCall::Explain(_) => GatewayCall::Explain,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    generate: VecDeque<MockResponse>,
    submit: VecDeque<MockResponse>,
    explain: VecDeque<MockResponse>,
    calls: Vec<MockCall>,
    latency: Option<Duration>,
}

/// Handle for scripting a `MockGateway` and inspecting the calls it saw.
#[derive(Debug, Default)]
pub struct MockHandle {
    state: Mutex<MockState>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not hide the call log from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_quiz(&self, questions: Vec<Question>, time_limit: Option<f64>) {
        self.lock().generate.push_back(MockResponse::Quiz(GeneratedQuiz { questions, time_limit }));
    }

    pub fn push_results(&self, results: QuizResults) {
        self.lock().submit.push_back(MockResponse::Results(results));
    }

    pub fn push_explanation(&self, explanation: impl Into<String>) {
        self.lock().explain.push_back(MockResponse::Explanation(explanation.into()));
    }

    pub fn push_error(&self, call: GatewayCall, error: GatewayError) {
        let mut state = self.lock();
        let queue = match call {
            GatewayCall::Generate => &mut state.generate,
            GatewayCall::Submit => &mut state.submit,
            GatewayCall::Explain => &mut state.explain,
        };
        queue.push_back(MockResponse::Error(call, error));
    }

    /// Delay every reply, to keep a request pending for a while.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, kind: GatewayCall) -> usize {
        self.lock().calls.iter().filter(|c| c.kind() == kind).count()
    }

    fn record(&self, call: MockCall) -> (Option<MockResponse>, Option<Duration>) {
        let mut state = self.lock();
        let kind = call.kind();
        state.calls.push(call);
        let scripted = match kind {
            GatewayCall::Generate => state.generate.pop_front(),
            GatewayCall::Submit => state.submit.pop_front(),
            GatewayCall::Explain => state.explain.pop_front(),
        };
        (scripted, state.latency)
    }
}

/// In-process gateway. Scripted replies are used first; without one it
/// serves the built-in sample bank and grades locally.
#[derive(Debug, Clone)]
pub struct MockGateway {
    handle: Arc<MockHandle>,
}

impl MockGateway {
    pub fn new() -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        (Self { handle: handle.clone() }, handle)
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> (Self, Arc<MockHandle>) {
        let (gateway, handle) = Self::new();
        {
            let mut state = handle.lock();
            for response in responses {
                match &response {
                    MockResponse::Quiz(_) => state.generate.push_back(response),
                    MockResponse::Results(_) => state.submit.push_back(response),
                    MockResponse::Explanation(_) => state.explain.push_back(response),
                    MockResponse::Error(GatewayCall::Generate, _) => state.generate.push_back(response),
                    MockResponse::Error(GatewayCall::Submit, _) => state.submit.push_back(response),
                    MockResponse::Error(GatewayCall::Explain, _) => state.explain.push_back(response),
                }
            }
        }
        (gateway, handle)
    }

    async fn reply(&self, call: MockCall) -> Option<MockResponse> {
        let (scripted, latency) = self.handle.record(call);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        scripted
    }
}

fn unexpected(call: GatewayCall, response: MockResponse) -> GatewayError {
    GatewayError::Decode(format!("mock scripted {:?} for {}", response, call))
}

#[async_trait]
impl QuizGateway for MockGateway {
    async fn generate_quiz(&self, request: GenerateRequest) -> Result<GeneratedQuiz, GatewayError> {
        debug!(topic = %request.topic, count = request.question_number, "Mock generate");
        match self.reply(MockCall::Generate(request.clone())).await {
            Some(MockResponse::Quiz(quiz)) => Ok(quiz),
            Some(MockResponse::Error(_, e)) => Err(e),
            Some(other) => Err(unexpected(GatewayCall::Generate, other)),
            None => Ok(GeneratedQuiz {
                questions: sample_questions(&request.topic, request.level, request.question_number as usize),
                time_limit: Some(request.level.time_limit_secs() as f64),
            }),
        }
    }

    async fn submit_quiz(&self, request: SubmitRequest) -> Result<QuizResults, GatewayError> {
        debug!(questions = request.questions.len(), "Mock submit");
        match self.reply(MockCall::Submit(request.clone())).await {
            Some(MockResponse::Results(results)) => Ok(results),
            Some(MockResponse::Error(_, e)) => Err(e),
            Some(other) => Err(unexpected(GatewayCall::Submit, other)),
            None => grade_remotely(&request),
        }
    }

    async fn get_explanation(&self, request: ExplanationRequest) -> Result<String, GatewayError> {
        debug!(question_index = request.question_index, "Mock explanation");
        match self.reply(MockCall::Explain(request.clone())).await {
            Some(MockResponse::Explanation(text)) => Ok(text),
            Some(MockResponse::Error(_, e)) => Err(e),
            Some(other) => Err(unexpected(GatewayCall::Explain, other)),
            None => {
                let bank = sample_questions(&request.topic, request.level, request.num_questions);
                bank.get(request.question_index)
                    .and_then(|q| q.explanation.clone())
                    .ok_or_else(|| GatewayError::Service {
                        detail: format!(
                            "Invalid question index: {}. Number of questions: {}.",
                            request.question_index,
                            bank.len()
                        ),
                    })
            }
        }
    }

    fn clone_box(&self) -> Box<dyn QuizGateway> {
        Box::new(self.clone())
    }
}

/// What the service's grader does, for the unscripted mock.
fn grade_remotely(request: &SubmitRequest) -> Result<QuizResults, GatewayError> {
    if request.user_answers.len() != request.questions.len() {
        return Err(GatewayError::Service {
            detail: format!(
                "Number of answers ({}) does not match number of questions ({}).",
                request.user_answers.len(),
                request.questions.len()
            ),
        });
    }
    let results: Vec<QuestionResult> = request
        .questions
        .iter()
        .zip(&request.user_answers)
        .enumerate()
        .map(|(i, (question, answer))| QuestionResult {
            question_num: i + 1,
            question_text: question.question.clone(),
            user_answer: answer.clone(),
            correct_answer: question.correct.clone(),
            is_correct: answer.matches(question.correct.as_deref()),
            explanation: question.explanation.clone(),
        })
        .collect();
    Ok(QuizResults {
        score: results.iter().filter(|r| r.is_correct).count(),
        total_questions: results.len(),
        results,
    })
}

/// Built-in question bank used by `--mock`.
pub fn sample_questions(topic: &str, level: Level, count: usize) -> Vec<Question> {
    let bank: [(&str, Option<&str>, [&str; 4], &str, &str); 5] = [
        (
            "Which of these creates an empty list?",
            None,
            ["()", "[]", "{}", "set()"],
            "B",
            "Square brackets build a list; {} is an empty dict.",
        ),
        (
            "What does this print?",
            Some("xs = [1, 2, 3]\nprint(xs[-1])"),
            ["1", "2", "3", "IndexError"],
            "C",
            "Negative indices count from the end, so -1 is the last element.",
        ),
        (
            "Which method adds an element to the end of a list?",
            None,
            ["push", "add", "insert", "append"],
            "D",
            "list.append adds one element at the end.",
        ),
        (
            "What is len([[1, 2], [3]])?",
            None,
            ["2", "3", "1", "0"],
            "A",
            "The outer list holds two elements, each of them a list.",
        ),
        (
            "What does this print?",
            Some("xs = [3, 1, 2]\nys = sorted(xs)\nprint(xs)"),
            ["[1, 2, 3]", "[3, 1, 2]", "None", "[2, 1, 3]"],
            "B",
            "sorted returns a new list and leaves the original untouched.",
        ),
    ];

    bank.iter()
        .cycle()
        .take(count)
        .enumerate()
        .map(|(i, (text, code, options, correct, explanation))| Question {
            question: if i < bank.len() {
                format!("[{} / {}] {}", topic, level, text)
            } else {
                format!("[{} / {} #{}] {}", topic, level, i + 1, text)
            },
            code: code.map(str::to_string),
            options: ["A", "B", "C", "D"].into_iter().zip(options.iter().copied()).collect(),
            correct: Some(correct.to_string()),
            explanation: Some(explanation.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Answer;

    fn request(count: u32) -> GenerateRequest {
        GenerateRequest { topic: "Lists".into(), question_number: count, level: Level::Beginner }
    }

    #[tokio::test]
    async fn test_scripted_replies_come_first() {
        let (gateway, handle) = MockGateway::new();
        handle.push_quiz(sample_questions("Lists", Level::Beginner, 1), None);
        handle.push_error(GatewayCall::Generate, GatewayError::Service { detail: "boom".into() });

        assert_eq!(gateway.generate_quiz(request(5)).await.unwrap().questions.len(), 1);
        assert_eq!(
            gateway.generate_quiz(request(5)).await.unwrap_err(),
            GatewayError::Service { detail: "boom".into() }
        );
        // script exhausted, falls back to the bank
        assert_eq!(gateway.generate_quiz(request(7)).await.unwrap().questions.len(), 7);
        assert_eq!(handle.call_count(GatewayCall::Generate), 3);
    }

    #[tokio::test]
    async fn test_scripted_errors_reach_their_own_call() {
        let (gateway, handle) = MockGateway::with_responses(vec![
            MockResponse::Error(GatewayCall::Explain, GatewayError::Service { detail: "explain failed".into() }),
            MockResponse::Error(GatewayCall::Submit, GatewayError::Status { call: GatewayCall::Submit, status: 502 }),
        ]);

        let explain = ExplanationRequest {
            topic: "Lists".into(),
            level: Level::Beginner,
            num_questions: 5,
            question_index: 0,
        };
        assert_eq!(
            gateway.get_explanation(explain).await.unwrap_err(),
            GatewayError::Service { detail: "explain failed".into() }
        );
        let submit = SubmitRequest { questions: sample_questions("Lists", Level::Beginner, 1), user_answers: vec![Answer::Unset] };
        assert_eq!(
            gateway.submit_quiz(submit).await.unwrap_err(),
            GatewayError::Status { call: GatewayCall::Submit, status: 502 }
        );
        // generate was never scripted, so it serves the bank
        assert_eq!(gateway.generate_quiz(request(2)).await.unwrap().questions.len(), 2);
        assert_eq!(handle.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_submit_grades_answers() {
        let (gateway, _handle) = MockGateway::new();
        let questions = sample_questions("Lists", Level::Beginner, 3);
        let results = gateway
            .submit_quiz(SubmitRequest {
                questions,
                user_answers: vec![Answer::Chosen("B".into()), Answer::TimedOut, Answer::Unset],
            })
            .await
            .unwrap();
        assert_eq!(results.score, 1);
        assert_eq!(results.total_questions, 3);
        assert!(results.results[0].is_correct);
        assert_eq!(results.results[1].user_answer, Answer::TimedOut);
    }

    #[tokio::test]
    async fn test_unscripted_submit_rejects_length_mismatch() {
        let (gateway, _handle) = MockGateway::new();
        let err = gateway
            .submit_quiz(SubmitRequest { questions: sample_questions("Lists", Level::Beginner, 2), user_answers: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Service { .. }));
    }
}
