use serde::{Deserialize, Serialize};

use crate::model::{Answer, Level, Question};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub topic: String,
    pub question_number: u32,
    pub level: Level,
}

/// The service answers either with a bare list or with a wrapped list plus
/// a per-question time limit.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum GenerateResponse {
    Bare(Vec<Question>),
    Wrapped {
        questions: Vec<Question>,
        #[serde(default)]
        time_limit: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuiz {
    pub questions: Vec<Question>,
    pub time_limit: Option<f64>,
}

impl GenerateResponse {
    pub fn into_quiz(self) -> GeneratedQuiz {
        match self {
            GenerateResponse::Wrapped { questions, time_limit } => GeneratedQuiz { questions, time_limit },
            GenerateResponse::Bare(questions) => GeneratedQuiz { questions, time_limit: None },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRequest {
    pub questions: Vec<Question>,
    pub user_answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_num: usize,
    pub question_text: String,
    pub user_answer: Answer,
    #[serde(default)]
    pub correct_answer: Option<String>,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResults {
    pub score: usize,
    pub total_questions: usize,
    pub results: Vec<QuestionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationRequest {
    pub topic: String,
    pub level: Level,
    pub num_questions: usize,
    pub question_index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExplanationResponse {
    pub explanation: String,
}

/// Error body shape used by the service. `detail` is usually a string but
/// request validation failures send a list.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question_json() -> serde_json::Value {
        json!({"question": "2 + 2?", "options": {"A": "3", "B": "4"}, "correct": "B"})
    }

    #[test]
    fn test_bare_and_wrapped_generate_responses() {
        let bare: GenerateResponse = serde_json::from_value(json!([question_json()])).unwrap();
        let quiz = bare.into_quiz();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.time_limit, None);

        let wrapped: GenerateResponse =
            serde_json::from_value(json!({"questions": [question_json(), question_json()], "time_limit": 20}))
                .unwrap();
        let quiz = wrapped.into_quiz();
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.time_limit, Some(20.0));
    }

    #[test]
    fn test_submit_request_wire_shape() {
        let request = SubmitRequest {
            questions: vec![serde_json::from_value(question_json()).unwrap()],
            user_answers: vec![Answer::TimedOut],
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["user_answers"], json!(["TIMEOUT"]));
        assert_eq!(wire["questions"][0]["correct"], json!("B"));
        assert!(wire["questions"][0].get("code").is_none());
    }

    #[test]
    fn test_results_parse_sentinels() {
        let results: QuizResults = serde_json::from_value(json!({
            "score": 0,
            "total_questions": 2,
            "results": [
                {"question_num": 1, "question_text": "a", "user_answer": null,
                 "correct_answer": "A", "is_correct": false, "explanation": "x"},
                {"question_num": 2, "question_text": "b", "user_answer": "TIMEOUT",
                 "correct_answer": "C", "is_correct": false, "explanation": "y"}
            ]
        }))
        .unwrap();
        assert_eq!(results.results[0].user_answer, Answer::Unset);
        assert_eq!(results.results[1].user_answer, Answer::TimedOut);
    }

    #[test]
    fn test_error_detail_text() {
        let body: ErrorBody = serde_json::from_value(json!({"detail": "Invalid difficulty level"})).unwrap();
        assert_eq!(body.detail_text().as_deref(), Some("Invalid difficulty level"));

        let body: ErrorBody = serde_json::from_value(json!({"detail": [{"loc": ["body"]}]})).unwrap();
        assert_eq!(body.detail_text().as_deref(), Some(r#"[{"loc":["body"]}]"#));

        let body: ErrorBody = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.detail_text(), None);
    }
}
