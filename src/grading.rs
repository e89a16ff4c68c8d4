use tracing::debug;

use crate::gateway::{QuestionResult, QuizResults};
use crate::model::{Answer, Question};

/// Score answers against each question's `correct` key. Unanswered and
/// timed-out slots never count.
pub fn grade(questions: &[Question], answers: &[Answer]) -> QuizResults {
    let results: Vec<QuestionResult> = questions
        .iter()
        .zip(answers)
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

    let score = results.iter().filter(|r| r.is_correct).count();
    debug!(score, total = questions.len(), "Graded quiz locally");
    QuizResults { score, total_questions: questions.len(), results }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &str) -> Question {
        Question {
            question: format!("answer is {}", correct),
            code: None,
            options: [("A", "a"), ("B", "b"), ("C", "c")].into_iter().collect(),
            correct: Some(correct.to_string()),
            explanation: None,
        }
    }

    #[test]
    fn test_sentinels_never_score() {
        let questions = vec![question("A"), question("B"), question("B")];
        let answers: Vec<Answer> = serde_json::from_str(r#"[null, "TIMEOUT", "B"]"#).unwrap();

        let results = grade(&questions, &answers);
        assert_eq!(results.score, 1);
        assert_eq!(results.total_questions, 3);
        let correct: Vec<bool> = results.results.iter().map(|r| r.is_correct).collect();
        assert_eq!(correct, [false, false, true]);
        assert_eq!(results.results[2].question_num, 3);
    }

    #[test]
    fn test_missing_correct_key_scores_zero() {
        let mut q = question("A");
        q.correct = None;
        let results = grade(&[q], &[Answer::Chosen("A".into())]);
        assert_eq!(results.score, 0);
    }
}
