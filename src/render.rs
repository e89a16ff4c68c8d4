//! Pure projection of a `Session` onto what the user sees.
//!
//! Text coming from the service (prompts, code, options, explanations) is
//! passed through `sanitize` so it is shown literally and can never drive
//! the terminal.

use crate::model::{Answer, Question};
use crate::session::{ExplanationState, Notice, Phase, Session};
use crate::timer::TimerDisplay;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Setup(SetupView),
    /// Questions requested; start is disabled until the reply arrives.
    Loading,
    Question(QuestionView),
    /// Answers sent for grading; navigation is disabled.
    Submitting,
    Results(ResultsView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupView {
    pub notice: Option<NoticeView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeView {
    pub message: String,
    /// Warnings invite re-submission; errors report a failure.
    pub is_warning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    /// 1-based position
    pub number: usize,
    pub total: usize,
    pub timer: TimerDisplay,
    pub prompt: String,
    pub code: Option<String>,
    pub options: Vec<OptionView>,
    pub show_previous: bool,
    pub next: NextLabel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionView {
    pub key: String,
    pub text: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextLabel {
    Next,
    Submit,
}

impl NextLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            NextLabel::Next => "Next",
            NextLabel::Submit => "Submit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    pub score: usize,
    pub total: usize,
    pub items: Vec<ResultItemView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultItemView {
    pub number: usize,
    pub question: String,
    pub code: Option<String>,
    pub user_answer: String,
    /// Present only when the answer was wrong.
    pub correct_answer: Option<String>,
    pub is_correct: bool,
    pub explanation: PanelView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView {
    Hidden,
    Loading,
    Text(String),
    Error(String),
}

pub fn render(session: &Session) -> View {
    match session.phase() {
        Phase::Setup => View::Setup(SetupView { notice: session.notice().map(notice_view) }),
        Phase::Loading => View::Loading,
        Phase::Submitting => View::Submitting,
        Phase::Playing => match session.current_question() {
            Some(question) => View::Question(question_view(session, question)),
            None => View::Loading,
        },
        Phase::Results => match session.results() {
            Some(_) => View::Results(results_view(session)),
            None => View::Submitting,
        },
    }
}

fn notice_view(notice: &Notice) -> NoticeView {
    NoticeView {
        message: sanitize(&notice.to_string()),
        is_warning: matches!(notice, Notice::PartialResult { .. }),
    }
}

fn question_view(session: &Session, question: &Question) -> QuestionView {
    let index = session.current_index();
    let chosen = session.answers().get(index).and_then(Answer::chosen_key);

    QuestionView {
        number: index + 1,
        total: session.questions().len(),
        timer: session.timer_display(),
        prompt: sanitize(&question.question),
        code: question.code_snippet().map(sanitize),
        options: question
            .options
            .iter()
            .map(|option| OptionView {
                key: sanitize(&option.key),
                text: sanitize(&option.text),
                selected: chosen == Some(option.key.as_str()),
            })
            .collect(),
        show_previous: session.options().allow_previous && index > 0,
        next: if session.is_last_question() { NextLabel::Submit } else { NextLabel::Next },
    }
}

fn results_view(session: &Session) -> ResultsView {
    let Some(results) = session.results() else {
        return ResultsView { score: 0, total: 0, items: Vec::new() };
    };
    let questions = session.questions();

    let items = results
        .results
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let question = questions.get(i);
            let describe = |key: &str| match question.and_then(|q| q.options.text(key)) {
                Some(text) => sanitize(&format!("{}) {}", key, text)),
                None => sanitize(key),
            };
            let user_answer = match &item.user_answer {
                Answer::Chosen(key) => describe(key),
                other => other.to_string(),
            };
            let correct_answer = if item.is_correct {
                None
            } else {
                item.correct_answer.as_deref().map(describe)
            };
            let explanation = match session.panels().get(i) {
                Some(panel) if panel.open => match &panel.state {
                    Some(ExplanationState::Loaded(text)) => PanelView::Text(sanitize(text)),
                    Some(ExplanationState::Failed(e)) => PanelView::Error(sanitize(e)),
                    Some(ExplanationState::Loading) | None => PanelView::Loading,
                },
                _ => PanelView::Hidden,
            };

            ResultItemView {
                number: item.question_num,
                question: sanitize(&item.question_text),
                code: question.and_then(Question::code_snippet).map(sanitize),
                user_answer,
                correct_answer,
                is_correct: item.is_correct,
                explanation,
            }
        })
        .collect();

    ResultsView { score: results.score, total: results.total_questions, items }
}

/// Strip control characters (escape sequences included) and expand tabs.
/// Newlines survive so code blocks keep their shape.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push('\n'),
            '\t' => out.push_str("    "),
            '\r' => {}
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_escape_sequences() {
        assert_eq!(sanitize("\u{1b}[2Jcleared?"), "[2Jcleared?");
        assert_eq!(sanitize("a\r\n\tb"), "a\n    b");
        assert_eq!(sanitize("<b>not markup</b>"), "<b>not markup</b>");
    }

    #[test]
    fn test_setup_view_without_notice() {
        let session = Session::new(Default::default());
        assert_eq!(render(&session), View::Setup(SetupView { notice: None }));
    }
}
