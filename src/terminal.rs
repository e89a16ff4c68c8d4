//! Key mapping and text layout for the crossterm front-end.
//!
//! Everything here is pure: keys in, `QuizEvent`s out, and views in, lines
//! out. The binary owns the actual terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::model::Level;
use crate::render::{NextLabel, NoticeView, PanelView, QuestionView, ResultsView, View};
use crate::session::{Phase, QuizEvent, Session};
use crate::timer::TimerDisplay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Topic,
    Count,
    Level,
}

/// The setup form's input state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupForm {
    pub topic: String,
    pub count: String,
    pub level: Level,
    pub focus: Field,
}

impl Default for SetupForm {
    fn default() -> Self {
        Self { topic: String::new(), count: "5".to_string(), level: Level::Beginner, focus: Field::Topic }
    }
}

impl SetupForm {
    pub fn new(topic: Option<String>, count: Option<u32>, level: Option<Level>) -> Self {
        let defaults = Self::default();
        Self {
            topic: topic.unwrap_or(defaults.topic),
            count: count.map(|c| c.to_string()).unwrap_or(defaults.count),
            level: level.unwrap_or(defaults.level),
            focus: Field::Topic,
        }
    }

    fn cycle_level(&mut self, forward: bool) {
        let all = Level::ALL;
        let pos = all.iter().position(|l| *l == self.level).unwrap_or(0);
        let next = if forward { (pos + 1) % all.len() } else { (pos + all.len() - 1) % all.len() };
        self.level = all[next];
    }

    fn move_focus(&mut self, forward: bool) {
        self.focus = match (self.focus, forward) {
            (Field::Topic, true) | (Field::Level, false) => Field::Count,
            (Field::Count, true) | (Field::Topic, false) => Field::Level,
            (Field::Level, true) | (Field::Count, false) => Field::Topic,
        };
    }

    /// Edit the form. Returns the start event on Enter.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<QuizEvent> {
        match key.code {
            KeyCode::Enter => {
                return Some(QuizEvent::StartRequested {
                    topic: self.topic.clone(),
                    level: self.level.as_str().to_string(),
                    count: self.count.clone(),
                })
            }
            KeyCode::Tab | KeyCode::Down => self.move_focus(true),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(false),
            KeyCode::Left if self.focus == Field::Level => self.cycle_level(false),
            KeyCode::Right if self.focus == Field::Level => self.cycle_level(true),
            KeyCode::Backspace => match self.focus {
                Field::Topic => {
                    self.topic.pop();
                }
                Field::Count => {
                    self.count.pop();
                }
                Field::Level => {}
            },
            KeyCode::Char(c) => match self.focus {
                Field::Topic => self.topic.push(c),
                Field::Count if c.is_ascii_digit() => self.count.push(c),
                Field::Level if c == ' ' => self.cycle_level(true),
                _ => {}
            },
            _ => {}
        }
        None
    }
}

/// Front-end state that is not part of the session: the form and the
/// highlighted result row.
#[derive(Debug, Clone, Default)]
pub struct TerminalUi {
    pub form: SetupForm,
    pub focus: usize,
}

impl TerminalUi {
    pub fn new(form: SetupForm) -> Self {
        Self { form, focus: 0 }
    }

    /// Translate a key press into a session event, given what is on screen.
    pub fn map_key(&mut self, session: &Session, key: KeyEvent) -> Option<QuizEvent> {
        match key.kind {
            KeyEventKind::Press => {}
            // a held key may keep editing the form but never navigates
            KeyEventKind::Repeat if session.phase() == Phase::Setup && key.code != KeyCode::Enter => {}
            _ => return None,
        }
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return Some(QuizEvent::Quit);
        }

        match session.phase() {
            Phase::Setup => self.form.handle_key(key),
            // controls stay disabled until the pending reply arrives
            Phase::Loading | Phase::Submitting => None,
            Phase::Playing => Self::map_play_key(session, key),
            Phase::Results => self.map_results_key(session, key),
        }
    }

    fn map_play_key(session: &Session, key: KeyEvent) -> Option<QuizEvent> {
        let index = session.current_index();
        let question = session.current_question()?;
        let chosen = session.answers().get(index).and_then(|a| a.chosen_key());

        match key.code {
            KeyCode::Enter | KeyCode::Right => Some(QuizEvent::UserAdvanced),
            KeyCode::Left => Some(QuizEvent::UserRetreated),
            KeyCode::Backspace | KeyCode::Delete => Some(QuizEvent::UserAnswered { index, key: None }),
            KeyCode::Up | KeyCode::Down => {
                let keys: Vec<&str> = question.options.iter().map(|o| o.key.as_str()).collect();
                if keys.is_empty() {
                    return None;
                }
                let pos = chosen.and_then(|c| keys.iter().position(|k| *k == c));
                let next = match (pos, key.code) {
                    (None, KeyCode::Down) => 0,
                    (None, _) => keys.len() - 1,
                    (Some(p), KeyCode::Down) => (p + 1) % keys.len(),
                    (Some(p), _) => (p + keys.len() - 1) % keys.len(),
                };
                Some(QuizEvent::UserAnswered { index, key: Some(keys[next].to_string()) })
            }
            KeyCode::Char(c) => {
                let typed = c.to_string();
                question
                    .options
                    .iter()
                    .find(|o| o.key.eq_ignore_ascii_case(&typed))
                    .map(|o| QuizEvent::UserAnswered { index, key: Some(o.key.clone()) })
            }
            _ => None,
        }
    }

    fn map_results_key(&mut self, session: &Session, key: KeyEvent) -> Option<QuizEvent> {
        let count = session.panels().len();
        match key.code {
            KeyCode::Up => {
                self.focus = self.focus.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.focus + 1 < count {
                    self.focus += 1;
                }
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('e') if self.focus < count => {
                Some(QuizEvent::ExplanationToggled(self.focus))
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.focus = 0;
                Some(QuizEvent::RestartRequested)
            }
            KeyCode::Char('q') => Some(QuizEvent::Quit),
            _ => None,
        }
    }

    /// Lay out a view as terminal lines.
    pub fn lines(&self, view: &View) -> Vec<String> {
        match view {
            View::Setup(setup) => self.setup_lines(setup.notice.as_ref()),
            View::Loading => vec!["Loading questions...".to_string()],
            View::Submitting => vec![
                "Submitting quiz...".to_string(),
                "Calculating your results, please wait.".to_string(),
            ],
            View::Question(question) => question_lines(question),
            View::Results(results) => self.results_lines(results),
        }
    }

    fn setup_lines(&self, notice: Option<&NoticeView>) -> Vec<String> {
        let form = &self.form;
        let marker = |field: Field| if form.focus == field { ">" } else { " " };
        let mut lines = vec![
            "== Quiz setup ==".to_string(),
            String::new(),
            format!("{} Topic:     {}", marker(Field::Topic), form.topic),
            format!("{} Questions: {}", marker(Field::Count), form.count),
            format!("{} Level:     < {} >", marker(Field::Level), form.level),
            String::new(),
            "[Enter] start  [Tab] next field  [Left/Right] level  [Esc] quit".to_string(),
        ];
        if let Some(notice) = notice {
            lines.push(String::new());
            let prefix = if notice.is_warning { "Warning" } else { "Error" };
            lines.push(format!("{}: {}", prefix, notice.message));
        }
        lines
    }

    fn results_lines(&self, results: &ResultsView) -> Vec<String> {
        let mut lines = vec![
            format!("Quiz Results: Your score is {} / {}", results.score, results.total),
            String::new(),
        ];
        for (i, item) in results.items.iter().enumerate() {
            let cursor = if i == self.focus { ">" } else { " " };
            let mark = if item.is_correct { "correct" } else { "incorrect" };
            lines.push(format!("{} {}. {} ({})", cursor, item.number, first_line(&item.question), mark));
            if let Some(code) = &item.code {
                lines.extend(code_lines(code));
            }
            lines.push(format!("     Your answer: {}", item.user_answer));
            if let Some(correct) = &item.correct_answer {
                lines.push(format!("     Correct answer: {}", correct));
            }
            match &item.explanation {
                PanelView::Hidden => {}
                PanelView::Loading => lines.push("     Loading explanation...".to_string()),
                PanelView::Text(text) => {
                    for (n, line) in text.lines().enumerate() {
                        let label = if n == 0 { "Explanation: " } else { "             " };
                        lines.push(format!("     {}{}", label, line));
                    }
                }
                PanelView::Error(e) => lines.push(format!("     Error: {}", e)),
            }
        }
        lines.push(String::new());
        lines.push("[Up/Down] select  [Enter] show/hide explanation  [r] try another quiz  [Esc] quit".to_string());
        lines
    }
}

fn question_lines(question: &QuestionView) -> Vec<String> {
    let mut header = format!("Question {} of {}", question.number, question.total);
    if question.timer != TimerDisplay::Off {
        header.push_str(&format!("    {}", question.timer));
    }
    let mut lines = vec![header, String::new()];
    lines.extend(question.prompt.lines().map(str::to_string));
    if let Some(code) = &question.code {
        lines.push(String::new());
        lines.extend(code_lines(code));
    }
    lines.push(String::new());
    for option in &question.options {
        let radio = if option.selected { "(*)" } else { "( )" };
        lines.push(format!("{} {}) {}", radio, option.key, option.text));
    }
    lines.push(String::new());

    let mut nav = Vec::new();
    if question.show_previous {
        nav.push("[Left] Previous".to_string());
    }
    nav.push(format!("[Enter] {}", question.next.as_str()));
    if question.next == NextLabel::Submit {
        nav.push("(last question)".to_string());
    }
    lines.push(nav.join("  "));
    lines
}

fn code_lines(code: &str) -> Vec<String> {
    code.lines().map(|line| format!("    | {}", line)).collect()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_form_editing_and_submit() {
        let mut form = SetupForm::default();
        for c in "Loops".chars() {
            assert_eq!(form.handle_key(press(KeyCode::Char(c))), None);
        }
        form.handle_key(press(KeyCode::Tab));
        form.handle_key(press(KeyCode::Backspace));
        form.handle_key(press(KeyCode::Char('x')));
        form.handle_key(press(KeyCode::Char('3')));
        form.handle_key(press(KeyCode::Tab));
        form.handle_key(press(KeyCode::Right));
        form.handle_key(press(KeyCode::Right));

        assert_eq!(
            form.handle_key(press(KeyCode::Enter)),
            Some(QuizEvent::StartRequested {
                topic: "Loops".into(),
                level: "advanced".into(),
                count: "3".into()
            })
        );
    }

    #[test]
    fn test_level_cycles_both_ways() {
        let mut form = SetupForm { focus: Field::Level, ..Default::default() };
        form.handle_key(press(KeyCode::Left));
        assert_eq!(form.level, Level::Advanced);
        form.handle_key(press(KeyCode::Right));
        assert_eq!(form.level, Level::Beginner);
    }

    #[test]
    fn test_escape_quits_from_any_phase() {
        let mut ui = TerminalUi::default();
        let session = Session::new(SessionOptions::default());
        assert_eq!(ui.map_key(&session, press(KeyCode::Esc)), Some(QuizEvent::Quit));
        assert_eq!(
            ui.map_key(&session, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(QuizEvent::Quit)
        );
    }

    #[test]
    fn test_held_keys_do_not_navigate() {
        let mut session = Session::new(SessionOptions::default());
        session.start_session("Lists", "beginner", "3").unwrap();
        session
            .load_quiz(crate::gateway::GeneratedQuiz {
                questions: crate::gateway::sample_questions("Lists", Level::Beginner, 3),
                time_limit: None,
            })
            .unwrap();
        let mut ui = TerminalUi::default();

        let held = KeyEvent::new_with_kind(KeyCode::Enter, KeyModifiers::NONE, KeyEventKind::Repeat);
        assert_eq!(ui.map_key(&session, held), None);
        let held_right = KeyEvent::new_with_kind(KeyCode::Right, KeyModifiers::NONE, KeyEventKind::Repeat);
        assert_eq!(ui.map_key(&session, held_right), None);
        let released = KeyEvent::new_with_kind(KeyCode::Enter, KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(ui.map_key(&session, released), None);
        assert_eq!(ui.map_key(&session, press(KeyCode::Enter)), Some(QuizEvent::UserAdvanced));
    }

    #[test]
    fn test_held_keys_still_edit_the_form() {
        let mut ui = TerminalUi::default();
        let session = Session::new(SessionOptions::default());
        let held = KeyEvent::new_with_kind(KeyCode::Char('a'), KeyModifiers::NONE, KeyEventKind::Repeat);
        ui.map_key(&session, held);
        ui.map_key(&session, held);
        assert_eq!(ui.form.topic, "aa");

        let held_enter = KeyEvent::new_with_kind(KeyCode::Enter, KeyModifiers::NONE, KeyEventKind::Repeat);
        assert_eq!(ui.map_key(&session, held_enter), None);
    }

    #[test]
    fn test_setup_lines_show_notice() {
        let ui = TerminalUi::new(SetupForm::new(Some("Arrays".into()), Some(5), None));
        let lines = ui.lines(&View::Setup(crate::render::SetupView {
            notice: Some(NoticeView { message: "Received 3".into(), is_warning: true }),
        }));
        assert!(lines.iter().any(|l| l == "> Topic:     Arrays"));
        assert_eq!(lines.last().map(String::as_str), Some("Warning: Received 3"));
    }
}
