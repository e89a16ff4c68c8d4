
use std::time::Duration;

use quiz_session::config::{GradingMode, TimerMode};
use quiz_session::error::GatewayError;
use quiz_session::gateway::{GatewayCall, MockCall};
use quiz_session::model::{Answer, Level};
use quiz_session::render::View;
use quiz_session::session::{ExplanationState, Notice, Phase, QuizEvent, SessionOptions};
use quiz_session::timer::TimerDisplay;

use crate::test_utils::{mock_runtime, questions, start, step_until, RecordingScreen};

fn timed(seconds_from_service: bool) -> SessionOptions {
    SessionOptions {
        timer: if seconds_from_service { TimerMode::Service } else { TimerMode::Level },
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_question_times_out_through_real_ticks() {
    let (mut runtime, handle) = mock_runtime(timed(true));
    handle.push_quiz(questions(&["A", "B"]), Some(5.0));
    let mut screen = RecordingScreen::default();

    runtime.dispatch(start("Arrays", "beginner", 2), &mut screen);
    assert_eq!(screen.last(), Some(&View::Loading));

    assert!(step_until(&mut runtime, &mut screen, 3, |s| s.phase() == Phase::Playing).await);
    assert_eq!(runtime.active_tickers(), 1);

    assert!(step_until(&mut runtime, &mut screen, 10, |s| s.current_index() == 1).await);
    let session = runtime.session();
    assert_eq!(session.answers()[0], Answer::TimedOut);
    assert_eq!(session.answers()[1], Answer::Unset);
    assert_eq!(session.timer_display(), TimerDisplay::Remaining(5));
    assert_eq!(runtime.active_tickers(), 1);

    // 00:00 was on screen before the quiz moved on
    let zero_shown = screen
        .views
        .iter()
        .any(|v| matches!(v, View::Question(q) if q.number == 1 && q.timer == TimerDisplay::Remaining(0)));
    assert!(zero_shown);
}

#[tokio::test(start_paused = true)]
async fn test_next_before_expiry_keeps_selection() {
    let (mut runtime, handle) = mock_runtime(timed(true));
    handle.push_quiz(questions(&["A", "C", "B"]), Some(3.0));
    let mut screen = RecordingScreen::default();

    runtime.dispatch(start("Arrays", "beginner", 3), &mut screen);
    assert!(step_until(&mut runtime, &mut screen, 3, |s| s.phase() == Phase::Playing).await);
    runtime.dispatch(QuizEvent::UserAdvanced, &mut screen);

    // two of three seconds pass on question 2
    assert!(step_until(&mut runtime, &mut screen, 5, |s| s.timer_display() == TimerDisplay::Remaining(1)).await);
    runtime.dispatch(QuizEvent::UserAnswered { index: 1, key: Some("C".into()) }, &mut screen);
    runtime.dispatch(QuizEvent::UserAdvanced, &mut screen);

    // let question 3 run out; question 2 must be untouched
    assert!(step_until(&mut runtime, &mut screen, 10, |s| s.phase() == Phase::Results).await);
    let session = runtime.session();
    assert_eq!(session.answers()[1], Answer::Chosen("C".into()));
    assert_eq!(session.answers()[2], Answer::TimedOut);
    assert_eq!(session.results().map(|r| r.score), Some(1));
    assert_eq!(runtime.active_tickers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_navigation_keeps_a_single_ticker() {
    let options = SessionOptions { allow_previous: true, ..timed(false) };
    let (mut runtime, handle) = mock_runtime(options);
    handle.push_quiz(questions(&["A", "B", "C"]), None);
    let mut screen = RecordingScreen::default();

    runtime.dispatch(start("Arrays", "intermediate", 3), &mut screen);
    assert!(step_until(&mut runtime, &mut screen, 3, |s| s.phase() == Phase::Playing).await);

    for _ in 0..5 {
        runtime.dispatch(QuizEvent::UserAdvanced, &mut screen);
        assert_eq!(runtime.active_tickers(), 1);
        runtime.dispatch(QuizEvent::UserRetreated, &mut screen);
        assert_eq!(runtime.active_tickers(), 1);
    }
    assert_eq!(runtime.session().current_index(), 0);

    // one second later exactly one tick lands on the live countdown
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let limit = Level::Intermediate.time_limit_secs();
    assert!(step_until(&mut runtime, &mut screen, 1, |s| s.timer_display() == TimerDisplay::Remaining(limit - 1)).await);
    assert_eq!(runtime.session().current_index(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_generate_failure_shows_error_on_setup() {
    let (mut runtime, handle) = mock_runtime(SessionOptions::default());
    handle.push_error(GatewayCall::Generate, GatewayError::Service { detail: "Topic not supported".into() });
    let mut screen = RecordingScreen::default();

    runtime.dispatch(start("Cobol", "advanced", 4), &mut screen);
    assert!(step_until(&mut runtime, &mut screen, 3, |s| s.phase() == Phase::Setup).await);

    assert_eq!(
        runtime.session().notice(),
        Some(&Notice::Failed("Error generating quiz: Topic not supported".into()))
    );
    let View::Setup(setup) = runtime.view() else { panic!("expected setup") };
    assert!(!setup.notice.expect("notice").is_warning);

    let calls = handle.calls();
    let [MockCall::Generate(request)] = calls.as_slice() else { panic!("expected one generate call") };
    assert_eq!(request.topic, "Cobol");
    assert_eq!(request.question_number, 4);
    assert_eq!(request.level, Level::Advanced);
}

#[tokio::test(start_paused = true)]
async fn test_server_grading_and_explanation_round_trip() {
    let options = SessionOptions { grading: GradingMode::Server, timer: TimerMode::Off, ..Default::default() };
    let (mut runtime, handle) = mock_runtime(options);
    handle.push_quiz(questions(&["B", "D"]), None);
    handle.push_explanation("D is the last letter.");
    let mut screen = RecordingScreen::default();

    runtime.dispatch(start("Letters", "beginner", 2), &mut screen);
    assert!(step_until(&mut runtime, &mut screen, 3, |s| s.phase() == Phase::Playing).await);
    runtime.dispatch(QuizEvent::UserAnswered { index: 0, key: Some("B".into()) }, &mut screen);
    runtime.dispatch(QuizEvent::UserAdvanced, &mut screen);
    runtime.dispatch(QuizEvent::UserAnswered { index: 1, key: Some("A".into()) }, &mut screen);
    runtime.dispatch(QuizEvent::UserAdvanced, &mut screen);
    assert_eq!(screen.last(), Some(&View::Submitting));

    // unscripted submit is graded by the mock
    assert!(step_until(&mut runtime, &mut screen, 3, |s| s.phase() == Phase::Results).await);
    assert_eq!(runtime.session().results().map(|r| r.score), Some(1));

    for _ in 0..3 {
        runtime.dispatch(QuizEvent::ExplanationToggled(1), &mut screen);
    }
    assert!(step_until(&mut runtime, &mut screen, 3, |s| {
        s.panels()[1].state == Some(ExplanationState::Loaded("D is the last letter.".into()))
    })
    .await);
    assert_eq!(handle.call_count(GatewayCall::Submit), 1);
    assert_eq!(handle.call_count(GatewayCall::Explain), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_drops_pending_quiz() {
    let (mut runtime, handle) = mock_runtime(SessionOptions::default());
    handle.set_latency(Some(Duration::from_secs(2)));
    handle.push_quiz(questions(&["A"]), None);
    let mut screen = RecordingScreen::default();

    runtime.dispatch(start("Arrays", "beginner", 1), &mut screen);
    runtime.dispatch(QuizEvent::RestartRequested, &mut screen);

    // the late reply arrives and is ignored
    runtime.step(&mut screen).await;
    assert_eq!(runtime.session().phase(), Phase::Setup);
    assert!(runtime.session().questions().is_empty());
    assert_eq!(runtime.active_tickers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_quit_stops_everything() {
    let (mut runtime, handle) = mock_runtime(timed(false));
    handle.push_quiz(questions(&["A"]), None);
    let mut screen = RecordingScreen::default();

    runtime.dispatch(start("Arrays", "beginner", 1), &mut screen);
    assert!(step_until(&mut runtime, &mut screen, 3, |s| s.phase() == Phase::Playing).await);

    runtime.sender().send(QuizEvent::Quit).expect("runtime alive");
    runtime.run(&mut screen).await;
    assert!(runtime.is_finished());
    assert_eq!(runtime.active_tickers(), 0);
}
