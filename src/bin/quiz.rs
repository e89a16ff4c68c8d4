use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyEvent};
use crossterm::{cursor, execute, terminal as term};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use quiz_session::config::{GradingMode, QuizConfig, TimerMode};
use quiz_session::gateway::{FlexibleGateway, GatewayType, QuizGateway};
use quiz_session::model::Level;
use quiz_session::render::View;
use quiz_session::runtime::{QuizRuntime, Screen};
use quiz_session::session::Session;
use quiz_session::terminal::{SetupForm, TerminalUi};

#[derive(Parser)]
#[command(author, version, about = "Timed multiple-choice quiz in the terminal", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    QUIZ_SERVICE_URL           Base URL of the quiz service
    QUIZ_GRADING               client|server
    QUIZ_TIMER                 off|level|service
    QUIZ_ALLOW_PREVIOUS        true|false
    QUIZ_REQUEST_TIMEOUT_SECS  Per-request timeout in seconds
    QUIZ_RECORD_DIR            Write each request/response pair here
    RUST_LOG                   Log filter, used with --log-file

EXAMPLES:
    quiz --mock --topic Lists            # Offline, built-in questions
    quiz --service-url http://localhost:8000 --grading server
    quiz --timer off --allow-previous --log-file quiz.log")]
struct Args {
    /// Base URL of the quiz service
    #[arg(long)]
    service_url: Option<String>,

    /// Who scores the quiz: client, server
    #[arg(long)]
    grading: Option<GradingMode>,

    /// Per-question time limit source: off, level, service
    #[arg(long)]
    timer: Option<TimerMode>,

    /// Allow going back to earlier questions
    #[arg(long)]
    allow_previous: bool,

    /// Request timeout in seconds
    #[arg(long)]
    request_timeout: Option<u64>,

    /// Record gateway exchanges as markdown files in this directory
    #[arg(long)]
    record_dir: Option<PathBuf>,

    /// Gateway to use: http, mock [default: http if a service URL is set]
    #[arg(long)]
    gateway: Option<GatewayType>,

    /// Shorthand for --gateway mock
    #[arg(long, conflicts_with = "gateway")]
    mock: bool,

    /// Prefill the topic field
    #[arg(long)]
    topic: Option<String>,

    /// Prefill the level field: beginner, intermediate, advanced
    #[arg(long)]
    level: Option<Level>,

    /// Prefill the number of questions
    #[arg(long)]
    count: Option<u32>,

    /// Write logs to this file (the terminal is in raw mode)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> QuizConfig {
        let mut config = QuizConfig::from_env();
        if let Some(url) = &self.service_url {
            config = config.with_service_url(url.clone());
        }
        if let Some(grading) = self.grading {
            config = config.with_grading(grading);
        }
        if let Some(timer) = self.timer {
            config = config.with_timer(timer);
        }
        if self.allow_previous {
            config = config.with_allow_previous(true);
        }
        if let Some(secs) = self.request_timeout.filter(|s| *s > 0) {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if self.record_dir.is_some() {
            config = config.with_record_dir(self.record_dir.clone());
        }
        config
    }

    fn gateway_type(&self) -> GatewayType {
        match (self.mock, self.gateway, self.service_url.is_some()) {
            (true, _, _) => GatewayType::Mock,
            (false, Some(kind), _) => kind,
            (false, None, true) => GatewayType::Http,
            (false, None, false) => GatewayType::default(),
        }
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("Failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quiz_session=info")))
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Paints views onto the raw-mode terminal.
struct TerminalScreen {
    ui: TerminalUi,
    out: io::Stdout,
}

impl TerminalScreen {
    fn paint(&mut self, view: &View) -> io::Result<()> {
        execute!(self.out, term::Clear(term::ClearType::All), cursor::MoveTo(0, 0))?;
        for line in self.ui.lines(view) {
            // raw mode needs the carriage return
            write!(self.out, "{}\r\n", line)?;
        }
        self.out.flush()
    }
}

impl Screen for TerminalScreen {
    fn show(&mut self, view: &View, _session: &Session) {
        if let Err(e) = self.paint(view) {
            error!(error = %e, "Failed to paint view");
        }
    }
}

/// Blocking key reader; stops when the receiver is gone.
fn spawn_key_reader(tx: UnboundedSender<KeyEvent>) {
    std::thread::spawn(move || loop {
        match event::poll(Duration::from_millis(200)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Failed to read terminal event");
                    break;
                }
            },
            Ok(false) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to poll terminal");
                break;
            }
        }
    });
}

async fn run(runtime: &mut QuizRuntime, screen: &mut TerminalScreen) {
    let (keys_tx, mut keys_rx) = mpsc::unbounded_channel();
    spawn_key_reader(keys_tx);

    screen.show(&runtime.view(), runtime.session());
    while !runtime.is_finished() {
        tokio::select! {
            Some(event) = runtime.next_event() => runtime.dispatch(event, screen),
            Some(key) = keys_rx.recv() => {
                if let Some(event) = screen.ui.map_key(runtime.session(), key) {
                    runtime.dispatch(event, screen);
                }
            }
            else => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let config = args.config();
    let kind = args.gateway_type();
    info!(?config, gateway = %kind, "Starting quiz");

    let gateway = match kind {
        GatewayType::Http => FlexibleGateway::http(&config).context("Failed to create HTTP gateway")?,
        GatewayType::Mock => FlexibleGateway::new_lazy(GatewayType::Mock).context("Failed to create mock gateway")?,
    };
    let gateway: Arc<dyn QuizGateway> = Arc::new(gateway);
    let mut runtime = QuizRuntime::from_config(&config, gateway);
    let mut screen = TerminalScreen {
        ui: TerminalUi::new(SetupForm::new(args.topic.clone(), args.count, args.level)),
        out: io::stdout(),
    };

    term::enable_raw_mode().context("Failed to enable raw mode")?;
    execute!(screen.out, term::EnterAlternateScreen, cursor::Hide).context("Failed to prepare terminal")?;

    run(&mut runtime, &mut screen).await;

    execute!(screen.out, cursor::Show, term::LeaveAlternateScreen).context("Failed to restore terminal")?;
    term::disable_raw_mode().context("Failed to disable raw mode")?;
    info!("Quiz closed");
    Ok(())
}
