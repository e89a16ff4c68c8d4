//! Event loop driving a `Session`.
//!
//! One event is applied at a time. Gateway calls and the once-a-second
//! ticker run as tokio tasks whose only job is to send events back through
//! the queue, so the session is never touched concurrently.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::config::QuizConfig;
use crate::gateway::{GatewayCall, QuizGateway};
use crate::render::{self, View};
use crate::session::{Command, GatewayReply, QuizEvent, Session, SessionOptions};
use crate::timer::TimerToken;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Receives every freshly rendered view.
pub trait Screen {
    fn show(&mut self, view: &View, session: &Session);
}

/// Screen that discards everything, for headless use.
#[derive(Debug, Default)]
pub struct NullScreen;

impl Screen for NullScreen {
    fn show(&mut self, _view: &View, _session: &Session) {}
}

pub struct QuizRuntime {
    session: Session,
    gateway: Arc<dyn QuizGateway>,
    events_tx: UnboundedSender<QuizEvent>,
    events_rx: UnboundedReceiver<QuizEvent>,
    /// Follow-up events produced by the session; served before the channel.
    pending: VecDeque<QuizEvent>,
    ticker: Option<JoinHandle<()>>,
    tick_period: Duration,
    quit: bool,
}

impl QuizRuntime {
    pub fn new(options: SessionOptions, gateway: Arc<dyn QuizGateway>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        info!(?options, "Creating quiz runtime");
        Self {
            session: Session::new(options),
            gateway,
            events_tx,
            events_rx,
            pending: VecDeque::new(),
            ticker: None,
            tick_period: TICK_PERIOD,
            quit: false,
        }
    }

    pub fn from_config(config: &QuizConfig, gateway: Arc<dyn QuizGateway>) -> Self {
        Self::new(SessionOptions::from(config), gateway)
    }

    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> View {
        render::render(&self.session)
    }

    /// Sender for front-ends that produce user events.
    pub fn sender(&self) -> UnboundedSender<QuizEvent> {
        self.events_tx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.quit
    }

    /// Number of ticker tasks still alive. Never more than one.
    pub fn active_tickers(&self) -> usize {
        self.ticker.as_ref().map_or(0, |t| usize::from(!t.is_finished()))
    }

    /// Apply one event and everything it triggers synchronously, rendering
    /// after each step.
    pub fn dispatch(&mut self, event: QuizEvent, screen: &mut dyn Screen) {
        self.pending.push_back(event);
        while let Some(event) = self.pending.pop_front() {
            if matches!(event, QuizEvent::Quit) {
                self.quit = true;
            }
            trace!(?event, "Applying event");
            let commands = self.session.handle(event);
            for command in commands {
                self.execute(command);
            }
            screen.show(&self.view(), &self.session);
        }
        if self.quit {
            self.stop_ticker();
        }
    }

    /// Wait for the next queued event and apply it. Returns false once the
    /// runtime has quit.
    pub async fn step(&mut self, screen: &mut dyn Screen) -> bool {
        if self.quit {
            return false;
        }
        match self.next_event().await {
            Some(event) => {
                self.dispatch(event, screen);
                !self.quit
            }
            None => false,
        }
    }

    /// Next event from timers, gateway calls and `sender()` clones.
    /// Cancel safe, so it can sit in a `select!` next to other inputs.
    pub async fn next_event(&mut self) -> Option<QuizEvent> {
        self.events_rx.recv().await
    }

    /// Run until a `Quit` event is processed.
    pub async fn run(&mut self, screen: &mut dyn Screen) {
        screen.show(&self.view(), &self.session);
        while self.step(screen).await {}
        info!("Quiz runtime stopped");
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::StartTimer { token, seconds } => {
                debug!(question = token.question, seconds, "Starting ticker");
                self.start_ticker(token);
            }
            Command::CancelTimer => self.stop_ticker(),
            Command::Dispatch(event) => self.pending.push_back(event),
            Command::Generate { epoch, request } => {
                let gateway = self.gateway.clone();
                self.spawn_call(epoch, GatewayCall::Generate, None, async move {
                    gateway.generate_quiz(request).await.map(GatewayReply::Quiz)
                });
            }
            Command::Submit { epoch, request } => {
                let gateway = self.gateway.clone();
                self.spawn_call(epoch, GatewayCall::Submit, None, async move {
                    gateway.submit_quiz(request).await.map(GatewayReply::Results)
                });
            }
            Command::Explain { epoch, index, request } => {
                let gateway = self.gateway.clone();
                self.spawn_call(epoch, GatewayCall::Explain, Some(index), async move {
                    gateway
                        .get_explanation(request)
                        .await
                        .map(|text| GatewayReply::Explanation { index, text })
                });
            }
        }
    }

    fn spawn_call<F>(&self, epoch: u64, call: GatewayCall, question: Option<usize>, request: F)
    where
        F: std::future::Future<Output = Result<GatewayReply, crate::error::GatewayError>> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        debug!(%call, epoch, "Spawning gateway call");
        tokio::spawn(async move {
            let event = match request.await {
                Ok(reply) => QuizEvent::GatewayResponded { epoch, reply },
                Err(error) => QuizEvent::GatewayFailed { epoch, call, question, error },
            };
            // receiver gone means the runtime shut down
            let _ = tx.send(event);
        });
    }

    fn start_ticker(&mut self, token: TimerToken) {
        self.stop_ticker();
        let tx = self.events_tx.clone();
        let period = self.tick_period;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(QuizEvent::TimerTicked(token)).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for QuizRuntime {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
