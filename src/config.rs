use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Trait for settings that can be looked up in environment variables
pub trait KeyFromEnv {
    /// The environment variable name for this setting
    const KEY_NAME: &'static str;

    /// Find the value by checking environment variables, after loading .env
    fn find_key() -> Option<String> {
        // First try to load .env file (silently fail if not found)
        let _ = dotenvy::dotenv();

        env::var(Self::KEY_NAME).ok().filter(|v| !v.trim().is_empty())
    }

    /// Parse the value, warning and falling back to `None` when it is malformed
    fn parse_key<T: FromStr>() -> Option<T>
    where
        T::Err: fmt::Display,
    {
        let raw = Self::find_key()?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = Self::KEY_NAME, value = %raw, error = %e, "Ignoring malformed setting");
                None
            }
        }
    }
}

/// Who scores a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradingMode {
    /// Compare answers with each question's `correct` key locally.
    #[default]
    Client,
    /// Send the answers to `/submit-quiz`.
    Server,
}

impl FromStr for GradingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" | "local" => Ok(Self::Client),
            "server" | "remote" => Ok(Self::Server),
            _ => Err(format!("Unknown grading mode: '{}'. Supported: client, server", s)),
        }
    }
}

impl fmt::Display for GradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradingMode::Client => write!(f, "client"),
            GradingMode::Server => write!(f, "server"),
        }
    }
}

/// Where the per-question time limit comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerMode {
    Off,
    /// Fixed table per difficulty level.
    #[default]
    Level,
    /// The `time_limit` the service returns, 30 s when missing.
    Service,
}

impl FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "none" | "false" => Ok(Self::Off),
            "level" => Ok(Self::Level),
            "service" | "server" => Ok(Self::Service),
            _ => Err(format!("Unknown timer mode: '{}'. Supported: off, level, service", s)),
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerMode::Off => write!(f, "off"),
            TimerMode::Level => write!(f, "level"),
            TimerMode::Service => write!(f, "service"),
        }
    }
}

pub struct ServiceUrl;
impl KeyFromEnv for ServiceUrl {
    const KEY_NAME: &'static str = "QUIZ_SERVICE_URL";
}

pub struct Grading;
impl KeyFromEnv for Grading {
    const KEY_NAME: &'static str = "QUIZ_GRADING";
}

pub struct Timer;
impl KeyFromEnv for Timer {
    const KEY_NAME: &'static str = "QUIZ_TIMER";
}

pub struct AllowPrevious;
impl KeyFromEnv for AllowPrevious {
    const KEY_NAME: &'static str = "QUIZ_ALLOW_PREVIOUS";
}

pub struct RequestTimeout;
impl KeyFromEnv for RequestTimeout {
    const KEY_NAME: &'static str = "QUIZ_REQUEST_TIMEOUT_SECS";
}

pub struct RecordDir;
impl KeyFromEnv for RecordDir {
    const KEY_NAME: &'static str = "QUIZ_RECORD_DIR";
}

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct QuizConfig {
    pub service_url: String,
    pub grading: GradingMode,
    pub timer: TimerMode,
    pub allow_previous: bool,
    pub request_timeout: Duration,
    /// Directory for recorded gateway exchanges, if any
    pub record_dir: Option<PathBuf>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            grading: GradingMode::default(),
            timer: TimerMode::default(),
            allow_previous: false,
            request_timeout: Duration::from_secs(30),
            record_dir: None,
        }
    }
}

impl QuizConfig {
    /// Defaults overridden by `QUIZ_*` environment variables (and `.env`).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_url: ServiceUrl::find_key().unwrap_or(defaults.service_url),
            grading: Grading::parse_key().unwrap_or(defaults.grading),
            timer: Timer::parse_key().unwrap_or(defaults.timer),
            allow_previous: AllowPrevious::parse_key().unwrap_or(defaults.allow_previous),
            request_timeout: RequestTimeout::parse_key::<u64>()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            record_dir: RecordDir::find_key().map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    #[must_use]
    pub const fn with_grading(mut self, grading: GradingMode) -> Self {
        self.grading = grading;
        self
    }

    #[must_use]
    pub const fn with_timer(mut self, timer: TimerMode) -> Self {
        self.timer = timer;
        self
    }

    #[must_use]
    pub const fn with_allow_previous(mut self, allow: bool) -> Self {
        self.allow_previous = allow;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_record_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.record_dir = dir;
        self
    }
}
