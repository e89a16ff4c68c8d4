pub mod config;
pub mod error;
pub mod gateway;
pub mod grading;
pub mod interceptors;
pub mod model;
pub mod render;
pub mod runtime;
pub mod session;
pub mod terminal;
pub mod timer;

// Convenient re-exports
pub use config::QuizConfig;
pub use error::{GatewayError, QuizError};
pub use gateway::{FlexibleGateway, GatewayType, HttpGateway, MockGateway, QuizGateway};
pub use model::{Answer, Level, Question};
pub use runtime::{QuizRuntime, Screen};
pub use session::{Command, Phase, QuizEvent, Session, SessionOptions};
