use async_trait::async_trait;
use std::fmt::Debug;

use crate::gateway::GatewayCall;

/// Observer for the raw bodies the HTTP gateway exchanges with the service.
#[async_trait]
pub trait Interceptor: Send + Sync + Debug {
    async fn save(&self, call: GatewayCall, request: &str, response: &str) -> Result<(), Box<dyn std::error::Error>>;
}

pub mod file;
pub use file::FileInterceptor;
