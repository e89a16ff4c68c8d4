use super::Interceptor;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use chrono::Utc;

use crate::gateway::GatewayCall;

/// Writes every exchange to `<base>/<call>_<timestamp>.md`.
#[derive(Debug, Clone)]
pub struct FileInterceptor {
    base_path: PathBuf,
}

impl FileInterceptor {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file_stem(call: GatewayCall) -> &'static str {
        match call {
            GatewayCall::Generate => "generate",
            GatewayCall::Submit => "submit",
            GatewayCall::Explain => "explain",
        }
    }
}

#[async_trait]
impl Interceptor for FileInterceptor {
    async fn save(&self, call: GatewayCall, request: &str, response: &str) -> Result<(), Box<dyn std::error::Error>> {
        let timestamp = Utc::now();
        let filename = format!("{}_{}.md", Self::file_stem(call), timestamp.format("%Y%m%d_%H%M%S_%3f"));
        let file_path = self.base_path.join(filename);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = format!(
            "# POST {}\n\n## Request\n\n```json\n{}\n```\n\n## Response\n\n```json\n{}\n```\n",
            call.path(),
            request,
            response
        );

        let mut file = fs::File::create(&file_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
