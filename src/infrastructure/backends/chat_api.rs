#[cfg(test)]
#[path = "chat_api_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Attachment;
use crate::domain::models::Backend;
use crate::domain::models::ChatEndpoint;
use crate::domain::models::ChatMessage;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChatRequest {
    prompt: String,
    history: Vec<ChatMessage>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChatResponse {
    response: String,
}

/// HTTP client for the chat API: JSON for conversation turns, multipart for
/// documents.
pub struct ChatApi {
    url: String,
    endpoint: ChatEndpoint,
    timeout: String,
}

impl Default for ChatApi {
    fn default() -> ChatApi {
        let endpoint =
            ChatEndpoint::parse(Config::get(ConfigKey::Endpoint)).unwrap_or(ChatEndpoint::Chat);

        return ChatApi::new(
            &Config::get(ConfigKey::ApiURL),
            endpoint,
            &Config::get(ConfigKey::BackendHealthCheckTimeout),
        );
    }
}

impl ChatApi {
    pub fn new(url: &str, endpoint: ChatEndpoint, timeout: &str) -> ChatApi {
        return ChatApi {
            url: url.trim_end_matches('/').to_string(),
            endpoint,
            timeout: timeout.to_string(),
        };
    }

    pub fn with_endpoint(mut self, endpoint: ChatEndpoint) -> ChatApi {
        self.endpoint = endpoint;
        return self;
    }

    fn file_part(file: &Attachment) -> Result<multipart::Part> {
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.to_string())
            .mime_str(&file.mime_type)?;

        return Ok(part);
    }

    async fn read_response(&self, route: &str, res: reqwest::Response) -> Result<String> {
        let status = res.status().as_u16();
        if status >= 400 {
            let body = res.text().await.unwrap_or_default();
            tracing::error!(route, status, body, "Chat API request failed");
            bail!("Chat API request to {route} failed with status {status}");
        }

        let body = res.json::<ChatResponse>().await?;
        return Ok(body.response);
    }
}

#[async_trait]
impl Backend for ChatApi {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("Chat API URL is not defined");
        }

        let res = reqwest::Client::new()
            .get(format!("{url}/openapi.json", url = self.url))
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        let status = match res {
            Ok(res) => res.status().as_u16(),
            Err(err) => {
                tracing::error!(error = ?err, "Chat API is not reachable");
                bail!("Chat API is not reachable at {}", self.url);
            }
        };

        if status >= 400 {
            tracing::error!(status, "Chat API health check failed");
            bail!("Chat API health check failed with status {status}");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn send_message(&self, prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let route = format!("/{}", self.endpoint);
        let req = ChatRequest {
            prompt: prompt.to_string(),
            history: history.to_vec(),
        };

        tracing::debug!(route, history = history.len(), "Sending message");
        let res = reqwest::Client::new()
            .post(format!("{url}{route}", url = self.url))
            .json(&req)
            .send()
            .await?;

        return self.read_response(&route, res).await;
    }

    #[allow(clippy::implicit_return)]
    async fn send_file(&self, file: &Attachment) -> Result<String> {
        let route = "/upload-document";
        let form = multipart::Form::new().part("file", ChatApi::file_part(file)?);

        tracing::debug!(route, file = file.name, bytes = file.size(), "Uploading document");
        let res = reqwest::Client::new()
            .post(format!("{url}{route}", url = self.url))
            .multipart(form)
            .send()
            .await?;

        return self.read_response(route, res).await;
    }

    #[allow(clippy::implicit_return)]
    async fn analyze_document_with_prompt(
        &self,
        file: &Attachment,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        let route = "/analyze-document";
        let form = multipart::Form::new()
            .part("file", ChatApi::file_part(file)?)
            .text("prompt", prompt.to_string())
            .text("history", serde_json::to_string(history)?);

        tracing::debug!(
            route,
            file = file.name,
            bytes = file.size(),
            history = history.len(),
            "Analyzing document"
        );
        let res = reqwest::Client::new()
            .post(format!("{url}{route}", url = self.url))
            .multipart(form)
            .send()
            .await?;

        return self.read_response(route, res).await;
    }
}
