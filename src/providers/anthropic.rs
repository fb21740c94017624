use crate::providers::traits::{ChatMessage, ChatRequest, ChatResponse, Provider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

const BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
/// Beta flag that enables the `computer_20241022` tool type.
const COMPUTER_USE_BETA: &str = "computer-use-2024-10-22";

pub struct AnthropicProvider {
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "is_blank")]
    system: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "has_no_tools")]
    tools: &'a [serde_json::Value],
}

fn is_blank(system: &&str) -> bool {
    system.trim().is_empty()
}

fn has_no_tools(tools: &&[serde_json::Value]) -> bool {
    tools.is_empty()
}

impl AnthropicProvider {
    pub fn new(api_key: Option<&str>) -> Self {
        Self {
            api_key: api_key.map(ToString::to_string),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(600))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn api_key(&self) -> anyhow::Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("Anthropic API key not set. Set ANTHROPIC_API_KEY or [provider] api_key.")
        })
    }

    fn build_body<'a>(
        request: &ChatRequest<'a>,
        model: &'a str,
        max_tokens: u32,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model,
            max_tokens,
            system: request.system,
            messages: request.messages,
            tools: request.tools,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn chat(
        &self,
        request: ChatRequest<'_>,
        model: &str,
        max_tokens: u32,
    ) -> anyhow::Result<ChatResponse> {
        let api_key = self.api_key()?;
        let body = Self::build_body(&request, model, max_tokens);

        tracing::debug!(
            model,
            messages = request.messages.len(),
            "Sending Anthropic request"
        );

        let response = self
            .client
            .post(format!("{BASE_URL}/v1/messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("anthropic-beta", COMPUTER_USE_BETA)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("Anthropic", response).await);
        }

        let chat_response: ChatResponse = response.json().await?;
        tracing::debug!(
            stop_reason = chat_response.stop_reason.as_deref().unwrap_or("none"),
            usage = ?chat_response.usage,
            "Anthropic response"
        );
        Ok(chat_response)
    }

    async fn warmup(&self) -> anyhow::Result<()> {
        // Any response means the TLS connection is up; status does not matter.
        if self.api_key.is_some() {
            self.client.get(BASE_URL).send().await?;
        }
        Ok(())
    }
}
