pub mod anthropic;
pub mod traits;

pub use anthropic::AnthropicProvider;
pub use traits::{ChatMessage, ChatRequest, ChatResponse, ContentBlock, Provider, ToolCall};

/// Longest error body kept in an error message.
const MAX_API_ERROR_CHARS: usize = 500;

/// Build a provider by name. Only `anthropic` supports the computer tool.
pub fn create_provider(name: &str, api_key: Option<&str>) -> anyhow::Result<Box<dyn Provider>> {
    match name {
        "anthropic" => Ok(Box::new(AnthropicProvider::new(api_key))),
        other => anyhow::bail!(
            "Unsupported API_PROVIDER {other:?}; computer use is available with \"anthropic\" only"
        ),
    }
}

/// Turn a non-success HTTP response into an error with a bounded body excerpt.
pub(crate) async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
    anyhow::anyhow!("{provider} API error ({status}): {}", excerpt(&body))
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_API_ERROR_CHARS {
        return body.to_string();
    }
    let head: String = body.chars().take(MAX_API_ERROR_CHARS).collect();
    format!("{head}...")
}
