use crate::config::Config;
use crate::providers::traits::{ChatMessage, ChatRequest, ContentBlock, ImageSource, Provider};
use crate::tools::{find_tool, Tool, ToolResult};
use std::fmt::Write;

/// Receives everything the loop produces, as it happens.
pub trait LoopObserver: Send + Sync {
    /// A text or tool_use block from the model.
    fn on_assistant_block(&self, _block: &ContentBlock) {}

    fn on_tool_result(&self, _tool_use_id: &str, _result: &ToolResult) {}

    fn on_api_error(&self, _error: &anyhow::Error) {}
}

/// Observer that ignores everything.
pub struct SilentObserver;

impl LoopObserver for SilentObserver {}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Screenshots kept in history. `None` keeps all of them.
    pub only_n_most_recent_images: Option<usize>,
    pub max_iterations: usize,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.provider.model.clone(),
            max_tokens: config.provider.max_tokens,
            system_prompt: build_system_prompt(&config.agent.system_prompt_suffix),
            only_n_most_recent_images: config.agent.only_n_most_recent_images,
            max_iterations: config.agent.max_iterations,
        }
    }
}

/// System prompt with today's date and an optional suffix.
pub fn build_system_prompt(suffix: &str) -> String {
    let date = chrono::Local::now().format("%A, %B %-d, %Y");
    let mut prompt = format!(
        "<SYSTEM_CAPABILITY>\n\
         * You are controlling a macOS computer through the `computer` tool.\n\
         * You can see the screen by taking a screenshot, move and click the mouse, press key combinations and type text.\n\
         * Most actions return a screenshot taken about two seconds later; check it before acting again.\n\
         * Key combinations use `+`, e.g. `cmd+space` to open Spotlight or `cmd+tab` to switch apps.\n\
         * Middle clicks are not available.\n\
         * The current date is {date}.\n\
         </SYSTEM_CAPABILITY>"
    );
    if !suffix.trim().is_empty() {
        let _ = write!(prompt, "\n\n{}", suffix.trim());
    }
    prompt
}

/// Run the model until it stops calling tools. Appends every turn to
/// `messages` and returns the text of the final assistant message.
pub async fn run_tool_loop(
    provider: &dyn Provider,
    tools: &[Box<dyn Tool>],
    messages: &mut Vec<ChatMessage>,
    settings: &AgentSettings,
    observer: &dyn LoopObserver,
) -> anyhow::Result<String> {
    let tool_defs: Vec<serde_json::Value> = tools.iter().map(|t| t.api_definition()).collect();

    for iteration in 0..settings.max_iterations {
        if let Some(keep) = settings.only_n_most_recent_images {
            filter_recent_images(messages, keep);
        }

        let request = ChatRequest {
            system: &settings.system_prompt,
            messages: messages.as_slice(),
            tools: &tool_defs,
        };
        let response = match provider
            .chat(request, &settings.model, settings.max_tokens)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                observer.on_api_error(&e);
                return Err(e);
            }
        };

        let tool_calls = response.tool_calls();
        let text = response.text();
        let content = response.into_history_content();
        for block in &content {
            observer.on_assistant_block(block);
        }
        messages.push(ChatMessage::assistant(content));

        if tool_calls.is_empty() {
            tracing::debug!(iteration, "Model finished without tool calls");
            return Ok(text);
        }

        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let result = match find_tool(tools, &call.name) {
                Some(tool) => tool.execute(call.input).await.unwrap_or_else(|e| {
                    tracing::warn!(tool = %call.name, "Tool execution failed: {e:#}");
                    ToolResult::failure(format!("{e:#}"))
                }),
                None => ToolResult::failure(format!("Unknown tool: {}", call.name)),
            };
            observer.on_tool_result(&call.id, &result);
            results.push(tool_result_block(&call.id, &result));
        }
        messages.push(ChatMessage::tool_results(results));
    }

    anyhow::bail!(
        "Agent stopped after {} model calls without finishing",
        settings.max_iterations
    )
}

/// Convert a tool result into a `tool_result` content block.
pub fn tool_result_block(tool_use_id: &str, result: &ToolResult) -> ContentBlock {
    let mut content = Vec::new();
    let is_error = result.is_error();

    if let Some(error) = result.error() {
        content.push(ContentBlock::text(with_system_note(result, error)));
    } else {
        if let Some(output) = result.output() {
            content.push(ContentBlock::text(with_system_note(result, output)));
        }
        if let Some(image) = result.base64_image() {
            content.push(ContentBlock::Image {
                source: ImageSource::png(image),
            });
        }
    }

    ContentBlock::ToolResult {
        tool_use_id: tool_use_id.to_string(),
        content,
        is_error,
    }
}

fn with_system_note(result: &ToolResult, text: &str) -> String {
    match result.system() {
        Some(system) => format!("<system>{system}</system>\n{text}"),
        None => text.to_string(),
    }
}

/// Drop the oldest screenshots inside tool results so at most `keep` remain.
pub fn filter_recent_images(messages: &mut [ChatMessage], keep: usize) {
    let total: usize = messages
        .iter()
        .flat_map(|m| m.content.iter())
        .map(tool_result_image_count)
        .sum();
    let mut to_remove = total.saturating_sub(keep);
    if to_remove == 0 {
        return;
    }
    tracing::debug!(total, removing = to_remove, "Trimming old screenshots");

    for message in messages.iter_mut() {
        for block in &mut message.content {
            if to_remove == 0 {
                return;
            }
            if let ContentBlock::ToolResult { content, .. } = block {
                content.retain(|inner| {
                    if to_remove > 0 && inner.is_image() {
                        to_remove -= 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }
    }
}

fn tool_result_image_count(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::ToolResult { content, .. } => content.iter().filter(|b| b.is_image()).count(),
        _ => 0,
    }
}
