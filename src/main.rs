use anyhow::Context;
use base64::Engine;
use clap::{ArgAction, Parser, Subcommand};
use deskpilot::agent::{run_tool_loop, AgentSettings, LoopObserver};
use deskpilot::desktop::Desktop;
use deskpilot::providers::{self, ChatMessage, ContentBlock};
use deskpilot::tools::{self, ComputerTool, Tool, ToolResult};
use deskpilot::Config;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::AsyncBufReadExt;
use tracing::level_filters::LevelFilter;

/// Let an LLM agent see and drive this Mac.
#[derive(Parser, Debug)]
#[command(name = "deskpilot", version, about)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive conversation with the agent
    Chat,

    /// Run one computer action, e.g. '{"action":"cursor_position"}'
    Act {
        /// Action request as JSON
        json: String,
    },

    /// Show the tool definition and build information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Chat => chat(&config).await,
        Commands::Act { json } => act(&config, &json).await,
        Commands::Info => info(&config),
    }
}

async fn chat(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    let api_key = config
        .provider
        .api_key
        .as_deref()
        .context("ANTHROPIC_API_KEY environment variable must be set")?;
    let provider = providers::create_provider(&config.provider.name, Some(api_key))?;
    let desktop = Desktop::acquire(config.command_timeout())?;
    let tools = tools::default_tools(desktop, config)?;
    let settings = AgentSettings::from_config(config);

    if let Err(e) = provider.warmup().await {
        tracing::warn!("Provider warmup failed: {e}");
    }

    println!("Computer Use Agent CLI (type 'exit' to quit)");
    println!("{}", "-".repeat(50));
    println!("\nNote: This agent can control the mouse and keyboard of this computer.");
    println!("Type 'exit' or press Ctrl+C to quit at any time.");

    let observer = CliObserver;
    let mut messages: Vec<ChatMessage> = Vec::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let turn_start = messages.len();
        messages.push(ChatMessage::user(input));
        println!("\nClaude is thinking and may use tools...");

        if let Err(e) =
            run_tool_loop(provider.as_ref(), &tools, &mut messages, &settings, &observer).await
        {
            tracing::warn!("Turn aborted: {e:#}");
            // Drop the failed turn so the history stays well-formed.
            messages.truncate(turn_start);
        }
    }

    println!("\nExiting...");
    Ok(())
}

async fn act(config: &Config, raw: &str) -> anyhow::Result<()> {
    let args: serde_json::Value =
        serde_json::from_str(raw).context("Action must be a JSON object")?;
    let desktop = Desktop::acquire(config.command_timeout())?;
    let tool = ComputerTool::from_config(desktop, config)?;

    let result = tool.execute(args).await?;
    println!("{}", serde_json::to_string_pretty(&result_summary(&result))?);
    Ok(())
}

fn result_summary(result: &ToolResult) -> serde_json::Value {
    let image_bytes = result.base64_image().map(|data| {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_or(0, |bytes| bytes.len())
    });
    json!({
        "output": result.output(),
        "error": result.error(),
        "system": result.system(),
        "image_bytes": image_bytes,
    })
}

fn info(config: &Config) -> anyhow::Result<()> {
    let scaling = config.scaling_context()?;
    let definition = tools::ComputerToolOptions::from_scaling(&scaling).api_definition();

    println!("deskpilot {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Built {} ({})",
        env!("DESKPILOT_BUILD_TIME"),
        env!("DESKPILOT_GIT_SHA")
    );
    match Config::default_path() {
        Some(path) => println!("Config: {}", path.display()),
        None => println!("Config: <no platform config dir>"),
    }
    println!("Display: {}", scaling.display);
    match scaling.target_name() {
        Some(name) => println!("Scaling: {name} ({})", scaling.api_resolution()),
        None => println!("Scaling: none"),
    }
    println!("Screenshots: {}", config.output_dir().display());
    println!("Provider: {} / {}", config.provider.name, config.provider.model);
    println!("\n{}", serde_json::to_string_pretty(&definition)?);
    Ok(())
}

/// Prints the conversation to the terminal.
struct CliObserver;

impl LoopObserver for CliObserver {
    fn on_assistant_block(&self, block: &ContentBlock) {
        match block {
            ContentBlock::Text { text } => println!("\nClaude: {text}"),
            ContentBlock::ToolUse { name, input, .. } => {
                println!("\nTool Use: {name}\nInput: {input}");
            }
            _ => {}
        }
    }

    fn on_tool_result(&self, _tool_use_id: &str, result: &ToolResult) {
        if let Some(error) = result.error() {
            println!("\nTool Error: {error}");
        }
        if let Some(output) = result.output() {
            println!("\nTool Output: {output}");
        }
        if let Some(system) = result.system() {
            println!("\nSystem: {system}");
        }
        if result.base64_image().is_some() {
            println!("\nScreenshot captured and sent to Claude");
        }
    }

    fn on_api_error(&self, error: &anyhow::Error) {
        println!("\nAPI Error: {error:#}");
    }
}
