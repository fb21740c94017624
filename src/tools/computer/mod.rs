//! Computer-use tool: drives the mouse, keyboard and screen through cliclick
//! and screencapture on macOS.

pub mod action;
pub mod error;
pub mod keys;
pub mod scaling;
pub mod screenshot;

pub use action::{Action, ActionKind, ActionRequest, Coordinate};
pub use error::{ComputerError, ComputerResult};
pub use keys::{KeyChord, Modifier};
pub use scaling::{Resolution, ScalingContext, ScalingSource, SCALING_TARGETS};
pub use screenshot::ScreenshotCapturer;

use super::traits::{Tool, ToolResult};
use crate::config::Config;
use crate::desktop::{Desktop, DesktopSession};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

/// Tool type understood by the Anthropic API.
pub const API_TYPE: &str = "computer_20241022";
const TOOL_NAME: &str = "computer";
const CLICLICK: &str = "cliclick";

/// cliclick wait (ms) before each typed chunk.
const TYPING_DELAY_MS: u64 = 12;
/// Characters per `t:` command.
const TYPING_GROUP_SIZE: usize = 50;
/// Delay before the screenshot that follows an action, so the UI can settle.
const SCREENSHOT_DELAY: Duration = Duration::from_secs(2);

/// Display parameters advertised to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComputerToolOptions {
    pub display_width_px: u32,
    pub display_height_px: u32,
    pub display_number: Option<u32>,
}

impl ComputerToolOptions {
    pub fn from_scaling(scaling: &ScalingContext) -> Self {
        let api = scaling.api_resolution();
        Self {
            display_width_px: api.width,
            display_height_px: api.height,
            display_number: scaling.display_num,
        }
    }

    /// The `tools` entry for the Messages API.
    pub fn api_definition(&self) -> serde_json::Value {
        json!({
            "type": API_TYPE,
            "name": TOOL_NAME,
            "display_width_px": self.display_width_px,
            "display_height_px": self.display_height_px,
            "display_number": self.display_number,
        })
    }
}

/// Lets the agent see the screen and control the mouse and keyboard.
pub struct ComputerTool {
    desktop: Desktop,
    scaling: ScalingContext,
    capturer: ScreenshotCapturer,
    screenshot_delay: Duration,
}

impl ComputerTool {
    pub fn new(desktop: Desktop, scaling: ScalingContext, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            desktop,
            capturer: ScreenshotCapturer::new(output_dir, scaling.target()),
            scaling,
            screenshot_delay: SCREENSHOT_DELAY,
        }
    }

    pub fn from_config(desktop: Desktop, config: &Config) -> anyhow::Result<Self> {
        let scaling = config.scaling_context()?;
        if let Some(name) = scaling.target_name() {
            tracing::info!(
                "Scaling {} display to {name} ({})",
                scaling.display,
                scaling.api_resolution()
            );
        }
        Ok(Self::new(desktop, scaling, config.output_dir())
            .with_screenshot_delay(config.screenshot_delay()))
    }

    #[must_use]
    pub fn with_screenshot_delay(mut self, delay: Duration) -> Self {
        self.screenshot_delay = delay;
        self
    }

    pub fn scaling(&self) -> &ScalingContext {
        &self.scaling
    }

    pub fn options(&self) -> ComputerToolOptions {
        ComputerToolOptions::from_scaling(&self.scaling)
    }

    /// Validate and perform one action.
    pub async fn run(&self, request: ActionRequest) -> ComputerResult<ToolResult> {
        let action = request.validate()?;
        let session = self.desktop.session().await;
        tracing::info!(action = %action.kind(), "Running computer action");

        match action {
            Action::MouseMove(coordinate) => {
                let (x, y) = self.to_screen(coordinate)?;
                self.cliclick(&session, vec![format!("m:{x},{y}")], true).await
            }
            Action::LeftClickDrag(coordinate) => {
                let (x, y) = self.to_screen(coordinate)?;
                self.cliclick(&session, vec![format!("dd:{x},{y}")], true).await
            }
            Action::Key(text) => {
                let chord = KeyChord::parse(&text)?;
                self.cliclick(&session, chord.to_cliclick_args(), true).await
            }
            Action::Type(text) => self.type_text(&session, &text).await,
            Action::LeftClick => self.cliclick(&session, vec!["c:.".into()], true).await,
            Action::RightClick => self.cliclick(&session, vec!["rc:.".into()], true).await,
            Action::DoubleClick => self.cliclick(&session, vec!["dc:.".into()], true).await,
            Action::MiddleClick => Err(ComputerError::UnsupportedAction(
                ActionKind::MiddleClick.to_string(),
            )),
            Action::Screenshot => self.capturer.capture(&session).await,
            Action::CursorPosition => self.cursor_position(&session).await,
        }
    }

    fn to_screen(&self, coordinate: Coordinate) -> ComputerResult<(u32, u32)> {
        self.scaling
            .scale(ScalingSource::Api, coordinate.x, coordinate.y)
    }

    async fn type_text(&self, session: &DesktopSession<'_>, text: &str) -> ComputerResult<ToolResult> {
        let mut output = String::new();
        let mut error = String::new();

        for chunk in chunks(text, TYPING_GROUP_SIZE) {
            let args = vec![format!("w:{TYPING_DELAY_MS}"), format!("t:{chunk}")];
            let result = self.cliclick(session, args, false).await?;
            output.push_str(result.output().unwrap_or_default());
            error.push_str(result.error().unwrap_or_default());
        }

        let screenshot = self.capturer.capture(session).await?;
        Ok(ToolResult::default()
            .with_output((!output.is_empty()).then_some(output))
            .with_error((!error.is_empty()).then_some(error))
            .with_base64_image(screenshot.base64_image().map(ToString::to_string)))
    }

    async fn cursor_position(&self, session: &DesktopSession<'_>) -> ComputerResult<ToolResult> {
        let result = self.cliclick(session, vec!["p".into()], false).await?;
        let (x, y) = parse_cursor_position(result.output().unwrap_or_default())?;
        let (x, y) = self.scaling.scale(ScalingSource::Computer, x, y)?;
        Ok(result.with_output(Some(format!("X={x},Y={y}"))))
    }

    /// One cliclick invocation, optionally followed by a settled screenshot.
    async fn cliclick(
        &self,
        session: &DesktopSession<'_>,
        args: Vec<String>,
        take_screenshot: bool,
    ) -> ComputerResult<ToolResult> {
        let output = session
            .run(CLICLICK, &args)
            .await
            .map_err(|source| ComputerError::ExecutionError {
                program: CLICLICK.into(),
                source,
            })?;
        let result = ToolResult::default()
            .with_output(output.output_text())
            .with_error(output.error_text());

        if !take_screenshot {
            return Ok(result);
        }

        tokio::time::sleep(self.screenshot_delay).await;
        let screenshot = self.capturer.capture(session).await?;
        Ok(result.with_base64_image(screenshot.base64_image().map(ToString::to_string)))
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "See the screen and control the mouse and keyboard of this macOS computer. \
         Actions: key, type, mouse_move, left_click, left_click_drag, right_click, \
         double_click, screenshot, cursor_position."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let actions: Vec<&str> = ActionKind::ALL.iter().map(|a| a.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "Action to perform",
                    "enum": actions
                },
                "text": {
                    "type": "string",
                    "description": "Text to type, or a key combination like 'cmd+c' or 'Return'"
                },
                "coordinate": {
                    "type": "array",
                    "description": "[x, y] target for mouse_move and left_click_drag",
                    "items": {"type": "integer", "minimum": 0},
                    "minItems": 2,
                    "maxItems": 2
                }
            },
            "required": ["action"],
            "additionalProperties": false
        })
    }

    fn api_definition(&self) -> serde_json::Value {
        self.options().api_definition()
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let outcome = match ActionRequest::from_json(&args) {
            Ok(request) => self.run(request).await,
            Err(e) => Err(e),
        };

        Ok(outcome.unwrap_or_else(|e| {
            tracing::warn!(kind = e.kind(), "Computer action failed: {e}");
            ToolResult::failure(e.to_string())
        }))
    }
}

/// Split on character boundaries into pieces of at most `size` characters.
fn chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Parse cliclick's position report, e.g. `"Point: 100, 200"`.
fn parse_cursor_position(raw: &str) -> ComputerResult<(u32, u32)> {
    let parse_error = || ComputerError::ParseError {
        what: "cursor position",
        raw: raw.to_string(),
    };

    let (_, coords) = raw.trim().split_once(':').ok_or_else(parse_error)?;
    let (x, y) = coords.split_once(',').ok_or_else(parse_error)?;
    let x = x.trim().parse::<u32>().map_err(|_| parse_error())?;
    let y = y.trim().parse::<u32>().map_err(|_| parse_error())?;
    Ok((x, y))
}
