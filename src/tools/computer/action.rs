use super::error::{ComputerError, ComputerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parameters the computer tool accepts. Anything else is rejected.
const ACCEPTED_PARAMS: &[&str] = &["action", "text", "coordinate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Key,
    Type,
    MouseMove,
    LeftClick,
    LeftClickDrag,
    RightClick,
    MiddleClick,
    DoubleClick,
    Screenshot,
    CursorPosition,
}

impl ActionKind {
    pub const ALL: [Self; 10] = [
        Self::Key,
        Self::Type,
        Self::MouseMove,
        Self::LeftClick,
        Self::LeftClickDrag,
        Self::RightClick,
        Self::MiddleClick,
        Self::DoubleClick,
        Self::Screenshot,
        Self::CursorPosition,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Type => "type",
            Self::MouseMove => "mouse_move",
            Self::LeftClick => "left_click",
            Self::LeftClickDrag => "left_click_drag",
            Self::RightClick => "right_click",
            Self::MiddleClick => "middle_click",
            Self::DoubleClick => "double_click",
            Self::Screenshot => "screenshot",
            Self::CursorPosition => "cursor_position",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ComputerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ComputerError::invalid(format!("Invalid action: {s}")))
    }
}

/// A point in agent space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
}

impl Coordinate {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Accepts only `[x, y]` with two non-negative integers.
    fn from_json(value: &serde_json::Value) -> ComputerResult<Self> {
        let items = match value.as_array() {
            Some(items) if items.len() == 2 => items,
            _ => {
                return Err(ComputerError::invalid(format!(
                    "{value} must be a tuple of length 2"
                )))
            }
        };
        let component = |v: &serde_json::Value| {
            v.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    ComputerError::invalid(format!("{value} must be a tuple of non-negative ints"))
                })
        };
        Ok(Self {
            x: component(&items[0])?,
            y: component(&items[1])?,
        })
    }
}

/// Raw request as received from the model, before field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: ActionKind,
    pub text: Option<String>,
    pub coordinate: Option<Coordinate>,
}

impl ActionRequest {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            text: None,
            coordinate: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_coordinate(mut self, x: u32, y: u32) -> Self {
        self.coordinate = Some(Coordinate::new(x, y));
        self
    }

    /// Decode the tool input object. JSON `null` counts as absent.
    pub fn from_json(args: &serde_json::Value) -> ComputerResult<Self> {
        let obj = args
            .as_object()
            .ok_or_else(|| ComputerError::invalid("Tool input must be a JSON object"))?;

        if let Some(extra) = obj.keys().find(|k| !ACCEPTED_PARAMS.contains(&k.as_str())) {
            return Err(ComputerError::invalid(format!(
                "Unexpected parameter: {extra}"
            )));
        }

        let action = obj
            .get("action")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ComputerError::invalid("Missing required parameter: action"))?
            .parse::<ActionKind>()?;

        let text = match obj.get("text") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(ComputerError::invalid(format!("{other} must be a string")))
            }
        };

        let coordinate = match obj.get("coordinate") {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(Coordinate::from_json(value)?),
        };

        Ok(Self {
            action,
            text,
            coordinate,
        })
    }

    /// Check the field combination for the action and produce the typed form.
    pub fn validate(self) -> ComputerResult<Action> {
        let Self {
            action,
            text,
            coordinate,
        } = self;

        match action {
            ActionKind::MouseMove => {
                Ok(Action::MouseMove(coordinate_only(action, text, coordinate)?))
            }
            ActionKind::LeftClickDrag => {
                Ok(Action::LeftClickDrag(coordinate_only(action, text, coordinate)?))
            }
            ActionKind::Key => Ok(Action::Key(text_only(action, text, coordinate)?)),
            ActionKind::Type => Ok(Action::Type(text_only(action, text, coordinate)?)),
            ActionKind::LeftClick => {
                no_arguments(action, text, coordinate).map(|()| Action::LeftClick)
            }
            ActionKind::RightClick => {
                no_arguments(action, text, coordinate).map(|()| Action::RightClick)
            }
            ActionKind::MiddleClick => {
                no_arguments(action, text, coordinate).map(|()| Action::MiddleClick)
            }
            ActionKind::DoubleClick => {
                no_arguments(action, text, coordinate).map(|()| Action::DoubleClick)
            }
            ActionKind::Screenshot => {
                no_arguments(action, text, coordinate).map(|()| Action::Screenshot)
            }
            ActionKind::CursorPosition => {
                no_arguments(action, text, coordinate).map(|()| Action::CursorPosition)
            }
        }
    }
}

fn coordinate_only(
    action: ActionKind,
    text: Option<String>,
    coordinate: Option<Coordinate>,
) -> ComputerResult<Coordinate> {
    let coordinate = coordinate
        .ok_or_else(|| ComputerError::invalid(format!("coordinate is required for {action}")))?;
    if text.is_some() {
        return Err(ComputerError::invalid(format!(
            "text is not accepted for {action}"
        )));
    }
    Ok(coordinate)
}

fn text_only(
    action: ActionKind,
    text: Option<String>,
    coordinate: Option<Coordinate>,
) -> ComputerResult<String> {
    let text =
        text.ok_or_else(|| ComputerError::invalid(format!("text is required for {action}")))?;
    if coordinate.is_some() {
        return Err(ComputerError::invalid(format!(
            "coordinate is not accepted for {action}"
        )));
    }
    Ok(text)
}

fn no_arguments(
    action: ActionKind,
    text: Option<String>,
    coordinate: Option<Coordinate>,
) -> ComputerResult<()> {
    if text.is_some() {
        return Err(ComputerError::invalid(format!(
            "text is not accepted for {action}"
        )));
    }
    if coordinate.is_some() {
        return Err(ComputerError::invalid(format!(
            "coordinate is not accepted for {action}"
        )));
    }
    Ok(())
}

/// A validated action; each variant carries exactly the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Key(String),
    Type(String),
    MouseMove(Coordinate),
    LeftClickDrag(Coordinate),
    LeftClick,
    RightClick,
    MiddleClick,
    DoubleClick,
    Screenshot,
    CursorPosition,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Key(_) => ActionKind::Key,
            Self::Type(_) => ActionKind::Type,
            Self::MouseMove(_) => ActionKind::MouseMove,
            Self::LeftClickDrag(_) => ActionKind::LeftClickDrag,
            Self::LeftClick => ActionKind::LeftClick,
            Self::RightClick => ActionKind::RightClick,
            Self::MiddleClick => ActionKind::MiddleClick,
            Self::DoubleClick => ActionKind::DoubleClick,
            Self::Screenshot => ActionKind::Screenshot,
            Self::CursorPosition => ActionKind::CursorPosition,
        }
    }
}
