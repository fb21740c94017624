use super::error::{ComputerError, ComputerResult};
use std::fmt;

/// Keys that cliclick's `kp:` command supports.
/// Anything else (letters, digits, punctuation) is sent with `t:` while the
/// modifiers are held.
const CLICLICK_SPECIAL_KEYS: &[&str] = &[
    "arrow-down", "arrow-left", "arrow-right", "arrow-up",
    "brightness-down", "brightness-up",
    "delete", "end", "enter", "esc", "escape",
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8",
    "f9", "f10", "f11", "f12", "f13", "f14", "f15", "f16",
    "fwd-delete", "home",
    "keys-light-down", "keys-light-toggle", "keys-light-up",
    "mute",
    "num-0", "num-1", "num-2", "num-3", "num-4",
    "num-5", "num-6", "num-7", "num-8", "num-9",
    "num-clear", "num-divide", "num-enter", "num-equals",
    "num-minus", "num-multiply", "num-plus",
    "page-down", "page-up",
    "play-next", "play-pause", "play-previous",
    "return", "space", "tab",
    "volume-down", "volume-up",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Alt,
    Cmd,
    Ctrl,
    Fn,
    Shift,
}

impl Modifier {
    /// Recognise a modifier token, case-insensitively.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "alt" | "option" | "opt" => Some(Self::Alt),
            "cmd" | "command" | "super" | "meta" => Some(Self::Cmd),
            "ctrl" | "control" => Some(Self::Ctrl),
            "fn" => Some(Self::Fn),
            "shift" => Some(Self::Shift),
            _ => None,
        }
    }

    /// Name cliclick uses in `kd:` / `ku:`.
    pub fn as_cliclick(self) -> &'static str {
        match self {
            Self::Alt => "alt",
            Self::Cmd => "cmd",
            Self::Ctrl => "ctrl",
            Self::Fn => "fn",
            Self::Shift => "shift",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cliclick())
    }
}

/// A parsed key combination such as `ctrl+shift+Escape`.
///
/// `modifiers` is a stack in acquisition order: pressed first-to-last and
/// released last-to-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub modifiers: Vec<Modifier>,
    pub key: Option<String>,
}

impl KeyChord {
    pub fn parse(text: &str) -> ComputerResult<Self> {
        let mut modifiers = Vec::new();
        let mut key: Option<String> = None;

        for token in text.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(modifier) = Modifier::parse(token) {
                modifiers.push(modifier);
                continue;
            }
            if key.is_some() {
                return Err(ComputerError::invalid("Only one non-modifier key allowed"));
            }
            key = Some(map_key_name(token));
        }

        if modifiers.is_empty() && key.is_none() {
            return Err(ComputerError::invalid(format!(
                "No key found in key combination {text:?}"
            )));
        }

        Ok(Self { modifiers, key })
    }

    /// Modifiers in release order.
    pub fn release_order(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.modifiers.iter().rev().copied()
    }

    /// Arguments for a single cliclick invocation.
    ///
    /// - `"Return"` → `["kp:enter"]`
    /// - `"cmd+c"` → `["kd:cmd", "t:c", "ku:cmd"]`
    /// - `"ctrl+shift+Escape"` → `["kd:ctrl,shift", "kp:escape", "ku:shift,ctrl"]`
    pub fn to_cliclick_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(3);

        if !self.modifiers.is_empty() {
            args.push(format!("kd:{}", join_modifiers(self.modifiers.iter().copied())));
        }

        if let Some(key) = &self.key {
            if is_cliclick_special_key(key) {
                args.push(format!("kp:{key}"));
            } else {
                args.push(format!("t:{key}"));
            }
        }

        if !self.modifiers.is_empty() {
            args.push(format!("ku:{}", join_modifiers(self.release_order())));
        }

        args
    }
}

fn join_modifiers(modifiers: impl Iterator<Item = Modifier>) -> String {
    modifiers
        .map(Modifier::as_cliclick)
        .collect::<Vec<_>>()
        .join(",")
}

fn is_cliclick_special_key(key: &str) -> bool {
    CLICLICK_SPECIAL_KEYS.contains(&key)
}

/// Map X11-style key names to cliclick's names; anything unknown is lowercased.
fn map_key_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let mapped = match lower.as_str() {
        "return" | "enter" | "kp_enter" => "enter",
        "backspace" => "delete",
        "delete" => "fwd-delete",
        "escape" | "esc" => "escape",
        "tab" => "tab",
        "space" => "space",
        "left" => "arrow-left",
        "right" => "arrow-right",
        "up" => "arrow-up",
        "down" => "arrow-down",
        "home" => "home",
        "end" => "end",
        "page_up" | "pageup" | "prior" => "page-up",
        "page_down" | "pagedown" | "next" => "page-down",
        _ => return lower,
    };
    mapped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_key() {
        let chord = KeyChord::parse("Return").unwrap();
        assert!(chord.modifiers.is_empty());
        assert_eq!(chord.key.as_deref(), Some("enter"));
        assert_eq!(chord.to_cliclick_args(), vec!["kp:enter"]);
    }

    #[test]
    fn modifiers_released_in_reverse_order() {
        let chord = KeyChord::parse("ctrl+shift+Escape").unwrap();
        assert_eq!(chord.modifiers, vec![Modifier::Ctrl, Modifier::Shift]);
        assert_eq!(chord.key.as_deref(), Some("escape"));
        assert_eq!(
            chord.release_order().collect::<Vec<_>>(),
            vec![Modifier::Shift, Modifier::Ctrl]
        );
        assert_eq!(
            chord.to_cliclick_args(),
            vec!["kd:ctrl,shift", "kp:escape", "ku:shift,ctrl"]
        );
    }

    #[test]
    fn three_modifiers() {
        assert_eq!(
            KeyChord::parse("ctrl+alt+shift+BackSpace")
                .unwrap()
                .to_cliclick_args(),
            vec!["kd:ctrl,alt,shift", "kp:delete", "ku:shift,alt,ctrl"]
        );
    }

    #[test]
    fn modifiers_are_case_insensitive() {
        let chord = KeyChord::parse("CTRL+Shift+f5").unwrap();
        assert_eq!(chord.modifiers, vec![Modifier::Ctrl, Modifier::Shift]);
        assert_eq!(chord.key.as_deref(), Some("f5"));
    }

    #[test]
    fn two_regular_keys_rejected() {
        let err = KeyChord::parse("a+b").unwrap_err();
        assert!(matches!(err, ComputerError::InvalidArgument(_)));
        assert!(err.to_string().contains("Only one non-modifier key allowed"));
    }

    #[test]
    fn character_keys_are_typed_while_held() {
        assert_eq!(
            KeyChord::parse("cmd+C").unwrap().to_cliclick_args(),
            vec!["kd:cmd", "t:c", "ku:cmd"]
        );
        assert_eq!(
            KeyChord::parse("super+space").unwrap().to_cliclick_args(),
            vec!["kd:cmd", "kp:space", "ku:cmd"]
        );
    }

    #[test]
    fn modifiers_alone_are_held_and_released() {
        let chord = KeyChord::parse("cmd+shift").unwrap();
        assert!(chord.key.is_none());
        assert_eq!(chord.to_cliclick_args(), vec!["kd:cmd,shift", "ku:shift,cmd"]);
    }

    #[test]
    fn symbolic_names_mapped() {
        for (input, expected) in [
            ("Left", "arrow-left"),
            ("Right", "arrow-right"),
            ("Up", "arrow-up"),
            ("Down", "arrow-down"),
            ("Page_Up", "page-up"),
            ("Page_Down", "page-down"),
            ("Delete", "fwd-delete"),
            ("Tab", "tab"),
            ("F12", "f12"),
        ] {
            assert_eq!(map_key_name(input), expected, "{input}");
        }
    }

    #[test]
    fn empty_combination_rejected() {
        assert!(KeyChord::parse("").is_err());
        assert!(KeyChord::parse(" + ").is_err());
    }
}
