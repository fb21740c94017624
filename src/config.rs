//! Runtime configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then the
//! environment. Environment variables win.

use crate::tools::computer::{Resolution, ScalingContext};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub provider: ProviderConfig,
    pub computer: ComputerConfig,
    pub agent: AgentConfig,
}

/// Logical size of the screen being controlled. Width and height have no
/// default and must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub display_num: Option<u32>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            display_num: Some(1),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "anthropic".into(),
            api_key: None,
            model: "claude-3-5-sonnet-20241022".into(),
            max_tokens: 4096,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputerConfig {
    pub scaling_enabled: bool,
    /// Settle time before the screenshot that follows an action.
    pub screenshot_delay_ms: u64,
    pub output_dir: String,
    /// Per-command limit. Unset waits for the command indefinitely.
    pub command_timeout_secs: Option<u64>,
}

impl Default for ComputerConfig {
    fn default() -> Self {
        Self {
            scaling_enabled: true,
            screenshot_delay_ms: 2000,
            output_dir: "/tmp/outputs".into(),
            command_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Screenshots kept in the history sent to the model. `None` keeps all.
    pub only_n_most_recent_images: Option<usize>,
    /// Appended to the built-in system prompt.
    pub system_prompt_suffix: String,
    /// Model calls allowed per user turn.
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            only_n_most_recent_images: Some(10),
            system_prompt_suffix: String::new(),
            max_iterations: 50,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when it exists, then
    /// apply the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// `<platform config dir>/deskpilot/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "deskpilot")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Override fields from environment variables looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(width) = get("WIDTH") {
            self.display.width = parse_env("WIDTH", &width)?;
        }
        if let Some(height) = get("HEIGHT") {
            self.display.height = parse_env("HEIGHT", &height)?;
        }
        if let Some(num) = get("DISPLAY_NUM") {
            self.display.display_num = Some(parse_env("DISPLAY_NUM", &num)?);
        }
        if let Some(name) = get("API_PROVIDER") {
            self.provider.name = name.trim().to_lowercase();
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = get("DESKPILOT_MODEL") {
            self.provider.model = model;
        }
        Ok(())
    }

    /// Check the fields every command needs.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.display.width == 0 || self.display.height == 0 {
            bail!("WIDTH and HEIGHT must be set to positive integers (env or [display] in config)");
        }
        Ok(())
    }

    pub fn display_resolution(&self) -> anyhow::Result<Resolution> {
        self.validate()?;
        Ok(Resolution::new(self.display.width, self.display.height))
    }

    pub fn scaling_context(&self) -> anyhow::Result<ScalingContext> {
        Ok(ScalingContext::new(
            self.display_resolution()?,
            self.display.display_num,
            self.computer.scaling_enabled,
        ))
    }

    /// Screenshot directory with `~` and `$VARS` expanded.
    pub fn output_dir(&self) -> PathBuf {
        match shellexpand::full(&self.computer.output_dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                tracing::warn!("Cannot expand output_dir: {e}");
                PathBuf::from(&self.computer.output_dir)
            }
        }
    }

    pub fn screenshot_delay(&self) -> Duration {
        Duration::from_millis(self.computer.screenshot_delay_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.computer.command_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} must be a non-negative integer, got {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.display.display_num, Some(1));
        assert_eq!(config.provider.name, "anthropic");
        assert!(config.computer.scaling_enabled);
        assert_eq!(config.screenshot_delay(), Duration::from_secs(2));
        assert_eq!(config.command_timeout(), None);
        assert_eq!(config.agent.only_n_most_recent_images, Some(10));
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[display]
width = 2560
height = 1600

[computer]
scaling_enabled = false
command_timeout_secs = 30
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.display.width, 2560);
        assert_eq!(config.display.display_num, Some(1));
        assert!(!config.computer.scaling_enabled);
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.provider.max_tokens, 4096);
    }

    #[test]
    fn bad_toml_names_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.toml");
        std::fs::write(&path, "[display\nwidth = ").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config.display.width = 800;
        config
            .apply_env(env(&[
                ("WIDTH", "1920"),
                ("HEIGHT", "1080"),
                ("DISPLAY_NUM", "2"),
                ("API_PROVIDER", " Anthropic "),
                ("ANTHROPIC_API_KEY", "sk-test"),
                ("DESKPILOT_MODEL", "claude-test"),
            ]))
            .unwrap();

        assert_eq!(config.display_resolution().unwrap(), Resolution::new(1920, 1080));
        assert_eq!(config.display.display_num, Some(2));
        assert_eq!(config.provider.name, "anthropic");
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.provider.model, "claude-test");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.display.width = 640;
        config.apply_env(env(&[("WIDTH", "  ")])).unwrap();
        assert_eq!(config.display.width, 640);
    }

    #[test]
    fn non_numeric_width_is_rejected() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("WIDTH", "wide")])).unwrap_err();
        assert!(err.to_string().contains("WIDTH"));
    }

    #[test]
    fn zero_height_fails_validation() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("WIDTH", "1920"), ("HEIGHT", "0")]))
            .unwrap();
        assert!(config.scaling_context().is_err());
    }

    #[test]
    fn scaling_context_follows_config() {
        let mut config = Config::default();
        config.display.width = 1920;
        config.display.height = 1080;
        let ctx = config.scaling_context().unwrap();
        assert_eq!(ctx.api_resolution(), Resolution::new(1366, 768));
        assert_eq!(ctx.display_num, Some(1));
    }

    #[test]
    fn output_dir_expands_tilde() {
        let mut config = Config::default();
        config.computer.output_dir = "~/shots".into();
        let dir = config.output_dir();
        assert!(!dir.to_string_lossy().starts_with('~'));
        assert!(dir.ends_with("shots"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = Config::default();
        config.provider.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
