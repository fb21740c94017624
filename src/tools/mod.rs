pub mod computer;
pub mod traits;

pub use computer::{ComputerError, ComputerTool, ComputerToolOptions};
pub use traits::{Tool, ToolResult, ToolSpec};

use crate::config::Config;
use crate::desktop::Desktop;

/// Tools registered for the agent, in the order they are advertised.
pub fn default_tools(desktop: Desktop, config: &Config) -> anyhow::Result<Vec<Box<dyn Tool>>> {
    let computer: Box<dyn Tool> = Box::new(ComputerTool::from_config(desktop, config)?);
    Ok(vec![computer])
}

pub fn find_tool<'a>(tools: &'a [Box<dyn Tool>], name: &str) -> Option<&'a dyn Tool> {
    tools.iter().find(|t| t.name() == name).map(|t| &**t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::testing::ScriptedRunner;

    fn config() -> Config {
        let mut config = Config::default();
        config.display.width = 1920;
        config.display.height = 1080;
        config
    }

    #[test]
    fn default_tools_registers_computer() {
        let tools = default_tools(Desktop::with_runner(ScriptedRunner::new()), &config()).unwrap();
        assert_eq!(tools.len(), 1);
        assert!(find_tool(&tools, "computer").is_some());
        assert!(find_tool(&tools, "bash").is_none());
    }

    #[test]
    fn default_tools_rejects_unset_display() {
        let result = default_tools(Desktop::with_runner(ScriptedRunner::new()), &Config::default());
        assert!(result.is_err());
    }
}
