pub mod loop_;

pub use loop_::{
    build_system_prompt, run_tool_loop, AgentSettings, LoopObserver, SilentObserver,
};
