//! Scripted command runner for exercising the computer tool without a desktop.

use super::runner::{CommandOutput, CommandRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Bytes written in place of a real PNG capture.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

#[derive(Default)]
struct Script {
    calls: Vec<String>,
    stdout: HashMap<String, String>,
    stderr: HashMap<String, String>,
    unspawnable: HashSet<String>,
    capture_writes_file: bool,
}

/// Records every command line and answers from a script.
///
/// `screencapture` writes [`FAKE_PNG`] to its last argument unless
/// [`ScriptedRunner::fail_capture`] was called. Responses are looked up by the
/// full command line first, then by program name.
#[derive(Clone)]
pub struct ScriptedRunner {
    script: Arc<Mutex<Script>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                capture_writes_file: true,
                ..Script::default()
            })),
        }
    }

    pub fn respond(&self, command: &str, stdout: &str) -> &Self {
        self.script
            .lock()
            .stdout
            .insert(command.to_string(), stdout.to_string());
        self
    }

    pub fn respond_stderr(&self, command: &str, stderr: &str) -> &Self {
        self.script
            .lock()
            .stderr
            .insert(command.to_string(), stderr.to_string());
        self
    }

    pub fn fail_spawn(&self, program: &str) -> &Self {
        self.script.lock().unspawnable.insert(program.to_string());
        self
    }

    pub fn fail_capture(&self) -> &Self {
        self.script.lock().capture_writes_file = false;
        self
    }

    /// Command lines seen so far, `program arg1 arg2 ...`.
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().calls.clone()
    }

    /// Command lines for one program.
    pub fn calls_to(&self, program: &str) -> Vec<String> {
        let prefix = format!("{program} ");
        self.calls()
            .into_iter()
            .filter(|c| c == program || c.starts_with(&prefix))
            .collect()
    }
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup(map: &HashMap<String, String>, line: &str, program: &str) -> String {
    map.get(line)
        .or_else(|| map.get(program))
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let line = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let (stdout, stderr, write_capture) = {
            let mut script = self.script.lock();
            script.calls.push(line.clone());
            if script.unspawnable.contains(program) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{program}: command not found"),
                ));
            }
            (
                lookup(&script.stdout, &line, program),
                lookup(&script.stderr, &line, program),
                program == "screencapture" && script.capture_writes_file,
            )
        };

        if write_capture {
            if let Some(path) = args.last() {
                tokio::fs::write(path, FAKE_PNG).await?;
            }
        }

        Ok(CommandOutput {
            status: Some(if stderr.is_empty() { 0 } else { 1 }),
            stdout,
            stderr,
        })
    }
}
