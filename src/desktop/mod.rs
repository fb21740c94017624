//! The physical screen, pointer and keyboard as one explicit handle.
//!
//! There is exactly one pointer and one keyboard, so the process holds at most
//! one [`Desktop`] acquired from the OS. Every action runs inside a
//! [`DesktopSession`], which keeps a second action from interleaving with the
//! first.

pub mod runner;
#[cfg(test)]
pub mod testing;

pub use runner::{CommandOutput, CommandRunner, NativeRunner};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Set while a `Desktop` backed by the real OS is alive.
static DESKTOP_ACQUIRED: AtomicBool = AtomicBool::new(false);

pub struct Desktop {
    runner: Box<dyn CommandRunner>,
    in_flight: Mutex<()>,
    owns_os_handle: bool,
}

impl Desktop {
    /// Claim the OS desktop for this process.
    pub fn acquire(command_timeout: Option<Duration>) -> anyhow::Result<Self> {
        if DESKTOP_ACQUIRED.swap(true, Ordering::SeqCst) {
            anyhow::bail!("The desktop is already acquired by this process");
        }
        tracing::debug!(?command_timeout, "Desktop acquired");
        Ok(Self {
            runner: Box::new(NativeRunner::new(command_timeout)),
            in_flight: Mutex::new(()),
            owns_os_handle: true,
        })
    }

    /// A desktop driven by a custom runner (remote hosts, test doubles).
    pub fn with_runner(runner: impl CommandRunner + 'static) -> Self {
        Self {
            runner: Box::new(runner),
            in_flight: Mutex::new(()),
            owns_os_handle: false,
        }
    }

    /// Wait until no other action is running, then start one.
    pub async fn session(&self) -> DesktopSession<'_> {
        DesktopSession {
            runner: self.runner.as_ref(),
            _guard: self.in_flight.lock().await,
        }
    }
}

impl Drop for Desktop {
    fn drop(&mut self) {
        if self.owns_os_handle {
            DESKTOP_ACQUIRED.store(false, Ordering::SeqCst);
        }
    }
}

/// Exclusive use of the desktop for the duration of one action.
pub struct DesktopSession<'a> {
    runner: &'a dyn CommandRunner,
    _guard: MutexGuard<'a, ()>,
}

impl DesktopSession<'_> {
    pub async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        tracing::debug!(program, ?args, "Running command");
        let output = self.runner.run(program, args).await?;
        if !output.success() {
            tracing::debug!(program, status = ?output.status, "Command failed");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;

    #[test]
    fn os_desktop_is_acquired_once() {
        let first = Desktop::acquire(None).unwrap();
        assert!(Desktop::acquire(None).is_err());
        drop(first);
        let again = Desktop::acquire(None);
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn sessions_are_exclusive() {
        let desktop = Desktop::with_runner(ScriptedRunner::new());
        let session = desktop.session().await;
        assert!(desktop.in_flight.try_lock().is_err());
        drop(session);
        assert!(desktop.in_flight.try_lock().is_ok());
    }

    #[tokio::test]
    async fn session_forwards_to_runner() {
        let runner = ScriptedRunner::new();
        runner.respond("cliclick p", "Point: 1, 2");
        let desktop = Desktop::with_runner(runner.clone());
        let out = desktop
            .session()
            .await
            .run("cliclick", &["p".to_string()])
            .await
            .unwrap();
        assert_eq!(out.stdout, "Point: 1, 2");
        assert_eq!(runner.calls(), vec!["cliclick p"]);
    }
}
