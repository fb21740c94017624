use super::error::{ComputerError, ComputerResult};
use super::scaling::Resolution;
use crate::desktop::DesktopSession;
use crate::tools::traits::ToolResult;
use base64::Engine;
use std::path::PathBuf;

/// Captures the screen to PNG files under one directory.
#[derive(Debug, Clone)]
pub struct ScreenshotCapturer {
    output_dir: PathBuf,
    resize_to: Option<Resolution>,
}

impl ScreenshotCapturer {
    /// `resize_to` is the agent-facing resolution when scaling is active.
    pub fn new(output_dir: impl Into<PathBuf>, resize_to: Option<Resolution>) -> Self {
        Self {
            output_dir: output_dir.into(),
            resize_to,
        }
    }

    /// Capture the screen and return it base64-encoded in the result.
    ///
    /// Files are left in place; cleaning the directory is up to the caller.
    pub async fn capture(&self, session: &DesktopSession<'_>) -> ComputerResult<ToolResult> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                ComputerError::CaptureError(format!(
                    "cannot create {}: {e}",
                    self.output_dir.display()
                ))
            })?;

        let path = self
            .output_dir
            .join(format!("screenshot_{}.png", uuid::Uuid::new_v4().simple()));
        let path_arg = path.to_string_lossy().into_owned();

        let output = session
            .run("screencapture", &["-x".to_string(), path_arg.clone()])
            .await
            .map_err(|source| ComputerError::ExecutionError {
                program: "screencapture".into(),
                source,
            })?;
        let result = ToolResult::default()
            .with_output(output.output_text())
            .with_error(output.error_text());

        if let Some(target) = self.resize_to {
            self.resize(session, &path_arg, target).await;
        }

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ComputerError::CaptureError(
                result
                    .error()
                    .unwrap_or("screencapture produced no file")
                    .to_string(),
            ));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ComputerError::CaptureError(format!("cannot read {path_arg}: {e}")))?;
        tracing::debug!(path = %path_arg, bytes = bytes.len(), "Screenshot captured");

        Ok(result.with_base64_image(Some(
            base64::engine::general_purpose::STANDARD.encode(&bytes),
        )))
    }

    /// Downscale in place. A failed resize still leaves a usable capture.
    async fn resize(&self, session: &DesktopSession<'_>, path: &str, target: Resolution) {
        let args = [
            "-z".to_string(),
            target.height.to_string(),
            target.width.to_string(),
            path.to_string(),
        ];
        match session.run("sips", &args).await {
            Ok(out) if !out.success() => {
                tracing::warn!(
                    "Screenshot resize to {target} failed: {}",
                    out.error_text().unwrap_or_default()
                );
            }
            Err(e) => tracing::warn!("Failed to execute sips: {e}"),
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::testing::{ScriptedRunner, FAKE_PNG};
    use crate::desktop::Desktop;
    use tempfile::TempDir;

    #[tokio::test]
    async fn capture_encodes_file() {
        let tmp = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let desktop = Desktop::with_runner(runner.clone());
        let capturer = ScreenshotCapturer::new(tmp.path().join("shots"), None);

        let result = capturer.capture(&desktop.session().await).await.unwrap();

        let expected = base64::engine::general_purpose::STANDARD.encode(FAKE_PNG);
        assert_eq!(result.base64_image(), Some(expected.as_str()));
        assert!(result.error().is_none());
        assert!(runner.calls_to("sips").is_empty());

        let files: Vec<_> = std::fs::read_dir(tmp.path().join("shots")).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn capture_uses_unique_names() {
        let tmp = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let desktop = Desktop::with_runner(runner.clone());
        let capturer = ScreenshotCapturer::new(tmp.path(), None);

        capturer.capture(&desktop.session().await).await.unwrap();
        capturer.capture(&desktop.session().await).await.unwrap();

        let calls = runner.calls_to("screencapture");
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0], calls[1]);
    }

    #[tokio::test]
    async fn capture_resizes_to_target() {
        let tmp = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let desktop = Desktop::with_runner(runner.clone());
        let capturer = ScreenshotCapturer::new(tmp.path(), Some(Resolution::new(1366, 768)));

        capturer.capture(&desktop.session().await).await.unwrap();

        let sips = runner.calls_to("sips");
        assert_eq!(sips.len(), 1);
        assert!(sips[0].starts_with("sips -z 768 1366 "));
    }

    #[tokio::test]
    async fn missing_file_is_capture_error() {
        let tmp = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        runner
            .fail_capture()
            .respond_stderr("screencapture", "could not create image from display");
        let desktop = Desktop::with_runner(runner);
        let capturer = ScreenshotCapturer::new(tmp.path(), None);

        let err = capturer.capture(&desktop.session().await).await.unwrap_err();
        assert!(matches!(err, ComputerError::CaptureError(_)));
        assert!(err.to_string().contains("could not create image"));
    }

    #[tokio::test]
    async fn resize_failure_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        runner.fail_spawn("sips");
        let desktop = Desktop::with_runner(runner);
        let capturer = ScreenshotCapturer::new(tmp.path(), Some(Resolution::new(1024, 768)));

        let result = capturer.capture(&desktop.session().await).await.unwrap();
        assert!(result.base64_image().is_some());
    }
}
