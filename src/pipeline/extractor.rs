//! Extraction invoker.
//!
//! The pipeline only cares whether extraction succeeded. What the
//! collaborator actually reads off the label is none of its business.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

use super::error::ExtractError;

/// Result of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionOutcome {
    pub ok: bool,
    /// Captured error stream (or timeout notice) for operators.
    pub diagnostic: String,
}

impl ExtractionOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            diagnostic: String::new(),
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Anything that can run extraction against a stabilized label.
///
/// Implementations must be safe to call repeatedly on the same input.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Run extraction. `Err` means the extractor itself broke, not that the
    /// label was unreadable.
    async fn extract(&self, path: &Path) -> Result<ExtractionOutcome, ExtractError>;
}

/// Runs an external program with the label's absolute path as last argument.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandExtractor {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    fn absolute(path: &Path) -> Result<PathBuf, ExtractError> {
        std::path::absolute(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl Extractor for CommandExtractor {
    fn name(&self) -> &str {
        &self.program
    }

    async fn extract(&self, path: &Path) -> Result<ExtractionOutcome, ExtractError> {
        let target = Self::absolute(path)?;

        crate::debug_event!(
            "extract",
            "running",
            "{} {} {}",
            self.program,
            self.args.join(" "),
            target.display()
        );

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Timing out drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(ExtractionOutcome::failure(format!(
                    "failed to collect extractor output: {e}"
                )));
            }
            Err(_) => {
                return Ok(ExtractionOutcome::failure(format!(
                    "extractor timed out after {}s",
                    self.timeout.as_secs_f32()
                )));
            }
        };

        if output.status.success() {
            return Ok(ExtractionOutcome::success());
        }

        let mut diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if diagnostic.is_empty() {
            diagnostic = format!("extractor exited with {}", output.status);
        }
        Ok(ExtractionOutcome::failure(diagnostic))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandExtractor {
        CommandExtractor::new("sh", vec!["-c".to_string(), script.to_string(), "sh".to_string()], timeout)
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let extractor = sh("test -n \"$1\"", Duration::from_secs(10));
        let outcome = extractor.extract(Path::new("label.jpg")).await.unwrap();
        assert_eq!(outcome, ExtractionOutcome::success());
    }

    #[tokio::test]
    async fn test_path_is_absolute_last_argument() {
        let extractor = sh(
            "case \"$1\" in /*) exit 0;; *) echo \"relative: $1\" >&2; exit 1;; esac",
            Duration::from_secs(10),
        );
        let outcome = extractor.extract(Path::new("label.jpg")).await.unwrap();
        assert!(outcome.ok, "{}", outcome.diagnostic);
    }

    #[tokio::test]
    async fn test_nonzero_exit_captures_stderr() {
        let extractor = sh("echo 'no batch number found' >&2; exit 3", Duration::from_secs(10));
        let outcome = extractor.extract(Path::new("label.jpg")).await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.diagnostic, "no batch number found");
    }

    #[tokio::test]
    async fn test_silent_failure_reports_status() {
        let extractor = sh("exit 2", Duration::from_secs(10));
        let outcome = extractor.extract(Path::new("label.jpg")).await.unwrap();
        assert!(!outcome.ok);
        assert!(outcome.diagnostic.contains("exit"));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let extractor = sh("sleep 5", Duration::from_millis(100));
        let outcome = extractor.extract(Path::new("label.jpg")).await.unwrap();
        assert!(!outcome.ok);
        assert!(outcome.diagnostic.contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_extractor_error() {
        let extractor = CommandExtractor::new(
            "/definitely/not/an/extractor",
            vec![],
            Duration::from_secs(1),
        );
        let err = extractor.extract(Path::new("label.jpg")).await.unwrap_err();
        assert!(matches!(err, ExtractError::Spawn { .. }));
    }
}
