use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::models::job::{FAILED_SENTINEL, PENDING_SENTINEL};

/// Longest stderr tail kept in an error summary.
const STDERR_TAIL_CHARS: usize = 500;

/// Black-box analysis routine that turns an asset into a verdict.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze the asset at `asset_path` and return its verdict string.
    async fn analyze(&self, asset_path: &Path) -> Result<String, AnalysisError>;
}

/// Standard output contract of the analysis routine. Extra keys are ignored.
#[derive(Debug, Deserialize)]
struct AnalysisOutput {
    result: String,
}

/// Runs the analysis routine as a child process:
/// `<program> <args...> <asset path>`.
pub struct ProcessAnalyzer {
    program: String,
    args: Vec<String>,
    deadline: Duration,
}

impl ProcessAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>, deadline: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            deadline,
        }
    }

    async fn spawn_and_wait(&self, asset_path: &Path) -> Result<std::process::Output, AnalysisError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(asset_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(AnalysisError::Spawn)?;

        // Dropping the wait future on expiry drops the child, which kills it.
        match timeout(self.deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AnalysisError::Io(e)),
            Err(_) => Err(AnalysisError::Timeout(self.deadline)),
        }
    }
}

#[async_trait]
impl Analyzer for ProcessAnalyzer {
    async fn analyze(&self, asset_path: &Path) -> Result<String, AnalysisError> {
        tracing::debug!(
            program = %self.program,
            args = ?self.args,
            asset_path = %asset_path.display(),
            deadline_secs = self.deadline.as_secs(),
            "Spawning analysis routine"
        );

        let output = self.spawn_and_wait(asset_path).await?;

        if !output.status.success() {
            return Err(AnalysisError::Exit {
                code: output.status.code(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_CHARS),
            });
        }

        parse_verdict(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the routine's standard output into a verdict.
///
/// The wire markers `"Pending"` and `"Failed"` are reserved and never accepted
/// as verdicts.
pub fn parse_verdict(stdout: &str) -> Result<String, AnalysisError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::Parse("empty output".to_string()));
    }

    let parsed: AnalysisOutput = serde_json::from_str(trimmed)
        .map_err(|e| AnalysisError::Parse(format!("{}: {}", e, tail(trimmed, 200))))?;

    let verdict = parsed.result.trim();
    if verdict.is_empty() {
        return Err(AnalysisError::Parse("blank result".to_string()));
    }
    if verdict == PENDING_SENTINEL || verdict == FAILED_SENTINEL {
        return Err(AnalysisError::Parse(format!("reserved marker {:?} as result", verdict)));
    }
    Ok(verdict.to_string())
}

fn tail(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Failed to spawn analysis routine: {0}")]
    Spawn(std::io::Error),

    #[error("Analysis routine exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("Analysis routine exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("Failed waiting on analysis routine: {0}")]
    Io(std::io::Error),

    #[error("Unparsable analysis output: {0}")]
    Parse(String),
}

impl AnalysisError {
    /// Process-level failure as opposed to an output parse failure.
    pub fn is_process_error(&self) -> bool {
        !matches!(self, AnalysisError::Parse(_))
    }
}
