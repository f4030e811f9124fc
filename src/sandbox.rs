mod process;

pub use process::ProcessSandbox;

use std::future::Future;

use anyhow::Result;

use crate::config::LanguageConfig;

/// Outcome of running one program against one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// The program finished within budget with exit code 0; `stdout` is the
    /// captured standard output, untrimmed.
    Completed { stdout: String },
    /// The wall-clock budget expired and the process was killed.
    Timeout,
    /// The program exited with a non-zero code (or was signalled).
    NonZeroExit { code: Option<i32> },
}

/// Capability interface for executing one untrusted program against one
/// input payload.
///
/// Implementations must run each call in a fresh process with no shared
/// state between executions. Timeouts and crashes are reported as
/// `ExecOutcome` variants; an `Err` means the sandbox itself failed (spawn
/// or I/O error) and is not a grading signal.
pub trait Sandbox: Send + Sync {
    fn execute(
        &self,
        source_code: &str,
        language: &LanguageConfig,
        input: &str,
    ) -> impl Future<Output = Result<ExecOutcome>> + Send;
}
