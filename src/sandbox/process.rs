use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Result, ensure};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::config::LanguageConfig;

use super::{ExecOutcome, Sandbox};

/// Runs submissions as plain OS processes with redirected standard streams.
///
/// Each execution materializes the source into a private scratch file,
/// spawns a fresh interpreter process for it, feeds the test input on stdin
/// and captures stdout. The wall-clock limit is enforced with a hard kill:
/// the child is spawned with `kill_on_drop`, so abandoning the wait on
/// timeout terminates the process rather than leaving it behind.
pub struct ProcessSandbox {
    work_dir: PathBuf,
    time_limit: Duration,
    seq: AtomicU64,
}

impl ProcessSandbox {
    pub fn build(time_limit: Duration) -> Result<Self> {
        // One scratch directory per sandbox instance, so concurrent
        // instances never share source file paths.
        static INSTANCE: AtomicU64 = AtomicU64::new(0);
        let instance = INSTANCE.fetch_add(1, Ordering::Relaxed);

        let work_dir = std::env::temp_dir()
            .join("codedrill")
            .join(format!("{}-{instance}", std::process::id()));
        fs::create_dir_all(&work_dir)?;

        log::info!("ProcessSandbox initialized at {}", work_dir.display());
        log::warn!(
            "ProcessSandbox bounds wall-clock time only; run it in a trusted environment"
        );

        Ok(Self {
            work_dir,
            time_limit,
            seq: AtomicU64::new(0),
        })
    }
}

impl Sandbox for ProcessSandbox {
    async fn execute(
        &self,
        source_code: &str,
        language: &LanguageConfig,
        input: &str,
    ) -> Result<ExecOutcome> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let source = SourceFile::materialize(&self.work_dir, seq, language, source_code)?;
        let command = render_run_command(language, source.path());
        ensure!(
            !command.is_empty(),
            "empty run command for language {}",
            language.name
        );

        let mut cmd = tokio::process::Command::new(&command[0]);
        cmd.args(&command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .current_dir(&self.work_dir)
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let mut stdin = child.stdin.take();
        let run = async move {
            // Feed stdin while draining stdout, or a child that fills the
            // stdout pipe before reading its input deadlocks against us.
            let feed = async {
                if let Some(mut pipe) = stdin.take() {
                    let written = async {
                        pipe.write_all(input.as_bytes()).await?;
                        pipe.shutdown().await
                    }
                    .await;
                    // A child may exit without draining stdin; that is its
                    // business, not a sandbox fault.
                    if let Err(e) = written {
                        log::debug!("Input write ended early: {e}");
                    }
                }
            };
            let (_, output) = tokio::join!(feed, child.wait_with_output());
            anyhow::Ok(output?)
        };

        // Dropping `run` on timeout drops the child handle, which kills the
        // process thanks to kill_on_drop. The source file guard is dropped
        // on every path out of this function.
        match timeout(self.time_limit, run).await {
            Err(_elapsed) => Ok(ExecOutcome::Timeout),
            Ok(Err(e)) => Err(e),
            Ok(Ok(output)) => {
                if output.status.success() {
                    Ok(ExecOutcome::Completed {
                        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    })
                } else {
                    Ok(ExecOutcome::NonZeroExit {
                        code: output.status.code(),
                    })
                }
            }
        }
    }
}

/// Scoped source materialization: the file exists for the lifetime of this
/// guard and is removed on drop, whichever way the execution ended.
struct SourceFile {
    path: PathBuf,
}

impl SourceFile {
    fn materialize(
        dir: &Path,
        seq: u64,
        language: &LanguageConfig,
        source_code: &str,
    ) -> Result<Self> {
        let path = dir.join(format!("{seq}-{}", language.file_name));
        fs::write(&path, format!("{source_code}\n"))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SourceFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to remove source file {}: {e}", self.path.display());
        }
    }
}

fn render_run_command(language: &LanguageConfig, source_path: &Path) -> Vec<String> {
    let source = source_path.to_string_lossy();
    language
        .run_command
        .iter()
        .map(|part| part.replace("%SOURCE%", &source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_language() -> LanguageConfig {
        LanguageConfig {
            name: "sh".to_string(),
            file_name: "main.sh".to_string(),
            run_command: vec!["sh".to_string(), "%SOURCE%".to_string()],
        }
    }

    #[tokio::test]
    async fn test_captures_stdout_and_feeds_stdin() {
        let sandbox = ProcessSandbox::build(Duration::from_secs(2)).unwrap();
        let outcome = sandbox
            .execute("read a b\necho $((a + b))", &sh_language(), "3 4\n")
            .await
            .unwrap();
        match outcome {
            ExecOutcome::Completed { stdout } => assert_eq!(stdout.trim(), "7"),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_the_process() {
        let sandbox = ProcessSandbox::build(Duration::from_millis(200)).unwrap();
        let started = std::time::Instant::now();
        let outcome = sandbox
            .execute("sleep 10\necho done", &sh_language(), "")
            .await
            .unwrap();
        assert_eq!(outcome, ExecOutcome::Timeout);
        // The wait must end at the budget, not at the child's leisure.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_large_output_before_reading_input_does_not_deadlock() {
        // The child floods stdout well past the pipe buffer before it
        // touches stdin, while we still have more than a pipe buffer of
        // input to deliver. Both pipes must be driven at once.
        let sandbox = ProcessSandbox::build(Duration::from_secs(10)).unwrap();
        let script = "yes x | head -n 100000\ncat > /dev/null\necho done";
        let input = "x".repeat(100_000);
        let outcome = sandbox
            .execute(script, &sh_language(), &input)
            .await
            .unwrap();
        match outcome {
            ExecOutcome::Completed { stdout } => {
                assert!(stdout.trim_end().ends_with("done"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        let sandbox = ProcessSandbox::build(Duration::from_secs(2)).unwrap();
        let outcome = sandbox.execute("exit 3", &sh_language(), "").await.unwrap();
        assert_eq!(outcome, ExecOutcome::NonZeroExit { code: Some(3) });
    }

    #[tokio::test]
    async fn test_source_file_removed_after_run() {
        let sandbox = ProcessSandbox::build(Duration::from_secs(2)).unwrap();
        sandbox
            .execute("echo hi", &sh_language(), "")
            .await
            .unwrap();
        let leftovers: Vec<_> = fs::read_dir(&sandbox.work_dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .ends_with("main.sh")
            })
            .collect();
        assert!(leftovers.is_empty(), "source files left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error_not_a_verdict() {
        let sandbox = ProcessSandbox::build(Duration::from_secs(2)).unwrap();
        let bogus = LanguageConfig {
            name: "bogus".to_string(),
            file_name: "main.bogus".to_string(),
            run_command: vec![
                "definitely-not-an-interpreter".to_string(),
                "%SOURCE%".to_string(),
            ],
        };
        assert!(sandbox.execute("echo hi", &bogus, "").await.is_err());
    }
}
