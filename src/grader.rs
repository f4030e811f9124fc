use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::LanguageConfig;
use crate::routes::TestCaseRecord;
use crate::sandbox::{ExecOutcome, Sandbox};

/// Lifecycle of a submission. `Pending` is the only non-terminal state; the
/// grading run moves a submission to exactly one of the terminal states and
/// it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Passed,
    Failed,
    UnsupportedLanguage,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::UnsupportedLanguage => "unsupported_language",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "unsupported_language" => Some(Self::UnsupportedLanguage),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grades one submission against its test cases and returns the terminal
/// verdict.
///
/// The caller is responsible for rejecting problems with zero test cases
/// before getting here; that situation is a client error, not a verdict.
///
/// An unknown language short-circuits to `UnsupportedLanguage` without a
/// single sandbox invocation. Otherwise cases run sequentially in the order
/// given, and the first mismatch, timeout or crash short-circuits to
/// `Failed`; later cases are never executed. Output comparison is exact
/// string equality after trimming both sides.
pub async fn grade<S: Sandbox>(
    sandbox: &S,
    languages: &[LanguageConfig],
    language: &str,
    source_code: &str,
    cases: &[TestCaseRecord],
) -> anyhow::Result<SubmissionStatus> {
    debug_assert!(!cases.is_empty(), "grade called with zero test cases");

    // Language tags match case-insensitively: "Python" selects "python"
    let Some(language) = languages
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(language))
    else {
        return Ok(SubmissionStatus::UnsupportedLanguage);
    };

    for case in cases {
        match sandbox
            .execute(source_code, language, &case.input_data)
            .await?
        {
            ExecOutcome::Completed { stdout } => {
                if stdout.trim() != case.expected_output.trim() {
                    log::debug!("Test case {} mismatched", case.id);
                    return Ok(SubmissionStatus::Failed);
                }
            }
            ExecOutcome::Timeout => {
                log::debug!("Test case {} timed out", case.id);
                return Ok(SubmissionStatus::Failed);
            }
            ExecOutcome::NonZeroExit { code } => {
                log::debug!("Test case {} exited with code {code:?}", case.id);
                return Ok(SubmissionStatus::Failed);
            }
        }
    }

    Ok(SubmissionStatus::Passed)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Sandbox double that replays scripted outcomes and counts invocations.
    struct SpySandbox {
        calls: AtomicUsize,
        outcomes: Mutex<Vec<ExecOutcome>>,
    }

    impl SpySandbox {
        fn new(outcomes: Vec<ExecOutcome>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcomes: Mutex::new(outcomes),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Sandbox for SpySandbox {
        async fn execute(
            &self,
            _source_code: &str,
            _language: &LanguageConfig,
            _input: &str,
        ) -> anyhow::Result<ExecOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            assert!(!outcomes.is_empty(), "sandbox invoked more than scripted");
            Ok(outcomes.remove(0))
        }
    }

    fn languages() -> Vec<LanguageConfig> {
        vec![LanguageConfig {
            name: "python".to_string(),
            file_name: "main.py".to_string(),
            run_command: vec!["python3".to_string(), "%SOURCE%".to_string()],
        }]
    }

    fn case(id: i64, input: &str, expected: &str) -> TestCaseRecord {
        TestCaseRecord {
            id,
            problem_id: 1,
            input_data: input.to_string(),
            expected_output: expected.to_string(),
            is_sample: false,
        }
    }

    fn completed(stdout: &str) -> ExecOutcome {
        ExecOutcome::Completed {
            stdout: stdout.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unsupported_language_never_invokes_sandbox() {
        let sandbox = SpySandbox::new(vec![]);
        let cases = vec![case(1, "3 4", "7")];
        let status = grade(&sandbox, &languages(), "cobol", "code", &cases)
            .await
            .unwrap();
        assert_eq!(status, SubmissionStatus::UnsupportedLanguage);
        assert_eq!(sandbox.calls(), 0);
    }

    #[tokio::test]
    async fn test_language_tag_matches_case_insensitively() {
        let sandbox = SpySandbox::new(vec![completed("7")]);
        let cases = vec![case(1, "3 4", "7")];
        let status = grade(&sandbox, &languages(), "Python", "code", &cases)
            .await
            .unwrap();
        assert_eq!(status, SubmissionStatus::Passed);
        assert_eq!(sandbox.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_cases_pass() {
        let sandbox = SpySandbox::new(vec![completed("7"), completed("2")]);
        let cases = vec![case(1, "3 4", "7"), case(2, "1 1", "2")];
        let status = grade(&sandbox, &languages(), "python", "code", &cases)
            .await
            .unwrap();
        assert_eq!(status, SubmissionStatus::Passed);
        assert_eq!(sandbox.calls(), 2);
    }

    #[tokio::test]
    async fn test_first_mismatch_short_circuits() {
        // Three cases, but the first already mismatches: cases 2 and 3 must
        // never reach the sandbox.
        let sandbox = SpySandbox::new(vec![completed("0")]);
        let cases = vec![
            case(1, "3 4", "7"),
            case(2, "1 1", "2"),
            case(3, "5 5", "10"),
        ];
        let status = grade(&sandbox, &languages(), "python", "code", &cases)
            .await
            .unwrap();
        assert_eq!(status, SubmissionStatus::Failed);
        assert_eq!(sandbox.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_folds_into_failed() {
        let sandbox = SpySandbox::new(vec![completed("7"), ExecOutcome::Timeout]);
        let cases = vec![case(1, "3 4", "7"), case(2, "1 1", "2"), case(3, "0 0", "0")];
        let status = grade(&sandbox, &languages(), "python", "code", &cases)
            .await
            .unwrap();
        assert_eq!(status, SubmissionStatus::Failed);
        assert_eq!(sandbox.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_zero_exit_folds_into_failed() {
        let sandbox = SpySandbox::new(vec![ExecOutcome::NonZeroExit { code: Some(1) }]);
        let cases = vec![case(1, "3 4", "7")];
        let status = grade(&sandbox, &languages(), "python", "code", &cases)
            .await
            .unwrap();
        assert_eq!(status, SubmissionStatus::Failed);
    }

    #[tokio::test]
    async fn test_outputs_compared_after_trimming() {
        let sandbox = SpySandbox::new(vec![completed("5\n")]);
        let cases = vec![case(1, "2 3", "5")];
        let status = grade(&sandbox, &languages(), "python", "code", &cases)
            .await
            .unwrap();
        assert_eq!(status, SubmissionStatus::Passed);
    }

    #[tokio::test]
    async fn test_empty_outputs_match_after_trimming() {
        let sandbox = SpySandbox::new(vec![completed("\n")]);
        let cases = vec![case(1, "", "  ")];
        let status = grade(&sandbox, &languages(), "python", "code", &cases)
            .await
            .unwrap();
        assert_eq!(status, SubmissionStatus::Passed);
    }

    #[test]
    fn test_status_round_trip_and_terminality() {
        for status in [
            SubmissionStatus::Pending,
            SubmissionStatus::Passed,
            SubmissionStatus::Failed,
            SubmissionStatus::UnsupportedLanguage,
        ] {
            assert_eq!(SubmissionStatus::parse(status.as_str()), Some(status));
        }
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(SubmissionStatus::Passed.is_terminal());
        assert!(SubmissionStatus::Failed.is_terminal());
        assert!(SubmissionStatus::UnsupportedLanguage.is_terminal());
        assert_eq!(SubmissionStatus::parse("queued"), None);
    }
}
