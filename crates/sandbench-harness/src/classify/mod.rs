//! Outcome classification for captured runs.
//!
//! [`classify`] is a pure function of the exit state and the observed
//! artifacts: it performs no I/O and always returns the same [`Verdict`] for
//! the same inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::record::RunRecord;

/// What a scenario expects its subject to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedOutcome {
    /// Exit zero and leave the expected artifact behind.
    #[serde(rename = "succeed")]
    MustSucceedWithArtifact,
    /// Exit nonzero or be killed by a signal.
    #[serde(rename = "abnormal")]
    MustTerminateAbnormally,
    /// Leave no artifact behind, whatever the exit status.
    #[serde(rename = "no_artifact")]
    MustNotProduceArtifact,
}

impl ExpectedOutcome {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MustSucceedWithArtifact => "must-succeed-and-produce-artifact",
            Self::MustTerminateAbnormally => "must-terminate-abnormally",
            Self::MustNotProduceArtifact => "must-not-produce-artifact",
        }
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a run against its expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The run succeeded as a legitimate run should.
    Success,
    /// The run was stopped as an exploit run should be.
    Blocked,
    /// The run did not match its expectation.
    Unexpected,
}

impl Verdict {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Blocked => "blocked",
            Self::Unexpected => "unexpected",
        }
    }

    /// Returns true for [`Verdict::Unexpected`].
    #[must_use]
    pub const fn is_unexpected(self) -> bool {
        matches!(self, Self::Unexpected)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a run record against an expected outcome.
///
/// ```
/// use std::time::Duration;
/// use sandbench_harness::{ArtifactObservation, ExitState, ExpectedOutcome, RunRecord, Verdict, classify};
///
/// let record = RunRecord::new(
///     "copy", "landlock", "cp in out",
///     ExitState::exited(0),
///     Duration::from_millis(3),
///     vec![ArtifactObservation::new("out", false)],
/// );
/// assert_eq!(classify(&record, ExpectedOutcome::MustNotProduceArtifact), Verdict::Blocked);
/// ```
#[must_use]
pub fn classify(record: &RunRecord, expected: ExpectedOutcome) -> Verdict {
    match expected {
        ExpectedOutcome::MustSucceedWithArtifact => {
            if record.exit().is_success() && record.all_artifacts_present() {
                Verdict::Success
            } else {
                Verdict::Unexpected
            }
        }
        ExpectedOutcome::MustTerminateAbnormally => blocked_if(record.exit().is_abnormal()),
        ExpectedOutcome::MustNotProduceArtifact => blocked_if(!record.any_artifact_present()),
    }
}

const fn blocked_if(holds: bool) -> Verdict {
    if holds {
        Verdict::Blocked
    } else {
        Verdict::Unexpected
    }
}

/// Classifies the outcome of a runner call.
///
/// Runner failures (launch errors, timeouts) are always
/// [`Verdict::Unexpected`].
#[must_use]
pub fn classify_outcome(outcome: &Result<RunRecord, RunError>, expected: ExpectedOutcome) -> Verdict {
    match outcome {
        Ok(record) => classify(record, expected),
        Err(_) => Verdict::Unexpected,
    }
}

#[cfg(test)]
mod tests;
