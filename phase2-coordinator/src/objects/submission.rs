use serde::{Deserialize, Serialize};
use std::fmt;

/// A contribution handed to the coordinator by the transport layer.
#[derive(Debug, Clone, Copy)]
pub struct ContributionRequest<'a> {
    /// The file name of the artifact the contribution was computed from.
    pub expected_previous: &'a str,
    /// The raw contribution bytes. The coordinator never inspects them.
    pub contribution: &'a [u8],
    pub contributor_name: &'a str,
    pub contribution_hash: &'a str,
}

/// The outcome of a submitted contribution.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum Submission {
    /// The contribution was verified and written as a new artifact version.
    Accepted { file_name: String },
    /// The contribution was invalid or stale. The chain is unaffected.
    Rejected { reason: RejectionReason },
    /// The environment failed. An operator should inspect the coordinator.
    Failed { reason: FailureReason },
}

impl Submission {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted { .. })
    }

    /// Returns the new artifact file name, if the contribution was accepted.
    #[inline]
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Submission::Accepted { file_name } => Some(file_name),
            _ => None,
        }
    }
}

impl fmt::Display for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Submission::Accepted { file_name } => write!(f, "accepted as {}", file_name),
            Submission::Rejected { reason } => write!(f, "rejected, {}", reason),
            Submission::Failed { reason } => write!(f, "failed, {}", reason),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionReason {
    InvalidContribution,
    OrderingViolated,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::InvalidContribution => write!(f, "invalid contribution"),
            RejectionReason::OrderingViolated => write!(f, "ordering violated"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    StorageError,
    VerificationError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::StorageError => write!(f, "storage error"),
            FailureReason::VerificationError => write!(f, "verification error"),
        }
    }
}
