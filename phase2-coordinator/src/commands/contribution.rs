use crate::{
    objects::{AuditEntry, ContributionRequest, FailureReason, RejectionReason, Submission},
    storage::{ArtifactLocator, AuditLog, VersionChain},
    verification::Verifier,
    CoordinatorError,
};

use std::{io, sync::Mutex};
use tracing::{debug, error, info, warn};

pub(crate) struct Contribution;

impl Contribution {
    ///
    /// Runs the contribution gate for a given request.
    ///
    /// The contribution is verified first, without holding the chain lock.
    /// Then, under the chain lock, the latest version is recomputed and must
    /// match the version the contribution was built on, the next version is
    /// created exclusively, and an audit entry is appended.
    ///
    /// Invalid or stale contributions are returned as `Rejected`, and storage
    /// faults as `Failed`. Only a chain that cannot be listed or extended returns an error.
    ///
    pub(crate) fn run(
        chain: &Mutex<VersionChain>,
        audit_log: &AuditLog,
        verifier: &dyn Verifier,
        artifacts: &dyn ArtifactLocator,
        request: ContributionRequest,
    ) -> Result<Submission, CoordinatorError> {
        info!(
            "Starting verification of the contribution by {} on {}",
            request.contributor_name, request.expected_previous
        );

        // Verify the contribution before touching the chain.
        match verifier.verify(request.contribution, artifacts) {
            Ok(verification) if verification.is_valid() => (),
            Ok(_) => {
                warn!("Invalid contribution by {}", request.contributor_name);
                return Ok(Submission::Rejected {
                    reason: RejectionReason::InvalidContribution,
                });
            }
            Err(verification_error) => {
                error!(
                    "{} failed to verify the contribution by {}: {}",
                    verifier.name(),
                    request.contributor_name,
                    verification_error
                );
                return Ok(Submission::Failed {
                    reason: FailureReason::VerificationError,
                });
            }
        }

        // Acquire the chain lock for the check and the write.
        let chain = chain.lock().map_err(|_| CoordinatorError::LockPoisoned)?;

        let latest = chain.latest()?;
        if latest.file_name() != request.expected_previous {
            warn!(
                "Contribution by {} was built on {} but the latest artifact is {}",
                request.contributor_name, request.expected_previous, latest
            );
            return Ok(Submission::Rejected {
                reason: RejectionReason::OrderingViolated,
            });
        }

        let next = VersionChain::next(&latest)?;
        debug!("Writing the contribution by {} to {}", request.contributor_name, next);

        match chain.create(&next, request.contribution) {
            Ok(()) => (),
            Err(write_error) if write_error.kind() == io::ErrorKind::AlreadyExists => {
                warn!("{} already exists, the chain advanced concurrently", next);
                return Ok(Submission::Rejected {
                    reason: RejectionReason::OrderingViolated,
                });
            }
            Err(write_error) => {
                error!("Saving {} failed: {}", next, write_error);
                return Ok(Submission::Failed {
                    reason: FailureReason::StorageError,
                });
            }
        }

        let entry = AuditEntry::contribution(request.contributor_name, request.contribution_hash, &next.file_name());
        if entry.is_ambiguous() {
            warn!("The audit entry for {} contains a delimiter and is written unescaped", next);
        }
        if let Err(log_error) = audit_log.append(&entry) {
            // The artifact chain remains authoritative and can be rescanned.
            error!("Unable to log the contribution {}: {}", next, log_error);
        }

        info!("Accepted the contribution by {} as {}", request.contributor_name, next);
        Ok(Submission::Accepted {
            file_name: next.file_name(),
        })
    }
}
