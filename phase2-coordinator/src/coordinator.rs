use crate::{
    commands::{Contribution, Initialization},
    environment::Environment,
    objects::{ArtifactKind, ArtifactVersion, ConnectionId, ConnectionQueue, ContributionRequest, Submission},
    storage::{ArtifactLocator, AuditLog, LocalArtifacts, VersionChain},
    verification::Verifier,
};

use itertools::Itertools;
use std::{
    collections::HashSet,
    fmt::Write,
    io,
    path::PathBuf,
    sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Multiple .{extension} files found in {directory}")]
    ArtifactAmbiguous { extension: String, directory: String },

    #[error("Artifact chain is broken, expected sequence ID {expected} but found {found}")]
    ArtifactChainBroken { expected: u64, found: u64 },

    #[error("Artifact chain already exists at {0}")]
    ArtifactChainExists(String),

    #[error("No artifacts found for {0}")]
    ArtifactChainMissing(String),

    #[error("Unknown artifact kind {0}")]
    ArtifactKindUnknown(String),

    #[error("No .{extension} file found in {directory}")]
    ArtifactMissing { extension: String, directory: String },

    #[error("Invalid artifact name {0}")]
    ArtifactNameInvalid(String),

    #[error("Invalid audit log entry \"{0}\"")]
    AuditEntryInvalid(String),

    #[error("Ceremony already finalized ({0})")]
    CeremonyFinalized(String),

    #[error("Unknown environment {0}")]
    EnvironmentUnknown(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock is poisoned")]
    LockPoisoned,

    #[error("{0} does not hold the active slot")]
    NotActive(String),

    #[error("{0} is not at the head of the queue")]
    NotQueueHead(String),

    #[error("Too many connections ({0}). Try again later.")]
    QueueFull(usize),
}

///
/// The coordinator of a sequential multi-party ceremony.
///
/// Contributions extend a chain of versioned artifacts on disk one at a time.
/// Connections wait in a bounded queue, and only the connection holding the
/// active slot may contribute through `contribute`.
///
/// # Thread Safety
/// The chain lock is held while the latest version is checked and the next
/// version is written, so at most one contribution can extend a given version.
/// Verification runs outside of the chain lock.
///
pub struct Coordinator {
    /// The parameters and directories of the ceremony.
    environment: Environment,
    /// The verification scheme for contributions.
    verifier: Box<dyn Verifier>,
    /// The locator of auxiliary artifacts.
    artifacts: LocalArtifacts,
    /// The artifact chain, locked for every check-then-write.
    chain: Mutex<VersionChain>,
    /// The log of accepted contributions.
    audit_log: AuditLog,
    /// The queue of waiting connections.
    queue: RwLock<ConnectionQueue>,
}

impl Coordinator {
    ///
    /// Creates a new instance of the `Coordinator`, for a given environment.
    ///
    /// The coordinator does not touch the disk until `initialize` is called.
    ///
    pub fn new(environment: Environment, verifier: Box<dyn Verifier>) -> Result<Self, CoordinatorError> {
        if !verifier.is_secure() {
            warn!("{} is not safe for use in production", verifier.name());
        }

        Ok(Self {
            artifacts: LocalArtifacts::new(&environment),
            chain: Mutex::new(VersionChain::new(&environment)),
            audit_log: AuditLog::new(environment.audit_log_path()),
            queue: RwLock::new(ConnectionQueue::new(environment.maximum_queue_size())),
            verifier,
            environment,
        })
    }

    ///
    /// Prepares the ceremony directories and the audit log.
    ///
    /// Safe to call on every startup. Returns the latest version of the chain,
    /// or `None` if the chain has not been seeded yet.
    ///
    pub fn initialize(&self) -> Result<Option<ArtifactVersion>, CoordinatorError> {
        info!("Initializing the coordinator in {}", self.environment.local_base_directory());

        fs_err::create_dir_all(self.environment.ptau_directory())?;
        fs_err::create_dir_all(self.environment.zkeys_directory())?;
        self.audit_log.ensure_initialized()?;

        match self.latest() {
            Ok(latest) => {
                info!("The latest artifact is {}", latest);
                Ok(Some(latest))
            }
            Err(CoordinatorError::ArtifactChainMissing(name)) => {
                warn!("The artifact chain for {} has not been seeded", name);
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    ///
    /// Writes the initial artifact of the chain.
    ///
    /// Fails if the chain already has a version.
    ///
    pub fn seed(&self, initial: &[u8]) -> Result<ArtifactVersion, CoordinatorError> {
        let chain = self.chain()?;
        Initialization::run(&self.environment, &chain, initial)
    }

    #[inline]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns the version with the highest sequence ID.
    pub fn latest(&self) -> Result<ArtifactVersion, CoordinatorError> {
        self.chain()?.latest()
    }

    /// Returns the file name of the latest version, for contributors to build on.
    pub fn latest_file_name(&self) -> Result<String, CoordinatorError> {
        Ok(self.latest()?.file_name())
    }

    pub fn list_versions(&self) -> Result<Vec<ArtifactVersion>, CoordinatorError> {
        self.chain()?.list_versions()
    }

    /// Returns the path of the single artifact of the given kind.
    pub fn locate(&self, kind: ArtifactKind) -> Result<PathBuf, CoordinatorError> {
        self.artifacts.locate(kind)
    }

    ///
    /// Admits the connection to the tail of the queue, and returns its 1-based position.
    ///
    /// If no connection holds the active slot, the head is promoted.
    ///
    pub fn admit(&self, connection: ConnectionId) -> Result<usize, CoordinatorError> {
        let mut queue = self.queue_mut()?;
        let position = queue.admit(connection)?;
        if let Some(promoted) = queue.promote() {
            info!("{} now holds the active slot", promoted);
        }
        Ok(position)
    }

    /// Returns the 1-based position of the connection, if it is queued.
    pub fn position_of(&self, connection: &ConnectionId) -> Result<Option<usize>, CoordinatorError> {
        Ok(self.queue()?.position_of(connection))
    }

    pub fn head(&self) -> Result<Option<ConnectionId>, CoordinatorError> {
        Ok(self.queue()?.head().cloned())
    }

    pub fn active(&self) -> Result<Option<ConnectionId>, CoordinatorError> {
        Ok(self.queue()?.active().cloned())
    }

    /// Sets the active slot to the given connection, which must be the head of the queue.
    pub fn set_active(&self, connection: Option<ConnectionId>) -> Result<(), CoordinatorError> {
        self.queue_mut()?.set_active(connection)
    }

    pub fn is_active(&self, connection: &ConnectionId) -> Result<bool, CoordinatorError> {
        Ok(self.queue()?.active() == Some(connection))
    }

    ///
    /// Removes the connection from the queue, releasing the active slot if it held it,
    /// and promotes the next head.
    ///
    /// Returns `true` if the connection was queued.
    ///
    pub fn withdraw(&self, connection: &ConnectionId) -> Result<bool, CoordinatorError> {
        let mut queue = self.queue_mut()?;
        let removed = queue.withdraw(connection);
        if removed {
            info!("{} left the queue", connection);
        }
        if let Some(promoted) = queue.promote() {
            info!("{} now holds the active slot", promoted);
        }
        Ok(removed)
    }

    ///
    /// Runs one step of queue maintenance.
    ///
    /// The active connection is dropped if it held the slot past the contribution
    /// timeout, and the head of the queue is promoted if the slot is free.
    ///
    pub fn update(&self) -> Result<(), CoordinatorError> {
        let mut queue = self.queue_mut()?;

        let timeout = self.environment.contribution_timeout();
        if let Some(expired) = queue.release_expired(timeout, OffsetDateTime::now_utc()) {
            warn!("{} exceeded the contribution timeout of {:?} and was dropped", expired, timeout);
        }
        if let Some(promoted) = queue.promote() {
            info!("{} now holds the active slot", promoted);
        }

        trace!("{} connections in the queue", queue.len());
        Ok(())
    }

    ///
    /// Attempts to extend the chain with the given contribution.
    ///
    /// `expected_previous` is the file name of the version the contribution
    /// was built on, and must still be the latest version at the time of the write.
    /// The outcome is returned as a `Submission`; an error is returned only when
    /// the chain itself cannot be read.
    ///
    pub fn submit(
        &self,
        expected_previous: &str,
        contribution: &[u8],
        contributor_name: &str,
        contribution_hash: &str,
    ) -> Result<Submission, CoordinatorError> {
        Contribution::run(
            &self.chain,
            &self.audit_log,
            self.verifier.as_ref(),
            &self.artifacts,
            ContributionRequest {
                expected_previous,
                contribution,
                contributor_name,
                contribution_hash,
            },
        )
    }

    ///
    /// Submits a contribution on behalf of the connection holding the active slot.
    ///
    /// The connection leaves the queue once the submission has an outcome, whatever
    /// that outcome is, and the next head is promoted.
    ///
    pub fn contribute(
        &self,
        connection: &ConnectionId,
        expected_previous: &str,
        contribution: &[u8],
        contributor_name: &str,
        contribution_hash: &str,
    ) -> Result<Submission, CoordinatorError> {
        if !self.is_active(connection)? {
            return Err(CoordinatorError::NotActive(connection.to_string()));
        }

        let submission = self.submit(expected_previous, contribution, contributor_name, contribution_hash);

        let mut queue = self.queue_mut()?;
        if let Some(promoted) = queue.complete(connection) {
            info!("{} now holds the active slot", promoted);
        }
        drop(queue);

        match &submission {
            Ok(outcome) => info!("The contribution of {} was {}", connection, outcome),
            Err(error) => error!("The contribution of {} errored: {}", connection, error),
        }
        submission
    }

    ///
    /// Returns the file names of versions with no matching audit log entry.
    ///
    /// The seed version is never audited and is skipped.
    ///
    pub fn unaudited_versions(&self) -> Result<Vec<String>, CoordinatorError> {
        let audited: HashSet<String> = self
            .audit_log
            .entries()?
            .into_iter()
            .map(|entry| entry.file_name().to_string())
            .collect();

        let seed_sequence_id = self.environment.seed_sequence_id();
        let unaudited = self
            .list_versions()?
            .into_iter()
            .filter(|version| version.sequence_id() != seed_sequence_id)
            .map(|version| version.file_name())
            .filter(|file_name| !audited.contains(file_name))
            .collect::<Vec<_>>();

        debug!("Found {} unaudited versions", unaudited.len());
        Ok(unaudited)
    }

    ///
    /// Returns a human-readable summary of the ceremony state.
    ///
    pub fn status_report(&self) -> Result<String, CoordinatorError> {
        let mut report = String::new();
        let _ = writeln!(report, "Ceremony: {} ({})", self.environment.ceremony_name(), self.environment.mode());

        let finalized = self.chain()?.finalized()?;
        match (&finalized, self.list_versions()) {
            (Some(file_name), _) => {
                let _ = writeln!(report, "Finalized: {}", file_name);
            }
            (None, Ok(versions)) => match versions.last() {
                Some(latest) => {
                    let _ = writeln!(report, "Latest: {} ({} versions)", latest, versions.len());
                }
                None => {
                    let _ = writeln!(report, "Latest: none (not seeded)");
                }
            },
            (None, Err(error)) => {
                let _ = writeln!(report, "Latest: unavailable ({})", error);
            }
        }

        let queue = self.queue()?;
        let _ = writeln!(report, "Queue: {}/{}", queue.len(), queue.capacity());
        match (queue.active(), queue.active_since()) {
            (Some(active), Some(since)) => {
                let _ = writeln!(report, "Active: {} since {}", active, since);
            }
            _ => {
                let _ = writeln!(report, "Active: none");
            }
        }
        if !queue.is_empty() {
            let _ = writeln!(report, "Waiting: {}", queue.waiting().join(", "));
        }

        Ok(report)
    }

    /// Attempts to acquire the chain lock.
    #[inline]
    fn chain(&self) -> Result<MutexGuard<VersionChain>, CoordinatorError> {
        match self.chain.lock() {
            Ok(chain) => Ok(chain),
            _ => Err(CoordinatorError::LockPoisoned),
        }
    }

    /// Attempts to acquire the read lock for the queue.
    #[inline]
    fn queue(&self) -> Result<RwLockReadGuard<ConnectionQueue>, CoordinatorError> {
        match self.queue.read() {
            Ok(queue) => Ok(queue),
            _ => Err(CoordinatorError::LockPoisoned),
        }
    }

    /// Attempts to acquire the write lock for the queue.
    #[inline]
    fn queue_mut(&self) -> Result<RwLockWriteGuard<ConnectionQueue>, CoordinatorError> {
        match self.queue.write() {
            Ok(queue) => Ok(queue),
            _ => Err(CoordinatorError::LockPoisoned),
        }
    }
}
