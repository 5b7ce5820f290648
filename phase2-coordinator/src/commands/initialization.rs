use crate::{environment::Environment, objects::ArtifactVersion, storage::VersionChain, CoordinatorError};

use std::io;
use tracing::{debug, info};

pub(crate) struct Initialization;

impl Initialization {
    ///
    /// Seeds the artifact chain with the given initial artifact.
    ///
    /// The seed is written as `<name>_<seed id>.<extension>`. Fails if any
    /// version of the chain already exists, so a running ceremony can never
    /// be reseeded.
    ///
    pub(crate) fn run(
        environment: &Environment,
        chain: &VersionChain,
        initial: &[u8],
    ) -> Result<ArtifactVersion, CoordinatorError> {
        info!("Seeding the artifact chain for {}", environment.ceremony_name());

        fs_err::create_dir_all(chain.directory())?;

        match chain.latest() {
            Ok(latest) => {
                debug!("Found {} while seeding", latest);
                return Err(CoordinatorError::ArtifactChainExists(latest.file_name()));
            }
            Err(CoordinatorError::ArtifactChainMissing(_)) => (),
            Err(error) => return Err(error),
        }

        let seed = chain.version(environment.seed_sequence_id());
        match chain.create(&seed, initial) {
            Ok(()) => (),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                return Err(CoordinatorError::ArtifactChainExists(seed.file_name()));
            }
            Err(error) => return Err(error.into()),
        }

        info!("Seeded the artifact chain with {}", seed);
        Ok(seed)
    }
}
