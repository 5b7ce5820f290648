use crate::{environment::Environment, objects::ArtifactKind, storage::VersionChain, CoordinatorError};

use std::path::{Path, PathBuf};
use tracing::trace;

/// Locates the auxiliary artifacts a verifier needs.
pub trait ArtifactLocator: Send + Sync {
    ///
    /// Returns the path of the single artifact of the given kind.
    ///
    /// Finding none or more than one candidate is an error; the locator never guesses.
    ///
    fn locate(&self, kind: ArtifactKind) -> Result<PathBuf, CoordinatorError>;
}

/// Locates artifacts in the well-known directories of the local transcript.
#[derive(Debug, Clone)]
pub struct LocalArtifacts {
    ptau_directory: PathBuf,
    compiled_directory: PathBuf,
    chain: VersionChain,
}

impl LocalArtifacts {
    #[inline]
    pub fn new(environment: &Environment) -> Self {
        Self {
            ptau_directory: environment.ptau_directory(),
            compiled_directory: environment.compiled_directory(),
            chain: VersionChain::new(environment),
        }
    }

    /// Returns the only file with the given extension in the directory.
    fn single_file(directory: &Path, extension: &str) -> Result<PathBuf, CoordinatorError> {
        let mut candidates = vec![];
        for entry in fs_err::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
                candidates.push(path);
            }
        }

        match candidates.len() {
            0 => Err(CoordinatorError::ArtifactMissing {
                extension: extension.to_string(),
                directory: directory.display().to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(CoordinatorError::ArtifactAmbiguous {
                extension: extension.to_string(),
                directory: directory.display().to_string(),
            }),
        }
    }
}

impl ArtifactLocator for LocalArtifacts {
    fn locate(&self, kind: ArtifactKind) -> Result<PathBuf, CoordinatorError> {
        let path = match kind {
            ArtifactKind::Ptau => Self::single_file(&self.ptau_directory, kind.extension())?,
            ArtifactKind::R1cs => Self::single_file(&self.compiled_directory, kind.extension())?,
            // The chain listing fails if the ceremony was finalized.
            ArtifactKind::Zkey => self.chain.path(&self.chain.latest()?),
        };
        trace!("Located the {} artifact at {}", kind, path.display());
        Ok(path)
    }
}
