use crate::{environment::Environment, objects::ArtifactVersion, CoordinatorError};

use fs_err::OpenOptions;
use itertools::Itertools;
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{error, trace};

///
/// The ordered chain of artifact versions stored in a single directory.
///
/// The chain is recomputed from the directory on every call and never cached,
/// so the latest version always reflects the files on disk.
///
#[derive(Debug, Clone)]
pub struct VersionChain {
    directory: PathBuf,
    base_name: String,
    extension: String,
    width: usize,
}

impl VersionChain {
    /// Creates a new instance of `VersionChain` for the artifact directory of the given environment.
    #[inline]
    pub fn new(environment: &Environment) -> Self {
        Self {
            directory: environment.zkeys_directory(),
            base_name: environment.ceremony_name().to_string(),
            extension: environment.artifact_extension().to_string(),
            width: environment.sequence_width(),
        }
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Returns the version with the given sequence ID in this chain.
    #[inline]
    pub fn version(&self, sequence_id: u64) -> ArtifactVersion {
        ArtifactVersion::new(&self.base_name, sequence_id, self.width, &self.extension)
    }

    /// Returns the storage path of the given version.
    #[inline]
    pub fn path(&self, version: &ArtifactVersion) -> PathBuf {
        version.storage_path(&self.directory)
    }

    ///
    /// Returns the file name of the finalized artifact, if the ceremony has been finalized.
    ///
    pub fn finalized(&self) -> Result<Option<String>, CoordinatorError> {
        Ok(self
            .file_names()?
            .into_iter()
            .find(|file_name| ArtifactVersion::is_final_file_name(file_name, &self.extension)))
    }

    ///
    /// Lists every artifact version in the chain, ordered by sequence ID.
    ///
    /// Every file with the artifact extension must be a version of this ceremony.
    /// A malformed or foreign file name fails the listing, as does a finalized
    /// ceremony or a gap in the sequence IDs.
    ///
    pub fn list_versions(&self) -> Result<Vec<ArtifactVersion>, CoordinatorError> {
        let file_names: Vec<String> = self
            .file_names()?
            .into_iter()
            .filter(|file_name| self.has_extension(file_name))
            .collect();

        if let Some(file_name) = file_names
            .iter()
            .find(|file_name| ArtifactVersion::is_final_file_name(file_name, &self.extension))
        {
            return Err(CoordinatorError::CeremonyFinalized(file_name.clone()));
        }

        let mut versions = Vec::with_capacity(file_names.len());
        for file_name in &file_names {
            let version = ArtifactVersion::parse(file_name, self.width, &self.extension)?;
            if version.base_name() != self.base_name {
                return Err(CoordinatorError::ArtifactNameInvalid(file_name.clone()));
            }
            versions.push(version);
        }
        versions.sort_by_key(|version| version.sequence_id());

        for (previous, current) in versions.iter().tuple_windows() {
            let expected = previous.sequence_id().checked_add(1);
            if expected != Some(current.sequence_id()) {
                return Err(CoordinatorError::ArtifactChainBroken {
                    expected: expected.unwrap_or(previous.sequence_id()),
                    found: current.sequence_id(),
                });
            }
        }

        trace!("Found {} versions in {}", versions.len(), self.directory.display());
        Ok(versions)
    }

    ///
    /// Returns the version with the highest sequence ID.
    ///
    pub fn latest(&self) -> Result<ArtifactVersion, CoordinatorError> {
        self.list_versions()?
            .pop()
            .ok_or_else(|| CoordinatorError::ArtifactChainMissing(self.base_name.clone()))
    }

    /// Returns the version that extends `current`.
    ///
    /// Fails if the sequence ID of `current` is the largest representable one.
    #[inline]
    pub fn next(current: &ArtifactVersion) -> Result<ArtifactVersion, CoordinatorError> {
        current
            .next()
            .ok_or_else(|| CoordinatorError::ArtifactNameInvalid(current.file_name()))
    }

    ///
    /// Creates the file for the given version and writes the bytes to it.
    ///
    /// The file must not exist yet; an existing file fails with `AlreadyExists`.
    /// If writing fails after the file was created, the partial file is removed.
    ///
    pub fn create(&self, version: &ArtifactVersion, bytes: &[u8]) -> io::Result<()> {
        let path = self.path(version);
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;

        let written = file.write_all(bytes).and_then(|_| file.sync_all());
        if let Err(write_error) = written {
            drop(file);
            if let Err(remove_error) = fs_err::remove_file(&path) {
                error!("Unable to remove the partial artifact {}: {}", path.display(), remove_error);
            }
            return Err(write_error);
        }

        trace!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    #[inline]
    fn has_extension(&self, file_name: &str) -> bool {
        Path::new(file_name).extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
    }

    ///
    /// Returns the names of the entries with the artifact extension in the chain directory.
    ///
    /// Every such entry must resolve to a regular file, following symlinks.
    /// Anything else shaped like an artifact fails the listing.
    ///
    fn file_names(&self) -> Result<Vec<String>, CoordinatorError> {
        let mut file_names = vec![];
        for entry in fs_err::read_dir(&self.directory)? {
            let entry = entry?;
            let file_name = entry
                .file_name()
                .into_string()
                .map_err(|file_name| CoordinatorError::ArtifactNameInvalid(file_name.to_string_lossy().into_owned()))?;

            if !self.has_extension(&file_name) {
                continue;
            }

            let is_file = match fs_err::metadata(entry.path()) {
                Ok(metadata) => metadata.is_file(),
                Err(error) if error.kind() == io::ErrorKind::NotFound => false,
                Err(error) => return Err(error.into()),
            };
            if !is_file {
                error!("{} is not a regular file", entry.path().display());
                return Err(CoordinatorError::ArtifactNameInvalid(file_name));
            }

            file_names.push(file_name);
        }
        Ok(file_names)
    }
}
