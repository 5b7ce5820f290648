use crate::CoordinatorError;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Matches `<name>_<digits>.<extension>` exactly.
static ARTIFACT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>\w+)_(?P<id>\d+)\.(?P<extension>\w+)$").expect("artifact name regex is valid")
});

/// The suffix that marks the final artifact of a ceremony.
const FINAL_SUFFIX: &str = "_final";

///
/// One immutable snapshot of the shared setup artifact.
///
/// The file name of a version is derived from its base name, its sequence ID
/// zero-padded to the ceremony width, and the artifact extension.
///
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    base_name: String,
    sequence_id: u64,
    width: usize,
    extension: String,
}

impl ArtifactVersion {
    /// Creates a new instance of `ArtifactVersion`.
    #[inline]
    pub fn new(base_name: &str, sequence_id: u64, width: usize, extension: &str) -> Self {
        Self {
            base_name: base_name.to_string(),
            sequence_id,
            width,
            extension: extension.to_string(),
        }
    }

    ///
    /// Parses a file name of the form `<name>_<digits>.<extension>`.
    ///
    /// The digits must be the sequence ID zero-padded to exactly `width`,
    /// so that every version has a single canonical file name.
    ///
    pub fn parse(file_name: &str, width: usize, extension: &str) -> Result<Self, CoordinatorError> {
        let invalid = || CoordinatorError::ArtifactNameInvalid(file_name.to_string());

        let captures = ARTIFACT_NAME.captures(file_name).ok_or_else(invalid)?;
        if &captures["extension"] != extension {
            return Err(invalid());
        }

        let digits = &captures["id"];
        let sequence_id = u64::from_str(digits).map_err(|_| invalid())?;
        if format!("{:0width$}", sequence_id, width = width) != digits {
            return Err(invalid());
        }

        Ok(Self::new(&captures["name"], sequence_id, width, extension))
    }

    /// Returns `true` if the given file name marks the finalized artifact of the ceremony.
    #[inline]
    pub fn is_final_file_name(file_name: &str, extension: &str) -> bool {
        match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(e) if e == extension => Path::new(file_name)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map_or(false, |stem| stem.ends_with(FINAL_SUFFIX)),
            _ => false,
        }
    }

    #[inline]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    #[inline]
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// Returns the file name `<name>_<padded id>.<extension>`.
    #[inline]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{:0width$}.{}",
            self.base_name,
            self.sequence_id,
            self.extension,
            width = self.width
        )
    }

    /// Returns the storage path of this version inside the given directory.
    #[inline]
    pub fn storage_path(&self, directory: &Path) -> PathBuf {
        directory.join(self.file_name())
    }

    /// Returns the version that extends this one, or `None` if the sequence ID is exhausted.
    #[inline]
    pub fn next(&self) -> Option<Self> {
        Some(Self {
            sequence_id: self.sequence_id.checked_add(1)?,
            ..self.clone()
        })
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// The auxiliary artifacts a verifier may need to locate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Ptau,
    R1cs,
    Zkey,
}

impl ArtifactKind {
    #[inline]
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Ptau => "ptau",
            ArtifactKind::R1cs => "r1cs",
            ArtifactKind::Zkey => "zkey",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ptau" => Ok(ArtifactKind::Ptau),
            "r1cs" => Ok(ArtifactKind::R1cs),
            "zkey" => Ok(ArtifactKind::Zkey),
            _ => Err(CoordinatorError::ArtifactKindUnknown(s.to_string())),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}
