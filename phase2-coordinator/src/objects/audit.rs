use crate::CoordinatorError;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The entry type of an accepted contribution.
pub const CONTRIBUTION_ENTRY_TYPE: &str = "Contribution";

///
/// One immutable line of the audit log.
///
/// Fields are comma-separated without escaping, so a contributor name
/// containing a comma is written as-is. When reading a line back, the
/// first field is the type and the last two fields are the contribution
/// hash and file name; everything in between is the contributor name.
///
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(rename = "type")]
    entry_type: String,
    contributor_name: String,
    contribution_hash: String,
    file_name: String,
}

impl AuditEntry {
    /// Creates a new audit entry for an accepted contribution.
    #[inline]
    pub fn contribution(contributor_name: &str, contribution_hash: &str, file_name: &str) -> Self {
        Self {
            entry_type: CONTRIBUTION_ENTRY_TYPE.to_string(),
            contributor_name: contributor_name.to_string(),
            contribution_hash: contribution_hash.to_string(),
            file_name: file_name.to_string(),
        }
    }

    /// Parses a data line of the audit log.
    pub fn parse(line: &str) -> Result<Self, CoordinatorError> {
        let fields: Vec<&str> = line.trim_end_matches(&['\r', '\n'][..]).split(',').collect();
        if fields.len() < 4 {
            return Err(CoordinatorError::AuditEntryInvalid(line.to_string()));
        }

        let last = fields.len() - 1;
        Ok(Self {
            entry_type: fields[0].to_string(),
            contributor_name: fields[1..last - 1].join(","),
            contribution_hash: fields[last - 1].to_string(),
            file_name: fields[last].to_string(),
        })
    }

    #[inline]
    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    #[inline]
    pub fn contributor_name(&self) -> &str {
        &self.contributor_name
    }

    #[inline]
    pub fn contribution_hash(&self) -> &str {
        &self.contribution_hash
    }

    #[inline]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns `true` if a field contains the delimiter or a line break.
    #[inline]
    pub fn is_ambiguous(&self) -> bool {
        [&self.contributor_name, &self.contribution_hash, &self.file_name]
            .iter()
            .any(|field| field.contains(',') || field.contains('\n') || field.contains('\r'))
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.entry_type, self.contributor_name, self.contribution_hash, self.file_name
        )
    }
}
