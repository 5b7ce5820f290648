use crate::{objects::AuditEntry, CoordinatorError};

use fs_err::OpenOptions;
use std::{
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// The first line of every audit log.
pub const AUDIT_LOG_HEADER: &str = "type,name,contributionHash,fileName";

/// An append-only text log with one line per accepted contribution.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    #[inline]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    ///
    /// Creates the log file with its header line if it does not exist.
    ///
    /// An existing log is never overwritten. Returns `true` if a new log was created.
    ///
    pub fn ensure_initialized(&self) -> Result<bool, CoordinatorError> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                info!("Writing to an existing log file at {}", self.path.display());
                return Ok(false);
            }
            Err(error) => return Err(error.into()),
        };

        writeln!(file, "{}", AUDIT_LOG_HEADER)?;
        file.sync_all()?;

        info!("Created a new log file at {}", self.path.display());
        Ok(true)
    }

    ///
    /// Appends one line for the given entry.
    ///
    /// The log must already be initialized.
    ///
    pub fn append(&self, entry: &AuditEntry) -> Result<(), CoordinatorError> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        // The line is written with a single call so concurrent appends never interleave.
        file.write_all(format!("{}\n", entry).as_bytes())?;

        debug!("Appended \"{}\" to {}", entry, self.path.display());
        Ok(())
    }

    /// Returns every entry in the log, skipping the header line.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, CoordinatorError> {
        let reader = BufReader::new(fs_err::File::open(&self.path)?);

        let mut entries = vec![];
        for line in reader.lines().skip(1) {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(AuditEntry::parse(&line)?);
        }
        Ok(entries)
    }
}
