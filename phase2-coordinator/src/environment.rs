use crate::CoordinatorError;

use serde::{Deserialize, Serialize};
use std::{
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::Level;

/// The name of the audit log inside the contributions directory.
const AUDIT_LOG_FILE: &str = "log.csv";

/// The parameters of a ceremony, shared by every environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// The base name of every artifact in the chain.
    pub ceremony_name: String,
    /// The file extension of every artifact in the chain.
    pub artifact_extension: String,
    /// The number of digits a sequence ID is zero-padded to.
    pub sequence_width: usize,
    /// The sequence ID of the seeded artifact.
    pub seed_sequence_id: u64,
    /// The maximum number of connections waiting in the queue.
    pub maximum_queue_size: usize,
    /// The maximum time a connection may hold the active slot.
    pub contribution_timeout_in_millis: u64,
    /// The period of the scheduler loop.
    pub scheduler_interval_in_millis: u64,
    /// The root directory of all ceremony state.
    pub local_base_directory: String,
    /// The maximum log level.
    pub verbosity: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ceremony_name: "circuit".to_string(),
            artifact_extension: "zkey".to_string(),
            sequence_width: 4,
            seed_sequence_id: 1,
            maximum_queue_size: 25,
            contribution_timeout_in_millis: 10 * 60 * 1000,
            scheduler_interval_in_millis: 1000,
            local_base_directory: "./transcript/development".to_string(),
            verbosity: "info".to_string(),
        }
    }
}

impl Settings {
    ///
    /// Loads the settings from a JSON file at the given path.
    ///
    /// Missing fields fall back to their defaults.
    ///
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CoordinatorError> {
        let reader = BufReader::new(fs_err::File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Test(Settings),
    Development(Settings),
    Production(Settings),
}

impl Environment {
    /// Returns the environment used by the test suite.
    pub fn test() -> Self {
        Environment::Test(Settings {
            ceremony_name: "test".to_string(),
            contribution_timeout_in_millis: 200,
            scheduler_interval_in_millis: 50,
            local_base_directory: "./transcript/test".to_string(),
            verbosity: "trace".to_string(),
            ..Settings::default()
        })
    }

    pub fn development() -> Self {
        Environment::Development(Settings::default())
    }

    pub fn production() -> Self {
        Environment::Production(Settings {
            local_base_directory: "./transcript/production".to_string(),
            ..Settings::default()
        })
    }

    ///
    /// Returns the environment for the given mode name.
    ///
    /// If settings are provided, they replace the defaults of the mode.
    ///
    pub fn from_mode(mode: &str, settings: Option<Settings>) -> Result<Self, CoordinatorError> {
        let environment = match mode {
            "test" => Self::test(),
            "development" => Self::development(),
            "production" => Self::production(),
            _ => return Err(CoordinatorError::EnvironmentUnknown(mode.to_string())),
        };
        Ok(match settings {
            Some(settings) => environment.with_settings(settings),
            None => environment,
        })
    }

    /// Returns this environment mode with the given settings.
    pub fn with_settings(self, settings: Settings) -> Self {
        match self {
            Environment::Test(_) => Environment::Test(settings),
            Environment::Development(_) => Environment::Development(settings),
            Environment::Production(_) => Environment::Production(settings),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Environment::Test(_) => "test",
            Environment::Development(_) => "development",
            Environment::Production(_) => "production",
        }
    }

    pub fn settings(&self) -> &Settings {
        match self {
            Environment::Test(settings) => settings,
            Environment::Development(settings) => settings,
            Environment::Production(settings) => settings,
        }
    }

    pub fn ceremony_name(&self) -> &str {
        &self.settings().ceremony_name
    }

    pub fn artifact_extension(&self) -> &str {
        &self.settings().artifact_extension
    }

    pub fn sequence_width(&self) -> usize {
        self.settings().sequence_width
    }

    pub fn seed_sequence_id(&self) -> u64 {
        self.settings().seed_sequence_id
    }

    pub fn maximum_queue_size(&self) -> usize {
        self.settings().maximum_queue_size
    }

    pub fn contribution_timeout(&self) -> Duration {
        Duration::from_millis(self.settings().contribution_timeout_in_millis)
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_millis(self.settings().scheduler_interval_in_millis)
    }

    pub fn local_base_directory(&self) -> &str {
        &self.settings().local_base_directory
    }

    /// Returns the maximum log level, defaulting to `INFO` if the setting is unreadable.
    pub fn verbosity(&self) -> Level {
        Level::from_str(&self.settings().verbosity).unwrap_or(Level::INFO)
    }

    /// Returns the directory holding the powers of tau file.
    pub fn ptau_directory(&self) -> PathBuf {
        Path::new(self.local_base_directory()).join("ptau")
    }

    /// Returns the directory holding the compiled circuit.
    pub fn compiled_directory(&self) -> PathBuf {
        Path::new(self.local_base_directory()).join("circuits").join("compiled")
    }

    /// Returns the directory holding the artifact chain.
    pub fn zkeys_directory(&self) -> PathBuf {
        self.compiled_directory().join("zkeys")
    }

    /// Returns the directory holding the audit log.
    pub fn contributions_directory(&self) -> PathBuf {
        self.compiled_directory().join("contributions")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.contributions_directory().join(AUDIT_LOG_FILE)
    }
}
