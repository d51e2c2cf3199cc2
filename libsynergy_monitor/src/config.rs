use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use time::{Date, PrimitiveDateTime};

use super::clock::local_now;
use super::constants::{CHANNELS, DEFAULT_LOG_DIRECTORY};
use super::error::ConfigError;
use super::notifier::EmailConfig;
use super::trigger::TriggerCondition;

/// Structure representing the application configuration. Contains the log directory, the date
/// range of interest, and the alerting setup.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_path: PathBuf,
    #[serde(default)]
    pub start_date: Option<Date>,
    #[serde(default)]
    pub end_date: Option<Date>,
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub triggers: Vec<TriggerCondition>,
}

fn default_n_threads() -> usize {
    1
}

fn default_poll_interval() -> u64 {
    2
}

impl Default for Config {
    /// Generate a new Config object. Points at the instrument's log directory if this machine
    /// has one, the current directory otherwise.
    fn default() -> Self {
        let instrument_dir = PathBuf::from(DEFAULT_LOG_DIRECTORY);
        let log_path = if instrument_dir.exists() {
            instrument_dir
        } else {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        };
        Self {
            log_path,
            start_date: None,
            end_date: None,
            n_threads: default_n_threads(),
            poll_interval_secs: default_poll_interval(),
            email: None,
            triggers: vec![],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a YAML file, replacing anything already there
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        let mut file = File::create(config_path)?;
        file.write_all(yaml_str.as_bytes())?;
        Ok(())
    }

    /// Reject settings the processing cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadThreadCount(self.n_threads));
        }
        if !self.is_poll_interval_valid() {
            return Err(ConfigError::BadPollInterval);
        }
        self.validate_triggers();
        Ok(())
    }

    /// Warn about triggers on channels the instrument does not write. They are kept, since a
    /// newer instrument software version may add channels.
    pub fn validate_triggers(&self) {
        for trigger in self.unknown_trigger_parameters() {
            log::warn!(
                "Trigger parameter {} is not a known instrument channel; it will only fire if the logs contain it",
                trigger.parameter()
            );
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn is_poll_interval_valid(&self) -> bool {
        self.poll_interval_secs >= 1
    }

    /// Triggers watching a channel the instrument does not write
    pub fn unknown_trigger_parameters(&self) -> impl Iterator<Item = &TriggerCondition> {
        self.triggers
            .iter()
            .filter(|t| !CHANNELS.contains(&t.parameter()))
    }

    pub fn has_email(&self) -> bool {
        self.email.is_some()
    }

    /// Start of a monitoring session: midnight of the start date if one is set, otherwise now
    pub fn session_start(&self) -> PrimitiveDateTime {
        match self.start_date {
            Some(date) => date.midnight(),
            None => local_now(),
        }
    }
}
