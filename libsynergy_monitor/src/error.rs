use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum LogFileError {
    #[error("Could not open log file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Log file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Log file {0:?} has no header line naming its columns")]
    MissingHeader(PathBuf),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog scan failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Catalog could not resolve a timestamp for {0:?}")]
    UnresolvedTimestamp(PathBuf),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Email not configured")]
    NotConfigured,
    #[error("No recipient address has been set")]
    NoRecipient,
    #[error("Invalid email address {0}: {1}")]
    BadAddress(String, lettre::address::AddressError),
    #[error("Failed to build email: {0}")]
    BadMessage(#[from] lettre::error::Error),
    #[error("Connection failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("Connection failed: server {0} did not accept the connection")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config requested {0} worker threads; at least 1 is required")]
    BadThreadCount(usize),
    #[error("Config requested a poll interval of 0 seconds")]
    BadPollInterval,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed because a read worker panicked")]
    WorkerPanic,
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Monitor failed due to Processor error: {0}")]
    ProcessorError(#[from] ProcessorError),
}
