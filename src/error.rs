//! Error types for mailpress.

use std::path::PathBuf;
use std::process::ExitStatus;

/// Top-level error type for a publishing run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Post error: {0}")]
    Post(#[from] PostError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load env file {path}: {reason}")]
    EnvFile { path: PathBuf, reason: String },
}

/// Mail retrieval errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed for {host}: {reason}")]
    Tls { host: String, reason: String },

    #[error("Authentication failed for {username}: {reason}")]
    AuthFailed { username: String, reason: String },

    #[error("IMAP error: {0}")]
    Imap(#[from] imap::Error),

    #[error("Mail task failed: {0}")]
    Task(String),
}

/// Post writing errors.
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("Subject cannot be used as a file name: {subject:?}")]
    InvalidSubject { subject: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// External site generator errors.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Failed to start generator {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Generator {program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// Site upload errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("No remote path for {0}")]
    NoRemotePath(PathBuf),

    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Host key for {host} is not trusted: {reason}")]
    UnknownHost { host: String, reason: String },

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("Upload task failed: {0}")]
    Task(String),
}

/// Result type alias for mailpress.
pub type Result<T> = std::result::Result<T, Error>;
