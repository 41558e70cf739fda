//! Configuration types, built once from the process environment.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default IMAP-over-TLS port.
pub const DEFAULT_IMAP_PORT: u16 = 993;
/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Everything a publishing run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub mail: MailConfig,
    pub ssh: SshConfig,
    pub site: SiteConfig,
}

/// Mailbox access and sender filtering.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub mailbox: String,
    /// Substring the `From` header must contain.
    pub sender: String,
}

/// Remote host the generated site is uploaded to.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub private_key: PathBuf,
    pub known_hosts: PathBuf,
}

/// Local directories and the external generator.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub posts_dir: PathBuf,
    pub output_dir: PathBuf,
    pub generator: String,
}

impl Config {
    /// Build config from environment variables.
    ///
    /// Call [`load_env_file`] first if a `.env` file should seed the
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    ///
    /// Empty values count as unset, so a required variable exported as
    /// `""` fails here instead of at login time.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let mail = MailConfig {
            host: required("IMAP_SERVER")?,
            port: parse_port(get("IMAP_PORT"), "IMAP_PORT", DEFAULT_IMAP_PORT)?,
            username: required("ACCOUNT_USERNAME")?,
            password: SecretString::from(required("ACCOUNT_PASSWORD")?),
            mailbox: get("IMAP_MAILBOX").unwrap_or_else(|| "INBOX".to_string()),
            sender: required("SENDER")?,
        };

        let known_hosts = match get("SSH_KNOWN_HOSTS") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = get("HOME").unwrap_or_else(|| ".".to_string());
                Path::new(&home).join(".ssh").join("known_hosts")
            }
        };

        let ssh = SshConfig {
            hostname: required("SSH_HOSTNAME")?,
            port: parse_port(get("SSH_PORT"), "SSH_PORT", DEFAULT_SSH_PORT)?,
            username: required("USERNAME")?,
            private_key: PathBuf::from(required("SSH_ID_PATH")?),
            known_hosts,
        };

        let site = SiteConfig {
            posts_dir: PathBuf::from(get("POSTS_DIR").unwrap_or_else(|| "posts".to_string())),
            output_dir: PathBuf::from(
                get("SITE_OUTPUT_DIR").unwrap_or_else(|| "public_html".to_string()),
            ),
            generator: get("SITE_GENERATOR").unwrap_or_else(|| "generate_pages".to_string()),
        };

        Ok(Self { mail, ssh, site })
    }
}

fn parse_port(value: Option<String>, key: &str, default: u16) -> Result<u16, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?} is not a port number: {e}"),
        }),
    }
}

/// Seed the process environment from a dotenv file.
///
/// Variables already set in the environment win. A missing file is not an
/// error; returns whether a file was loaded.
pub fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConfigError::EnvFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
