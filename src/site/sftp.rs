//! SFTP upload over an SSH session authenticated with a private key.
//!
//! The server's host key must already be in the configured known-hosts
//! file; unknown or mismatched hosts are refused.

use std::fs::File;
use std::net::TcpStream;
use std::path::Path;

use async_trait::async_trait;
use ssh2::{CheckResult, KnownHostFileKind, Session};
use tracing::{debug, info};

use super::SiteUploader;
use super::upload::UploadEntry;
use crate::config::SshConfig;
use crate::error::PublishError;

/// Uploads files to the remote host over SFTP.
#[derive(Debug, Clone)]
pub struct SftpUploader {
    config: SshConfig,
}

impl SftpUploader {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SiteUploader for SftpUploader {
    async fn upload(&self, entries: Vec<UploadEntry>) -> Result<usize, PublishError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || upload_files(&cfg, &entries))
            .await
            .map_err(|e| PublishError::Task(e.to_string()))?
    }
}

/// Authenticated SSH session, disconnected when dropped.
struct SshConnection {
    session: Session,
}

impl SshConnection {
    fn open(config: &SshConfig) -> Result<Self, PublishError> {
        let tcp = TcpStream::connect((&*config.hostname, config.port)).map_err(|source| {
            PublishError::Connect {
                host: config.hostname.clone(),
                port: config.port,
                source,
            }
        })?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        let conn = Self { session };

        conn.verify_host_key(config)?;
        conn.session
            .userauth_pubkey_file(&config.username, None, &config.private_key, None)?;
        info!(host = %config.hostname, user = %config.username, "SSH session established");
        Ok(conn)
    }

    fn verify_host_key(&self, config: &SshConfig) -> Result<(), PublishError> {
        let untrusted = |reason: String| PublishError::UnknownHost {
            host: config.hostname.clone(),
            reason,
        };

        let mut known_hosts = self.session.known_hosts()?;
        known_hosts
            .read_file(&config.known_hosts, KnownHostFileKind::OpenSSH)
            .map_err(|e| {
                untrusted(format!(
                    "cannot read {}: {e}",
                    config.known_hosts.display()
                ))
            })?;

        let (key, _) = self
            .session
            .host_key()
            .ok_or_else(|| untrusted("server sent no host key".to_string()))?;

        match known_hosts.check_port(&config.hostname, config.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound => Err(untrusted(format!(
                "not listed in {}",
                config.known_hosts.display()
            ))),
            CheckResult::Mismatch => Err(untrusted("host key does not match".to_string())),
            CheckResult::Failure => Err(untrusted("host key check failed".to_string())),
        }
    }
}

impl Drop for SshConnection {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "upload finished", None) {
            debug!("SSH disconnect did not complete: {e}");
        }
    }
}

/// Upload every entry in order (blocking, run in spawn_blocking).
///
/// Remote directories must already exist. The first failure aborts the
/// remaining transfers.
pub fn upload_files(config: &SshConfig, entries: &[UploadEntry]) -> Result<usize, PublishError> {
    let conn = SshConnection::open(config)?;
    let sftp = conn.session.sftp()?;

    for entry in entries {
        let io_err = |source| PublishError::Io {
            path: entry.local.clone(),
            source,
        };
        let mut local = File::open(&entry.local).map_err(io_err)?;
        let mut remote = sftp.create(Path::new(&entry.remote))?;
        let bytes = std::io::copy(&mut local, &mut remote).map_err(io_err)?;
        info!(local = %entry.local.display(), remote = %entry.remote, bytes, "Uploaded file");
    }

    Ok(entries.len())
}
