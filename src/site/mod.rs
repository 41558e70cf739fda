//! Site publishing: run the external generator, then mirror its output.

pub mod generator;
pub mod sftp;
pub mod upload;

use async_trait::async_trait;

use crate::error::{GeneratorError, PublishError};

pub use generator::CommandGenerator;
pub use sftp::SftpUploader;
pub use upload::{PAGES_DIR, UploadEntry, collect_upload_set, remote_path};

/// Builds the static site from the posts directory.
#[async_trait]
pub trait SiteGenerator: Send + Sync {
    async fn generate(&self) -> Result<(), GeneratorError>;
}

/// Transfers local files to the remote host.
#[async_trait]
pub trait SiteUploader: Send + Sync {
    /// Upload every entry in order; returns how many were transferred.
    async fn upload(&self, entries: Vec<UploadEntry>) -> Result<usize, PublishError>;
}
