//! One publishing run.
//!
//! Stages run strictly in order and the first failure ends the run:
//! 1. `MailSource::fetch_posts()`: unseen mail from the configured sender
//! 2. `PostWriter::write_all()`: one Markdown file per post
//! 3. `SiteGenerator::generate()`: external static-site build
//! 4. `collect_upload_set()` + `SiteUploader::upload()`: mirror the output
//!
//! Nothing is rolled back: messages fetched before a failure stay seen and
//! posts already written stay on disk.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::mail::{ImapMailSource, MailSource};
use crate::posts::PostWriter;
use crate::site::{CommandGenerator, SftpUploader, SiteGenerator, SiteUploader, collect_upload_set};

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub posts_written: Vec<PathBuf>,
    pub files_uploaded: usize,
}

/// The fetch → write → generate → upload sequence.
pub struct Pipeline {
    mail: Arc<dyn MailSource>,
    writer: PostWriter,
    generator: Arc<dyn SiteGenerator>,
    uploader: Arc<dyn SiteUploader>,
    output_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        mail: Arc<dyn MailSource>,
        writer: PostWriter,
        generator: Arc<dyn SiteGenerator>,
        uploader: Arc<dyn SiteUploader>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mail,
            writer,
            generator,
            uploader,
            output_dir: output_dir.into(),
        }
    }

    /// Wire up the IMAP, filesystem, generator and SFTP stages.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(ImapMailSource::new(config.mail.clone())),
            PostWriter::new(&config.site.posts_dir),
            Arc::new(CommandGenerator::new(&config.site.generator)),
            Arc::new(SftpUploader::new(config.ssh.clone())),
            &config.site.output_dir,
        )
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let posts = self.mail.fetch_posts().await?;
        info!(count = posts.len(), "Fetched posts");

        let posts_written = self.writer.write_all(&posts).await?;
        info!(
            count = posts_written.len(),
            dir = %self.writer.dir().display(),
            "Wrote posts"
        );

        self.generator.generate().await?;

        let entries = collect_upload_set(&self.output_dir).await?;
        info!(
            count = entries.len(),
            root = %self.output_dir.display(),
            "Uploading site"
        );
        let files_uploaded = self.uploader.upload(entries).await?;

        Ok(RunSummary {
            posts_written,
            files_uploaded,
        })
    }
}
