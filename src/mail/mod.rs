//! Mail retrieval: unseen messages from the configured sender become posts.

pub mod imap_source;
pub mod message;

use async_trait::async_trait;

use crate::error::MailError;
use crate::posts::Post;

pub use imap_source::ImapMailSource;
pub use message::extract_post;

/// Something that yields the posts waiting in a mailbox.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Fetch every pending post. Fetched messages count as consumed.
    async fn fetch_posts(&self) -> Result<Vec<Post>, MailError>;
}
