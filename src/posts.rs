//! Posts extracted from email and their Markdown files on disk.
//!
//! A post's subject doubles as its file name stem, so it is sanitized
//! before touching the filesystem: reserved characters become `_` and
//! subjects that would name a directory are rejected.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs;
use tracing::{info, warn};

use crate::error::PostError;

/// Characters that cannot appear in a file name on common filesystems.
static RESERVED_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[/\\:*?"<>|\x00-\x1f\x7f]"#).expect("reserved character pattern is valid")
});

/// A blog post received by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Literal `Subject` header, used as the file name stem.
    pub subject: String,
    /// Message body, written verbatim.
    pub body: String,
}

impl Post {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// File name for this post, e.g. `Hello World.md`.
    pub fn file_name(&self) -> Result<String, PostError> {
        Ok(format!("{}.md", sanitize_subject(&self.subject)?))
    }
}

/// Turn a subject into something safe to use as a single path component.
pub fn sanitize_subject(subject: &str) -> Result<String, PostError> {
    let cleaned = RESERVED_CHARS.replace_all(subject, "_");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(PostError::InvalidSubject {
            subject: subject.to_string(),
        });
    }
    if cleaned != subject.trim() {
        warn!(subject, file_stem = cleaned, "Subject altered to make a safe file name");
    }
    Ok(cleaned.to_string())
}

/// Writes posts into the posts directory.
#[derive(Debug, Clone)]
pub struct PostWriter {
    dir: PathBuf,
}

impl PostWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the posts directory if it is missing.
    pub async fn ensure_dir(&self) -> Result<(), PostError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PostError::Io {
                path: self.dir.clone(),
                source,
            })
    }

    /// Write (overwrite) a single post, returning its path.
    pub async fn write(&self, post: &Post) -> Result<PathBuf, PostError> {
        let path = self.dir.join(post.file_name()?);
        self.ensure_dir().await?;
        fs::write(&path, post.body.as_bytes())
            .await
            .map_err(|source| PostError::Io {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "Wrote post");
        Ok(path)
    }

    /// Write posts in order. Stops at the first failure; earlier files stay.
    ///
    /// The posts directory exists afterwards even when `posts` is empty.
    /// Two subjects that sanitize to the same file name in one run are
    /// reported; the later post wins.
    pub async fn write_all(&self, posts: &[Post]) -> Result<Vec<PathBuf>, PostError> {
        self.ensure_dir().await?;

        let mut written = Vec::with_capacity(posts.len());
        let mut owners: HashMap<PathBuf, &str> = HashMap::new();
        for post in posts {
            let path = self.write(post).await?;
            if let Some(previous) = owners.insert(path.clone(), &post.subject)
                && previous != post.subject
            {
                warn!(
                    path = %path.display(),
                    previous = %previous,
                    subject = %post.subject,
                    "Different subjects map to the same post file, keeping the later one"
                );
            }
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_keeps_plain_subjects() {
        assert_eq!(sanitize_subject("Hello World").unwrap(), "Hello World");
        assert_eq!(sanitize_subject("Día de playa").unwrap(), "Día de playa");
    }

    #[test]
    fn sanitize_replaces_separators_and_reserved() {
        assert_eq!(sanitize_subject("a/b\\c").unwrap(), "a_b_c");
        assert_eq!(sanitize_subject("What? Why: <now>").unwrap(), "What_ Why_ _now_");
        assert_eq!(sanitize_subject("tab\there").unwrap(), "tab_here");
    }

    #[test]
    fn sanitize_rejects_directory_names() {
        assert!(sanitize_subject("").is_err());
        assert!(sanitize_subject("   ").is_err());
        assert!(sanitize_subject(".").is_err());
        assert!(sanitize_subject("..").is_err());
    }

    #[test]
    fn file_name_appends_markdown_extension() {
        let post = Post::new("Hello World", "body");
        assert_eq!(post.file_name().unwrap(), "Hello World.md");
    }

    #[tokio::test]
    async fn write_creates_file_with_exact_body() {
        let dir = TempDir::new().unwrap();
        let writer = PostWriter::new(dir.path().join("posts"));

        let path = writer
            .write(&Post::new("Hello World", "First line\nsecond line\n"))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("posts").join("Hello World.md"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "First line\nsecond line\n"
        );
    }

    #[tokio::test]
    async fn write_overwrites_same_subject() {
        let dir = TempDir::new().unwrap();
        let writer = PostWriter::new(dir.path());

        writer.write(&Post::new("Draft", "old body that is longer")).await.unwrap();
        let path = writer.write(&Post::new("Draft", "new")).await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "new");
    }

    #[tokio::test]
    async fn write_keeps_utf8_content() {
        let dir = TempDir::new().unwrap();
        let writer = PostWriter::new(dir.path());

        let path = writer.write(&Post::new("Café", "crème brûlée ☕")).await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), "crème brûlée ☕".as_bytes());
    }

    #[tokio::test]
    async fn write_all_stops_at_first_invalid_subject() {
        let dir = TempDir::new().unwrap();
        let writer = PostWriter::new(dir.path());
        let posts = vec![
            Post::new("one", "1"),
            Post::new("..", "bad"),
            Post::new("three", "3"),
        ];

        let err = writer.write_all(&posts).await.unwrap_err();

        assert!(matches!(err, PostError::InvalidSubject { .. }));
        assert!(dir.path().join("one.md").exists());
        assert!(!dir.path().join("three.md").exists());
    }

    #[tokio::test]
    async fn write_all_creates_dir_without_posts() {
        let dir = TempDir::new().unwrap();
        let posts_dir = dir.path().join("posts");
        let writer = PostWriter::new(&posts_dir);

        let written = writer.write_all(&[]).await.unwrap();

        assert!(written.is_empty());
        assert!(posts_dir.is_dir());
        assert_eq!(std::fs::read_dir(&posts_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn colliding_subjects_keep_later_post() {
        let dir = TempDir::new().unwrap();
        let writer = PostWriter::new(dir.path());
        let posts = vec![Post::new("a/b", "slash"), Post::new("a_b", "underscore")];

        let written = writer.write_all(&posts).await.unwrap();

        assert_eq!(written[0], written[1]);
        assert_eq!(written[0], dir.path().join("a_b.md"));
        assert_eq!(std::fs::read_to_string(&written[0]).unwrap(), "underscore");
    }
}
