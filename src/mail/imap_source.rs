//! IMAP over TLS: login, search unseen, fetch, close, logout.
//!
//! The `imap` crate speaks the protocol; the TLS stream underneath is
//! rustls with the webpki root store. All calls block, so the whole
//! exchange runs inside `spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use super::MailSource;
use super::message::extract_post;
use crate::config::MailConfig;
use crate::error::MailError;
use crate::posts::Post;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads posts from an IMAP mailbox.
#[derive(Debug, Clone)]
pub struct ImapMailSource {
    config: MailConfig,
}

impl ImapMailSource {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailSource for ImapMailSource {
    async fn fetch_posts(&self) -> Result<Vec<Post>, MailError> {
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unseen_posts(&cfg))
            .await
            .map_err(|e| MailError::Task(e.to_string()))?
    }
}

/// Logged-in session that always logs out, even when a step fails.
struct MailboxSession<T: Read + Write> {
    inner: imap::Session<T>,
    selected: bool,
    finished: bool,
}

impl<T: Read + Write> MailboxSession<T> {
    fn new(inner: imap::Session<T>) -> Self {
        Self {
            inner,
            selected: false,
            finished: false,
        }
    }

    fn select(&mut self, mailbox: &str) -> Result<(), MailError> {
        let selected = self.inner.select(mailbox)?;
        self.selected = true;
        debug!(mailbox, exists = selected.exists, "Selected mailbox");
        Ok(())
    }

    /// Close the mailbox and log out, reporting the first failure.
    ///
    /// `LOGOUT` is sent even when `CLOSE` fails.
    fn finish(mut self) -> Result<(), MailError> {
        let closed = if self.selected {
            self.inner.close()
        } else {
            Ok(())
        };
        let logged_out = self.inner.logout();
        self.finished = true;
        closed?;
        logged_out?;
        Ok(())
    }
}

impl<T: Read + Write> Deref for MailboxSession<T> {
    type Target = imap::Session<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Read + Write> DerefMut for MailboxSession<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T: Read + Write> Drop for MailboxSession<T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.inner.logout() {
            warn!("IMAP logout after failure did not complete: {e}");
        }
    }
}

/// Open a TLS connection to the IMAP server (blocking).
fn connect_tls(config: &MailConfig) -> Result<TlsStream, MailError> {
    let tcp = TcpStream::connect((&*config.host, config.port)).map_err(|source| {
        MailError::Connect {
            host: config.host.clone(),
            port: config.port,
            source,
        }
    })?;
    tcp.set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|source| MailError::Connect {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;

    let tls_error = |reason: String| MailError::Tls {
        host: config.host.clone(),
        reason,
    };

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.host.clone())
        .map_err(|e| tls_error(e.to_string()))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| tls_error(e.to_string()))?;

    Ok(rustls::StreamOwned::new(conn, tcp))
}

/// Fetch unseen messages and keep the ones from the configured sender
/// (blocking, run in spawn_blocking).
///
/// Fetching `RFC822` sets `\Seen` on every fetched message, including the
/// ones filtered out.
pub fn fetch_unseen_posts(config: &MailConfig) -> Result<Vec<Post>, MailError> {
    let tls = connect_tls(config)?;
    let mut client = imap::Client::new(tls);
    client.read_greeting()?;

    let session = client
        .login(&config.username, config.password.expose_secret())
        .map_err(|(e, _client)| MailError::AuthFailed {
            username: config.username.clone(),
            reason: e.to_string(),
        })?;
    let mut session = MailboxSession::new(session);
    info!(host = %config.host, user = %config.username, "Logged in to IMAP server");

    session.select(&config.mailbox)?;

    let mut unseen: Vec<u32> = session.search("UNSEEN")?.into_iter().collect();
    unseen.sort_unstable();
    info!(count = unseen.len(), mailbox = %config.mailbox, "Found unseen messages");

    let mut posts = Vec::new();
    for seq in unseen {
        let fetches = session.fetch(seq.to_string(), "RFC822")?;
        for fetch in fetches.iter() {
            let Some(raw) = fetch.body() else {
                warn!(seq, "Fetch returned no message body");
                continue;
            };
            if let Some(post) = extract_post(raw, &config.sender) {
                debug!(seq, subject = %post.subject, "Accepted message");
                posts.push(post);
            }
        }
    }

    session.finish()?;
    info!(posts = posts.len(), "Mail fetch complete");
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use super::*;

    /// Replays canned server responses and records what the client sends.
    struct ScriptedStream {
        responses: Cursor<Vec<u8>>,
        sent: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.responses.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.sent.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn scripted_session(
        responses: &str,
    ) -> (MailboxSession<ScriptedStream>, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = ScriptedStream {
            responses: Cursor::new(responses.as_bytes().to_vec()),
            sent: Arc::clone(&sent),
        };
        let session = imap::Client::new(stream)
            .login("blog", "secret")
            .map_err(|(e, _)| e)
            .unwrap();
        (MailboxSession::new(session), sent)
    }

    fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(sent.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn failed_close_still_logs_out() {
        let (mut session, sent) = scripted_session(
            "a1 OK Logged in\r\n\
             * 1 EXISTS\r\n\
             * 0 RECENT\r\n\
             a2 OK [READ-WRITE] Selected\r\n\
             a3 NO Close failed\r\n\
             a4 OK Logout completed\r\n",
        );

        session.select("INBOX").unwrap();
        let result = session.finish();

        assert!(matches!(result, Err(MailError::Imap(_))));
        let sent = sent_text(&sent);
        assert!(sent.contains("a3 CLOSE"), "{sent:?}");
        assert!(sent.contains("a4 LOGOUT"), "{sent:?}");
    }

    #[test]
    fn finish_without_select_only_logs_out() {
        let (session, sent) =
            scripted_session("a1 OK Logged in\r\na2 OK Logout completed\r\n");

        session.finish().unwrap();

        let sent = sent_text(&sent);
        assert!(!sent.contains("CLOSE"), "{sent:?}");
        assert!(sent.contains("a2 LOGOUT"), "{sent:?}");
    }

    #[test]
    fn dropped_session_logs_out() {
        let (session, sent) =
            scripted_session("a1 OK Logged in\r\na2 OK Logout completed\r\n");

        drop(session);

        assert!(sent_text(&sent).contains("a2 LOGOUT"));
    }
}
