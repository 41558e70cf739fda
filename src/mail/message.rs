//! Turning a raw RFC 822 message into a [`Post`].

use mail_parser::{HeaderName, Message, MessageParser};
use tracing::debug;

use crate::posts::Post;

/// Extract a post from a raw message if its `From` header contains `sender`.
///
/// The sender check is a plain substring match on the raw header, so
/// `me@example.com` matches `"Me" <me@example.com>`. The subject is the raw
/// header value with folding removed; encoded words are not decoded. The
/// body is the first text part, or the first HTML part when there is no
/// text part, with its transfer encoding (quoted-printable, base64) undone.
/// HTML is kept as written, not converted to text.
pub fn extract_post(raw: &[u8], sender: &str) -> Option<Post> {
    let Some(parsed) = MessageParser::default().parse(raw) else {
        debug!(len = raw.len(), "Skipping unparseable message");
        return None;
    };

    let from = raw_header(&parsed, HeaderName::From).unwrap_or_default();
    if !from.contains(sender) {
        debug!(from = %from, "Skipping message from unexpected sender");
        return None;
    }

    let subject = raw_header(&parsed, HeaderName::Subject).unwrap_or_default();
    let body = parsed
        .text_body
        .first()
        .or_else(|| parsed.html_body.first())
        .and_then(|&id| parsed.part(id))
        .and_then(|part| part.text_contents())
        .map(str::to_string)
        .unwrap_or_default();

    Some(Post::new(subject, body))
}

fn raw_header<'x>(parsed: &Message<'x>, name: HeaderName<'x>) -> Option<String> {
    parsed.header_raw(name).map(unfold)
}

/// Join folded header lines and trim the surrounding whitespace.
fn unfold(value: &str) -> String {
    value.replace("\r\n", "").replace('\n', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENDER: &str = "me@example.com";

    fn message(from: &str, subject: &str, body: &str) -> Vec<u8> {
        format!("From: {from}\r\nTo: blog@example.com\r\nSubject: {subject}\r\n\r\n{body}")
            .into_bytes()
    }

    #[test]
    fn matching_sender_yields_post() {
        let raw = message("Me <me@example.com>", "My Post", "Hello\n");
        let post = extract_post(&raw, SENDER).unwrap();
        assert_eq!(post.subject, "My Post");
        assert_eq!(post.body, "Hello\n");
    }

    #[test]
    fn other_sender_is_skipped() {
        let raw = message("Spam <spam@example.org>", "Buy now", "...");
        assert!(extract_post(&raw, SENDER).is_none());
    }

    #[test]
    fn sender_match_is_substring_not_exact() {
        let raw = message("\"Me at work\" <me@example.com.au>", "Notes", "x");
        assert!(extract_post(&raw, SENDER).is_some());
    }

    #[test]
    fn sender_match_is_case_sensitive() {
        let raw = message("ME@EXAMPLE.COM", "Loud", "x");
        assert!(extract_post(&raw, SENDER).is_none());
    }

    #[test]
    fn missing_from_header_is_skipped() {
        let raw = b"Subject: Orphan\r\n\r\nno sender\r\n".to_vec();
        assert!(extract_post(&raw, SENDER).is_none());
    }

    #[test]
    fn encoded_subject_is_kept_literal() {
        let raw = message(SENDER, "=?utf-8?q?Caf=C3=A9?=", "body");
        let post = extract_post(&raw, SENDER).unwrap();
        assert_eq!(post.subject, "=?utf-8?q?Caf=C3=A9?=");
    }

    #[test]
    fn folded_subject_is_unfolded() {
        let raw = b"From: me@example.com\r\nSubject: A long\r\n subject line\r\n\r\nbody".to_vec();
        let post = extract_post(&raw, SENDER).unwrap();
        assert_eq!(post.subject, "A long subject line");
    }

    #[test]
    fn quoted_printable_body_is_decoded() {
        let raw = b"From: me@example.com\r\n\
Subject: Coffee\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=C3=A9 with a soft=\r\n\
break\r\n"
            .to_vec();
        let post = extract_post(&raw, SENDER).unwrap();
        assert!(post.body.contains("café with a softbreak"), "{:?}", post.body);
    }

    #[test]
    fn multipart_uses_text_part() {
        let raw = b"From: me@example.com\r\n\
Subject: Mixed\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
plain text\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>html text</p>\r\n\
--b1--\r\n"
            .to_vec();
        let post = extract_post(&raw, SENDER).unwrap();
        assert!(post.body.contains("plain text"));
        assert!(!post.body.contains("<p>"));
    }

    #[test]
    fn html_only_body_keeps_markup() {
        let raw = b"From: me@example.com\r\n\
Subject: Styled\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<h1>Title</h1><p>para <b>bold</b></p>\r\n"
            .to_vec();
        let post = extract_post(&raw, SENDER).unwrap();
        assert!(post.body.contains("<h1>Title</h1>"), "{:?}", post.body);
        assert!(post.body.contains("<b>bold</b>"), "{:?}", post.body);
    }
}
