//! Message content - rendering modes, body derivation and message views

use crate::transport::TransportError;
use lettre::message::{header::ContentType as HeaderContentType, Mailbox, MultiPart, SinglePart};
use lettre::Address;
use mailshot_common::types::ContentType;
use mailshot_common::{Error, Result};
use mailshot_storage::models::Message;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Authoritative content of a message, by rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageContent<'a> {
    /// Single-part text message; only the plain-text body is used
    PlainText { body: &'a str },
    /// Multipart alternative; plain text is the primary part, HTML the alternative
    Html { plain: &'a str, html: &'a str },
}

impl<'a> MessageContent<'a> {
    /// Borrow the content of a message
    pub fn of(message: &'a Message) -> Result<Self> {
        match message.content_type.parse::<ContentType>()? {
            ContentType::PlainText => Ok(MessageContent::PlainText {
                body: &message.plain_text,
            }),
            ContentType::Html => Ok(MessageContent::Html {
                plain: &message.plain_text,
                html: &message.html_text,
            }),
        }
    }
}

/// Normalize the body fields of a message before it is persisted.
///
/// Plain-text messages never carry HTML. HTML messages get whichever body
/// is missing derived from the other. Queued and sent messages are frozen
/// and left untouched.
pub fn prepare_for_save(message: &mut Message) -> Result<()> {
    if message.queued || message.sent {
        return Ok(());
    }

    let content_type = message.content_type.parse::<ContentType>()?;
    derive_bodies(content_type, &mut message.plain_text, &mut message.html_text)
}

/// Fill in or clear body fields according to the content type
pub fn derive_bodies(content_type: ContentType, plain: &mut String, html: &mut String) -> Result<()> {
    match content_type {
        ContentType::PlainText => html.clear(),
        ContentType::Html => match (plain.is_empty(), html.is_empty()) {
            (true, false) => *plain = html_to_text(html),
            (false, true) => *html = text_to_html(plain),
            (true, true) => {
                return Err(Error::Validation(
                    "HTML messages need an HTML or a plain-text body".to_string(),
                ))
            }
            (false, false) => {}
        },
    }

    Ok(())
}

/// Build the email sent to one recipient
pub fn build_email(
    message: &Message,
    recipient: &str,
) -> std::result::Result<lettre::Message, TransportError> {
    let content =
        MessageContent::of(message).map_err(|e| TransportError::InvalidMessage(e.to_string()))?;

    let from_address: Address = message
        .from_email
        .parse()
        .map_err(|e| TransportError::InvalidMessage(format!("Invalid from address: {}", e)))?;
    let from_name = Some(message.from_name.clone()).filter(|n| !n.is_empty());

    let to: Mailbox = recipient
        .parse()
        .map_err(|e| TransportError::InvalidMessage(format!("Invalid recipient: {}", e)))?;

    let builder = lettre::Message::builder()
        .from(Mailbox::new(from_name, from_address))
        .to(to)
        .subject(message.subject.as_str());

    let email = match content {
        MessageContent::PlainText { body } => {
            let builder = match message.reply_to_address() {
                Some(reply_to) => {
                    let reply_to: Mailbox = reply_to.parse().map_err(|e| {
                        TransportError::InvalidMessage(format!("Invalid reply-to: {}", e))
                    })?;
                    builder.reply_to(reply_to)
                }
                None => builder,
            };
            builder
                .header(HeaderContentType::TEXT_PLAIN)
                .body(body.to_string())
        }
        // Reply-To is only attached to plain-text messages
        MessageContent::Html { plain, html } => builder.multipart(
            MultiPart::alternative()
                .singlepart(SinglePart::plain(plain.to_string()))
                .singlepart(SinglePart::html(html.to_string())),
        ),
    };

    email.map_err(|e| TransportError::InvalidMessage(format!("Failed to build email: {}", e)))
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern"))
}

/// Convert an HTML body to readable plain text
pub fn html_to_text(html: &str) -> String {
    static HIDDEN: OnceLock<Regex> = OnceLock::new();
    static BREAK: OnceLock<Regex> = OnceLock::new();
    static LIST_ITEM: OnceLock<Regex> = OnceLock::new();
    static BLOCK_END: OnceLock<Regex> = OnceLock::new();
    static LINK: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();

    let text = regex(&HIDDEN, r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)>")
        .replace_all(html, "");
    // Source newlines carry no meaning in HTML
    let text = text.replace(['\r', '\n'], " ");
    let text = regex(&BREAK, r"(?i)<br\s*/?>").replace_all(&text, "\n");
    let text = regex(&LIST_ITEM, r"(?i)<li[^>]*>").replace_all(&text, "\n* ");
    let text = regex(
        &BLOCK_END,
        r"(?i)</(p|div|h[1-6]|ul|ol|table|tr|blockquote)>",
    )
    .replace_all(&text, "\n\n");
    let text = regex(
        &LINK,
        r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#,
    )
    .replace_all(&text, "$2 ($1)");
    let text = regex(&TAG, r"<[^>]+>").replace_all(&text, "");
    let text = decode_entities(&text);

    let lines: Vec<String> = text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    let text = lines.join("\n");

    regex(&BLANK_LINES, r"\n{3,}")
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();

    let text = regex(&NUMERIC, r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").replace_all(
        text,
        |caps: &Captures| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (_, Some(dec)) => dec.as_str().parse().ok(),
                _ => None,
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        },
    );

    // `&amp;` last so escaped entities stay literal
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lsquo;", "\u{2018}")
        .replace("&rsquo;", "\u{2019}")
        .replace("&ldquo;", "\u{201C}")
        .replace("&rdquo;", "\u{201D}")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&hellip;", "\u{2026}")
        .replace("&copy;", "\u{00A9}")
        .replace("&amp;", "&")
}

/// Convert a plain-text body to HTML: blank lines separate paragraphs,
/// single newlines become line breaks.
pub fn text_to_html(text: &str) -> String {
    static PARAGRAPH_BREAK: OnceLock<Regex> = OnceLock::new();

    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    regex(&PARAGRAPH_BREAK, r"\n{2,}")
        .split(text.trim())
        .map(|para| format!("<p>{}</p>", para.replace('\n', "<br />")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn message(content_type: &str, plain: &str, html: &str) -> Message {
        Message {
            id: uuid::Uuid::now_v7(),
            content_type: content_type.to_string(),
            subject: "Monthly update".to_string(),
            plain_text: plain.to_string(),
            html_text: html.to_string(),
            from_name: "Outreach".to_string(),
            from_email: "outreach@example.org".to_string(),
            reply_to: Some("replies@example.org".to_string()),
            queued: false,
            sent: false,
            delivered: None,
            messages_delivered: 0,
            messages_failed: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_plain_text_message_drops_html() {
        let mut msg = message("P", "Hello", "<p>stale</p>");
        prepare_for_save(&mut msg).unwrap();
        assert_eq!(msg.html_text, "");
        assert_eq!(msg.plain_text, "Hello");
    }

    #[test]
    fn test_html_message_derives_plain_text() {
        let mut msg = message("H", "", "<h1>News</h1><p>First &amp; <b>second</b></p>");
        prepare_for_save(&mut msg).unwrap();
        assert_eq!(msg.plain_text, "News\n\nFirst & second");
        assert_eq!(msg.html_text, "<h1>News</h1><p>First &amp; <b>second</b></p>");
    }

    #[test]
    fn test_html_message_derives_html_from_text() {
        let mut msg = message("H", "Line one\nLine two\n\nNext", "");
        prepare_for_save(&mut msg).unwrap();
        assert_eq!(msg.html_text, "<p>Line one<br />Line two</p>\n\n<p>Next</p>");
    }

    #[test]
    fn test_html_message_without_bodies_is_rejected() {
        let mut msg = message("H", "", "");
        assert!(matches!(prepare_for_save(&mut msg), Err(Error::Validation(_))));
    }

    #[test]
    fn test_queued_message_is_frozen() {
        let mut msg = message("H", "", "<p>Hi</p>");
        msg.queued = true;
        prepare_for_save(&mut msg).unwrap();
        assert_eq!(msg.plain_text, "");

        let mut msg = message("P", "Hi", "<p>kept</p>");
        msg.queued = true;
        prepare_for_save(&mut msg).unwrap();
        assert_eq!(msg.html_text, "<p>kept</p>");
    }

    #[test]
    fn test_html_to_text_links_and_lists() {
        let html = r#"<ul><li>One</li><li>Two</li></ul><p>See <a href="https://example.org">site</a></p>"#;
        assert_eq!(
            html_to_text(html),
            "* One\n* Two\n\nSee site (https://example.org)"
        );
    }

    #[test]
    fn test_html_to_text_decodes_entities() {
        let html = "<p>It&#8217;s &#x41;&nbsp;&mdash; ok &amp;#38; &#xD800; &lt;done&gt;</p>";
        assert_eq!(
            html_to_text(html),
            "It\u{2019}s A \u{2014} ok &#38; &#xD800; <done>"
        );
    }

    #[test]
    fn test_plain_text_email_has_reply_to() {
        let msg = message("P", "Hello there", "");
        let email = build_email(&msg, "reader@example.com").unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("Reply-To: replies@example.org"));
        assert!(raw.contains("To: reader@example.com"));
        assert!(raw.contains("Subject: Monthly update"));
        assert!(raw.contains("Hello there"));
        assert!(!raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_plain_text_email_without_reply_to() {
        for reply_to in [None, Some(String::new()), Some("   ".to_string())] {
            let mut msg = message("P", "Hello there", "");
            msg.reply_to = reply_to;
            let email = build_email(&msg, "reader@example.com").unwrap();
            let raw = String::from_utf8(email.formatted()).unwrap();

            assert!(!raw.contains("Reply-To"));
            assert!(raw.contains("Hello there"));
        }
    }

    #[test]
    fn test_html_email_is_multipart_without_reply_to() {
        let msg = message("H", "Plain body", "<p>Html body</p>");
        let email = build_email(&msg, "reader@example.com").unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Plain body"));
        assert!(raw.contains("<p>Html body</p>"));
        assert!(!raw.contains("Reply-To"));
    }

    #[test]
    fn test_invalid_recipient_fails_to_build() {
        let msg = message("P", "Hello", "");
        assert!(matches!(
            build_email(&msg, "not an address"),
            Err(TransportError::InvalidMessage(_))
        ));
    }
}
