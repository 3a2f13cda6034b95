//! Database models

use chrono::{DateTime, Utc};
use mailshot_common::types::{
    ContactGroupId, ContentType, JobId, MessageId, MessageLogId, RecipientId,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Mass-mailing message model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content_type: String,
    pub subject: String,
    pub plain_text: String,
    pub html_text: String,
    pub from_name: String,
    pub from_email: String,
    pub reply_to: Option<String>,
    /// A dispatch job has been submitted; the worker may be sending
    pub queued: bool,
    /// The worker finished sending to every recipient
    pub sent: bool,
    /// When the worker finished sending
    pub delivered: Option<DateTime<Utc>>,
    pub messages_delivered: i32,
    pub messages_failed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Get content type enum
    pub fn content_type_enum(&self) -> Option<ContentType> {
        self.content_type.parse().ok()
    }

    /// Whether this is an HTML message
    pub fn is_html(&self) -> bool {
        self.content_type_enum() == Some(ContentType::Html)
    }

    /// Whether this is a plain-text message
    pub fn is_plain_text(&self) -> bool {
        self.content_type_enum() == Some(ContentType::PlainText)
    }

    /// Value of the "From" header
    pub fn from_header(&self) -> String {
        if self.from_name.is_empty() {
            self.from_email.clone()
        } else {
            format!("\"{}\" <{}>", self.from_name, self.from_email)
        }
    }

    /// Reply-to address, if one is set
    pub fn reply_to_address(&self) -> Option<&str> {
        self.reply_to.as_deref().filter(|r| !r.trim().is_empty())
    }
}

/// Create message input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMessage {
    pub content_type: ContentType,
    pub subject: String,
    pub plain_text: String,
    pub html_text: String,
    pub from_name: String,
    pub from_email: String,
    pub reply_to: Option<String>,
}

/// Update message input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub content_type: Option<ContentType>,
    pub subject: Option<String>,
    pub plain_text: Option<String>,
    pub html_text: Option<String>,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub reply_to: Option<String>,
}

impl UpdateMessage {
    /// Whether the update touches the rendered content
    pub fn changes_content(&self) -> bool {
        self.content_type.is_some()
            || self.subject.is_some()
            || self.plain_text.is_some()
            || self.html_text.is_some()
    }

    /// Whether the update touches the sender identity
    pub fn changes_sender(&self) -> bool {
        self.from_name.is_some() || self.from_email.is_some() || self.reply_to.is_some()
    }

    /// Apply the update onto a message
    pub fn apply_to(self, message: &mut Message) {
        if let Some(content_type) = self.content_type {
            message.content_type = content_type.code().to_string();
        }
        if let Some(subject) = self.subject {
            message.subject = subject;
        }
        if let Some(plain_text) = self.plain_text {
            message.plain_text = plain_text;
        }
        if let Some(html_text) = self.html_text {
            message.html_text = html_text;
        }
        if let Some(from_name) = self.from_name {
            message.from_name = from_name;
        }
        if let Some(from_email) = self.from_email {
            message.from_email = from_email;
        }
        if let Some(reply_to) = self.reply_to {
            message.reply_to = Some(reply_to).filter(|r| !r.trim().is_empty());
        }
    }
}

/// Explicit recipient of a message, independent of contact groups
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub message_id: MessageId,
    pub to_email: String,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one delivery attempt
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: MessageLogId,
    pub message_id: MessageId,
    pub recipient: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Contact group (owned by the contact store)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ContactGroup {
    pub id: ContactGroupId,
    pub name: String,
}

/// A contact group with the raw email addresses of its members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactGroupMembers {
    pub group: ContactGroup,
    pub members: Vec<String>,
}

/// Job queue model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_message() -> Message {
        Message {
            id: uuid::Uuid::now_v7(),
            content_type: "P".to_string(),
            subject: "Newsletter".to_string(),
            plain_text: "Hello".to_string(),
            html_text: String::new(),
            from_name: String::new(),
            from_email: "news@example.org".to_string(),
            reply_to: None,
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
    fn test_from_header() {
        let mut message = sample_message();
        assert_eq!(message.from_header(), "news@example.org");

        message.from_name = "ESO Press".to_string();
        assert_eq!(message.from_header(), "\"ESO Press\" <news@example.org>");
    }

    #[test]
    fn test_reply_to_blank_is_none() {
        let mut message = sample_message();
        message.reply_to = Some("  ".to_string());
        assert_eq!(message.reply_to_address(), None);

        message.reply_to = Some("replies@example.org".to_string());
        assert_eq!(message.reply_to_address(), Some("replies@example.org"));
    }

    #[test]
    fn test_update_apply() {
        let mut message = sample_message();
        let update = UpdateMessage {
            content_type: Some(ContentType::Html),
            html_text: Some("<p>Hi</p>".to_string()),
            reply_to: Some(String::new()),
            ..Default::default()
        };

        assert!(update.changes_content());
        assert!(update.changes_sender());
        update.apply_to(&mut message);

        assert!(message.is_html());
        assert_eq!(message.html_text, "<p>Hi</p>");
        assert_eq!(message.reply_to, None);
        assert_eq!(message.subject, "Newsletter");
    }
}
