//! Common types for Mailshot

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for messages
pub type MessageId = Uuid;

/// Unique identifier for explicit recipients
pub type RecipientId = Uuid;

/// Unique identifier for delivery log entries
pub type MessageLogId = Uuid;

/// Unique identifier for contact groups
pub type ContactGroupId = Uuid;

/// Unique identifier for queued jobs
pub type JobId = Uuid;

/// Suffix marking a contact address as bounced or disabled
pub const DISABLED_ADDRESS_SUFFIX: &str = "-invalid";

/// Rendering mode of a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    PlainText,
    Html,
}

impl ContentType {
    /// Single-letter code stored in the database
    pub fn code(&self) -> &'static str {
        match self {
            ContentType::PlainText => "P",
            ContentType::Html => "H",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::PlainText => write!(f, "plain_text"),
            ContentType::Html => write!(f, "html"),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P" | "plain_text" => Ok(ContentType::PlainText),
            "H" | "html" => Ok(ContentType::Html),
            _ => Err(crate::Error::Validation(format!(
                "Invalid content type: {}",
                s
            ))),
        }
    }
}

/// Normalize an email address for storage and comparison.
///
/// Addresses are compared case-insensitively everywhere in Mailshot, so the
/// canonical form is trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether a contact address has been flagged as bounced/disabled
pub fn is_disabled_address(email: &str) -> bool {
    email
        .trim()
        .to_lowercase()
        .ends_with(DISABLED_ADDRESS_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_codes() {
        assert_eq!("P".parse::<ContentType>().unwrap(), ContentType::PlainText);
        assert_eq!("H".parse::<ContentType>().unwrap(), ContentType::Html);
        assert_eq!("html".parse::<ContentType>().unwrap(), ContentType::Html);
        assert!("X".parse::<ContentType>().is_err());
        assert_eq!(ContentType::Html.code(), "H");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" A@X.com "), "a@x.com");
        assert_eq!(normalize_email("a@x.com"), "a@x.com");
    }

    #[test]
    fn test_disabled_address() {
        assert!(is_disabled_address("bad@example.com-invalid"));
        assert!(is_disabled_address("bad-INVALID"));
        assert!(!is_disabled_address("invalid@example.com"));
        assert!(!is_disabled_address("good@example.com"));
    }
}
