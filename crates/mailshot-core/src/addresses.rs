//! Address list parsing for imports and test sends

use lettre::Address;
use mailshot_common::{Error, Result};

/// Parse one address per line. Blank lines are skipped.
pub fn parse_address_lines(text: &str) -> Result<Vec<String>> {
    parse(text.lines())
}

/// Parse a comma-separated address list
pub fn parse_address_list(text: &str) -> Result<Vec<String>> {
    parse(text.split(','))
}

fn parse<'a>(entries: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
    entries
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<Address>()
                .map(|_| entry.to_string())
                .map_err(|_| Error::Validation(format!("'{}' is not a valid email address.", entry)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_lines() {
        let parsed = parse_address_lines("a@example.com\n\n  B@Example.com \r\n").unwrap();
        assert_eq!(parsed, vec!["a@example.com", "B@Example.com"]);
    }

    #[test]
    fn test_parse_list() {
        let parsed = parse_address_list("qa@example.com, dev@example.com,").unwrap();
        assert_eq!(parsed, vec!["qa@example.com", "dev@example.com"]);
    }

    #[test]
    fn test_invalid_entry_fails_batch() {
        let err = parse_address_lines("a@example.com\nnot-an-address").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: 'not-an-address' is not a valid email address."
        );
    }
}
