//! Message selectors
//!
//! A small subset of JMS selector syntax: equality tests on message
//! properties joined with `AND`.
//! ```text
//! region = 'EU'
//! region = 'EU' AND priority = 4
//! ```

use crate::error::{MessagingError, Result};
use crate::message::Message;

/// A parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    clauses: Vec<(String, String)>,
}

impl Selector {
    pub fn parse(expr: &str) -> Result<Self> {
        let invalid = || MessagingError::InvalidSelector(expr.to_string());
        let mut clauses = Vec::new();

        for clause in split_and(expr) {
            let (name, value) = clause.split_once('=').ok_or_else(invalid)?;
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() || name.contains(char::is_whitespace) {
                return Err(invalid());
            }
            let value = match value.strip_prefix('\'') {
                Some(rest) => rest.strip_suffix('\'').ok_or_else(invalid)?,
                None if value.contains(char::is_whitespace) || value.contains('\'') => {
                    return Err(invalid())
                }
                None => value,
            };
            clauses.push((name.to_string(), value.to_string()));
        }

        if clauses.is_empty() {
            return Err(invalid());
        }
        Ok(Self { clauses })
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.clauses
            .iter()
            .all(|(name, value)| message.property(name) == Some(value.as_str()))
    }
}

/// Split on the `AND` keyword, case-insensitively, outside quotes
fn split_and(expr: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let bytes = expr.as_bytes();
    let mut in_quotes = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\'' {
            in_quotes = !in_quotes;
        } else if !in_quotes
            && i + 5 <= bytes.len()
            && bytes[i] == b' '
            && bytes[i + 4] == b' '
            && bytes[i + 1..i + 4].eq_ignore_ascii_case(b"and")
        {
            parts.push(&expr[start..i]);
            start = i + 5;
            i += 5;
            continue;
        }
        i += 1;
    }
    parts.push(&expr[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_clause() {
        let selector = Selector::parse("region = 'EU'").unwrap();
        assert!(selector.matches(&Message::new("x").with_property("region", "EU")));
        assert!(!selector.matches(&Message::new("x").with_property("region", "US")));
        assert!(!selector.matches(&Message::new("x")));
    }

    #[test]
    fn test_conjunction() {
        let selector = Selector::parse("region = 'EU' and priority = 4").unwrap();
        let both = Message::new("x")
            .with_property("region", "EU")
            .with_property("priority", "4");
        assert!(selector.matches(&both));
        assert!(!selector.matches(&Message::new("x").with_property("region", "EU")));
    }

    #[test]
    fn test_and_inside_quotes() {
        let selector = Selector::parse("name = 'salt and pepper'").unwrap();
        assert!(selector.matches(&Message::new("x").with_property("name", "salt and pepper")));
    }

    #[test]
    fn test_invalid() {
        for expr in ["", "region", "= 'EU'", "region = 'EU", "a b = 1", "region = E U"] {
            assert!(Selector::parse(expr).is_err(), "{:?} should be invalid", expr);
        }
    }
}
