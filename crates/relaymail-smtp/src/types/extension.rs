//! SASL mechanism and the capability set negotiated by EHLO.

use std::collections::HashSet;

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - credentials in a single initial response
    Plain,
}

impl AuthMechanism {
    /// Returns the mechanism name as sent after `AUTH`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
        }
    }
}

/// Capability set negotiated by EHLO.
///
/// Every reply line is stored upper-cased; lookups are exact matches on the
/// whole line, so `"AUTH LOGIN PLAIN"` matches only that exact advertisement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    tokens: HashSet<String>,
}

impl Capabilities {
    /// Builds the set from EHLO reply lines.
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: lines
                .into_iter()
                .map(|line| line.as_ref().trim().to_uppercase())
                .collect(),
        }
    }

    /// Returns true if a line equal to `token` (ignoring case) was advertised.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(&token.trim().to_uppercase())
    }

    /// Returns true if nothing has been negotiated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns the number of advertised lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the SIZE extension is advertised, with or without a
    /// limit.
    #[must_use]
    pub fn supports_size(&self) -> bool {
        self.tokens
            .iter()
            .any(|line| line.split_whitespace().next() == Some("SIZE"))
    }

    pub(crate) fn clear(&mut self) {
        self.tokens.clear();
    }
}
