//! Envelope address helpers.

/// Quotes an address for use in `MAIL FROM:` or `RCPT TO:`.
///
/// Accepts a bare address, an address already in angle brackets, or a
/// `Display Name <address>` form. The empty address becomes the null
/// reverse-path `<>`.
#[must_use]
pub fn quote_address(addr: &str) -> String {
    let addr = addr.trim();
    let bare = match (addr.rfind('<'), addr.rfind('>')) {
        (Some(open), Some(close)) if open < close => &addr[open + 1..close],
        _ => addr,
    };
    format!("<{}>", bare.trim())
}

/// Ordered list of envelope recipients.
///
/// A single address converts into a one-element list, so `send_mail` accepts
/// either form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// Returns the recipients in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Returns true if there are no recipients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of recipients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the recipients in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<&str> for Recipients {
    fn from(addr: &str) -> Self {
        Self(vec![addr.to_string()])
    }
}

impl From<String> for Recipients {
    fn from(addr: String) -> Self {
        Self(vec![addr])
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addrs: Vec<String>) -> Self {
        Self(addrs)
    }
}

impl From<Vec<&str>> for Recipients {
    fn from(addrs: Vec<&str>) -> Self {
        Self(addrs.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Recipients {
    fn from(addrs: &[&str]) -> Self {
        Self(addrs.iter().map(|a| (*a).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Recipients {
    fn from(addrs: [&str; N]) -> Self {
        Self(addrs.iter().map(|a| (*a).to_string()).collect())
    }
}

impl<'a> IntoIterator for &'a Recipients {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
