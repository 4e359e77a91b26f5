//! Message body preparation for the DATA phase.

use crate::parser::CRLF;

/// End-of-data marker sent after the payload.
const END_OF_DATA: &[u8] = b".\r\n";

/// Message body handed to `send_mail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailBody {
    /// Text.
    Text(String),
    /// Raw bytes, for bodies that are not valid UTF-8.
    Bytes(Vec<u8>),
}

impl MailBody {
    /// Returns the bytes to transmit, before dot-stuffing.
    ///
    /// Line endings are normalized to CRLF and the last line is terminated,
    /// so the length of the result is the size announced in `MAIL FROM`.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => normalize_line_endings(text.as_bytes()),
            Self::Bytes(bytes) => normalize_line_endings(&bytes),
        }
    }
}

impl From<&str> for MailBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MailBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for MailBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for MailBody {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

/// Rewrites bare `\r` and `\n` as `\r\n` and terminates the last line.
#[must_use]
pub fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 32 + 2);
    let mut bytes = data.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'\r' => {
                bytes.next_if_eq(&b'\n');
                out.extend_from_slice(CRLF);
            }
            b'\n' => out.extend_from_slice(CRLF),
            _ => out.push(b),
        }
    }
    if !out.ends_with(CRLF) {
        out.extend_from_slice(CRLF);
    }
    out
}

/// Frames a payload for transmission after a `354` reply.
///
/// The payload goes through [`normalize_line_endings`], every line starting
/// with `.` gets one more `.` (RFC 5321 section 4.5.2), and the `.`
/// end-of-data line is appended.
#[must_use]
pub fn prepare_data(payload: &[u8]) -> Vec<u8> {
    let normalized = normalize_line_endings(payload);
    let mut out = Vec::with_capacity(normalized.len() + normalized.len() / 64 + 3);
    let mut at_line_start = true;
    for &b in &normalized {
        if at_line_start && b == b'.' {
            out.push(b'.');
        }
        out.push(b);
        at_line_start = b == b'\n';
    }
    out.extend_from_slice(END_OF_DATA);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_crlf_then_terminator() {
        assert_eq!(prepare_data(b"Hello"), b"Hello\r\n.\r\n");
    }

    #[test]
    fn test_keeps_existing_crlf() {
        assert_eq!(prepare_data(b"Hello\r\n"), b"Hello\r\n.\r\n");
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(prepare_data(b""), b"\r\n.\r\n");
    }

    #[test]
    fn test_lone_dot_line_stuffed_once() {
        assert_eq!(
            prepare_data(b"one\r\n.\r\ntwo\r\n"),
            b"one\r\n..\r\ntwo\r\n.\r\n"
        );
    }

    #[test]
    fn test_leading_dots_stuffed() {
        assert_eq!(prepare_data(b".hidden\r\n"), b"..hidden\r\n.\r\n");
        assert_eq!(prepare_data(b"a.b\r\n"), b"a.b\r\n.\r\n");
    }

    #[test]
    fn test_already_stuffed_input_is_stuffed_again() {
        // Callers pass unstuffed text; ".." is a line starting with a dot.
        assert_eq!(prepare_data(b"..\r\n"), b"...\r\n.\r\n");
    }

    #[test]
    fn test_bare_line_endings_normalized() {
        assert_eq!(prepare_data(b"a\nb\rc"), b"a\r\nb\r\nc\r\n.\r\n");
        assert_eq!(prepare_data(b"a\n.\n"), b"a\r\n..\r\n.\r\n");
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings(b"a\nb\r\nc\rd"), b"a\r\nb\r\nc\r\nd\r\n");
        assert_eq!(normalize_line_endings(b"\r\r\n"), b"\r\n\r\n");
        assert_eq!(normalize_line_endings(b""), b"\r\n");
    }

    #[test]
    fn test_body_is_normalized() {
        let body = MailBody::from("Subject: hi\n\nbody\n");
        assert_eq!(body.into_bytes(), b"Subject: hi\r\n\r\nbody\r\n");

        let raw = MailBody::from(b"raw\n".as_slice());
        assert_eq!(raw.into_bytes(), b"raw\r\n");
    }

    #[test]
    fn test_body_length_matches_framed_payload() {
        let cases: [&[u8]; 4] = [b"a\nb\nc", b"a\rb\r\n.c", b"", b"x\r\n"];
        for raw in cases {
            let body = MailBody::from(raw).into_bytes();
            let framed = prepare_data(&body);
            let stuffed = body
                .split(|&b| b == b'\n')
                .filter(|line| line.first() == Some(&b'.'))
                .count();
            assert_eq!(framed.len(), body.len() + stuffed + END_OF_DATA.len());
        }
    }
}
