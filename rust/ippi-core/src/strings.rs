//! String-literal codec and identifier syntax.
//!
//! Literal text uses `\ddd` (exactly three decimal digits) for arbitrary
//! bytes. Literals are decoded once, when a program is built; the engine only
//! ever sees raw bytes.

use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use thiserror::Error;

static ESCAPE: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"\\([0-9]{3})").expect("escape pattern is valid"));

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_\-$&%*!?][A-Za-z0-9_\-$&%*!?]*$").expect("identifier pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscapeError {
    #[error("escape sequence '\\{0}' is out of byte range")]
    OutOfRange(String),
    #[error("stray backslash at byte {0}")]
    StrayBackslash(usize),
}

/// Decode `\ddd` escapes into raw bytes.
pub fn decode_escapes(text: &str) -> Result<Vec<u8>, EscapeError> {
    let raw = text.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut last = 0;
    for caps in ESCAPE.captures_iter(raw) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        // every backslash between escapes is stray
        check_plain(raw, last, whole.start)?;
        let digits = caps.get(1).map_or(&b""[..], |m| m.as_bytes());
        let digits = String::from_utf8_lossy(digits).into_owned();
        let code: u16 = digits.parse().unwrap_or(u16::MAX);
        let byte = u8::try_from(code).map_err(|_| EscapeError::OutOfRange(digits))?;
        out.extend_from_slice(&raw[last..whole.start]);
        out.push(byte);
        last = whole.end;
    }
    check_plain(raw, last, raw.len())?;
    out.extend_from_slice(&raw[last..]);
    Ok(out)
}

fn check_plain(raw: &[u8], from: usize, to: usize) -> Result<(), EscapeError> {
    match raw[from..to].iter().position(|b| *b == b'\\') {
        Some(offset) => Err(EscapeError::StrayBackslash(from + offset)),
        None => Ok(()),
    }
}

/// Encode bytes back into literal text. Whitespace, `#`, `\` and every
/// non-printable byte are escaped.
pub fn encode_escapes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b <= 32 || b == b'#' || b == b'\\' || b >= 127 {
            out.push_str(&format!("\\{:03}", b));
        } else {
            out.push(b as char);
        }
    }
    out
}

/// Whether `name` is a legal variable or label identifier.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Split a byte string into characters.
///
/// Valid UTF-8 is split into Unicode scalars; anything else is treated as
/// one character per byte.
pub fn characters(bytes: &[u8]) -> Vec<&[u8]> {
    match std::str::from_utf8(bytes) {
        Ok(s) => s
            .char_indices()
            .map(|(i, c)| &bytes[i..i + c.len_utf8()])
            .collect(),
        Err(_) => bytes.chunks(1).collect(),
    }
}

/// Code point of a single character as produced by [`characters`].
pub fn code_point(ch: &[u8]) -> u32 {
    match std::str::from_utf8(ch).ok().and_then(|s| s.chars().next()) {
        Some(c) => c as u32,
        None => ch.first().copied().map_or(0, u32::from),
    }
}
