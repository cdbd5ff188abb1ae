//! Wire-level pieces of the MPD line protocol: reply framing,
//! response classification and the structured `key: value` parsers.

pub mod parse;
pub mod reply;
pub mod types;

/// Wrap a user-supplied name or path for embedding in a command line.
///
/// Backslashes and double quotes are escaped and the whole string is
/// wrapped in double quotes, matching what the server's tokenizer
/// expects for arguments containing whitespace.
pub fn encode_name(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Undo `encode_name` the way the server tokenizer does.
    fn decode_name(encoded: &str) -> Option<String> {
        let inner = encoded.strip_prefix('"')?.strip_suffix('"')?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                out.push(chars.next()?);
            } else {
                out.push(c);
            }
        }
        Some(out)
    }

    #[test]
    fn encode_name_wraps_in_quotes() {
        assert_eq!(encode_name("song.flac"), "\"song.flac\"");
    }

    #[test]
    fn encode_name_escapes_quotes_and_backslashes() {
        assert_eq!(encode_name(r#"a"b"#), r#""a\"b""#);
        assert_eq!(encode_name(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn encode_name_round_trips() {
        for name in [
            "plain",
            "with spaces",
            r#"quo"ted"#,
            r"back\slash",
            r#"mi\x"ed \" both"#,
            "",
        ] {
            let encoded = encode_name(name);
            assert!(encoded.starts_with('"') && encoded.ends_with('"'));
            assert_eq!(decode_name(&encoded).as_deref(), Some(name));
        }
    }
}
