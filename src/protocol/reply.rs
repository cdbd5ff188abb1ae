//! Reply framing and response classification.
//!
//! A reply is complete when the accumulated buffer ends with the
//! success terminator `OK\n`, or starts with `OK` (the greeting line,
//! which carries no trailing terminator) or `ACK` (an error). The
//! socket layer accumulates bytes until `is_terminated` holds and hands
//! the raw buffer to `Response::classify`.

/// True when `data` holds a complete reply.
pub fn is_terminated(data: &[u8]) -> bool {
    data.ends_with(b"OK\n") || data.starts_with(b"OK") || data.starts_with(b"ACK")
}

/// Outcome of one request: success with the raw payload, or failure
/// with the cleaned error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub ok: bool,
    pub data: String,
}

impl Response {
    /// Classify a raw reply buffer.
    ///
    /// Success iff the buffer ends with `OK\n`. On failure the server
    /// sends `ACK [code@index] {command} message`; everything up to and
    /// including the first `} ` separator is stripped, along with a
    /// single trailing newline, leaving the human-readable message.
    /// The numeric code is positional only and never inspected.
    pub fn classify(raw: &[u8]) -> Self {
        let ok = raw.ends_with(b"OK\n");
        let mut data = String::from_utf8_lossy(raw).into_owned();
        if !ok && !data.is_empty() {
            if let Some(pos) = data.find("} ") {
                data.drain(..pos + 2);
                if data.ends_with('\n') {
                    data.pop();
                }
            }
        }
        Self { ok, data }
    }

    /// A response for a request that never reached the server.
    pub fn failed() -> Self {
        Self {
            ok: false,
            data: String::new(),
        }
    }
}
