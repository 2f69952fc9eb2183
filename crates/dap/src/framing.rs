//! Content-Length message framing.
//!
//! Both directions use the same frame: zero or more `Header: value\r\n`
//! lines, a blank `\r\n`, then exactly `Content-Length` bytes of UTF-8
//! JSON. Only the `Content-Length` header is honored; unknown headers are
//! skipped. Every framing fault is fatal to the connection that produced
//! it — the session keeps serving its other connections.

use std::io::{BufRead, Write};

use thiserror::Error;

/// A wire-level fault. All variants close the connection.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying socket failed or reached EOF mid-message.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection at a frame boundary.
    #[error("connection closed")]
    Closed,

    /// The header block ended without a Content-Length header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// The Content-Length value did not parse as a positive decimal
    /// integer.
    #[error("malformed Content-Length: {0:?}")]
    MalformedContentLength(String),

    /// The frame declared a length of zero.
    #[error("zero-length frame")]
    ZeroLengthFrame,

    /// A header line was not terminated with `\r\n`.
    #[error("header line missing CRLF terminator")]
    BadHeaderTerminator,

    /// The payload was not valid JSON.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The message lacked a mandatory field, or the field had the wrong
    /// type.
    #[error("message missing {0} field")]
    MissingField(&'static str),

    /// The message's `type` field named neither request, response, nor
    /// event.
    #[error("unknown message type {0:?}")]
    UnknownMessageType(String),
}

/// Read one frame's payload from the stream.
///
/// Blocks until a full message is available. Returns
/// [`TransportError::Closed`] on a clean EOF at a frame boundary; any other
/// error means the stream is no longer framed and the caller must close it.
pub fn read_frame(reader: &mut impl BufRead) -> Result<Vec<u8>, TransportError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(TransportError::Closed);
        }
        if !line.ends_with("\r\n") {
            return Err(TransportError::BadHeaderTerminator);
        }
        let line = &line[..line.len() - 2];
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let digits = value.trim_matches(|c| c == ' ' || c == '\t');
            let len = digits
                .parse::<usize>()
                .map_err(|_| TransportError::MalformedContentLength(digits.to_string()))?;
            content_length = Some(len);
        }
    }

    let len = content_length.ok_or(TransportError::MissingContentLength)?;
    if len == 0 {
        return Err(TransportError::ZeroLengthFrame);
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Write one frame to the stream and flush it.
pub fn write_frame(writer: &mut impl Write, payload: &[u8]) -> Result<(), TransportError> {
    write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn frame(payload: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{payload}", payload.len()).into_bytes()
    }

    #[test]
    fn round_trip() {
        let mut out = Vec::new();
        write_frame(&mut out, br#"{"seq":1}"#).unwrap();
        let mut cursor = Cursor::new(out);
        assert_eq!(read_frame(&mut cursor).unwrap(), br#"{"seq":1}"#);
    }

    #[test]
    fn two_frames_back_to_back() {
        let mut bytes = frame("{}");
        bytes.extend_from_slice(&frame(r#"{"a":1}"#));
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"{}");
        assert_eq!(read_frame(&mut cursor).unwrap(), br#"{"a":1}"#);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn unknown_headers_are_skipped() {
        let bytes = b"Content-Type: application/json\r\nContent-Length: 2\r\nX-Custom: 1\r\n\r\n{}";
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"{}");
    }

    #[test]
    fn tabs_and_spaces_before_length() {
        let bytes = b"Content-Length: \t 2\r\n\r\n{}";
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"{}");
    }

    #[test]
    fn missing_content_length() {
        let bytes = b"Content-Type: application/json\r\n\r\n{}";
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(TransportError::MissingContentLength)
        ));
    }

    #[test]
    fn non_integer_length() {
        let bytes = b"Content-Length: twelve\r\n\r\n{}";
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(TransportError::MalformedContentLength(_))
        ));
    }

    #[test]
    fn zero_length_closes() {
        let bytes = b"Content-Length: 0\r\n\r\n";
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(TransportError::ZeroLengthFrame)
        ));
    }

    #[test]
    fn missing_terminator() {
        let bytes = b"Content-Length: 2\n\n{}";
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(TransportError::BadHeaderTerminator)
        ));
    }

    #[test]
    fn truncated_body() {
        let bytes = b"Content-Length: 10\r\n\r\n{}";
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(read_frame(&mut cursor), Err(TransportError::Io(_))));
    }
}
