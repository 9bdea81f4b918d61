//! Serialization of HTTP messages to and from linear byte streams.
//!
//! The wire form is the standard textual framing: a start line, a header
//! block with one terminated line per header, a blank line, then the raw body
//! bytes to end of stream. Decoding hands the body back lazily; it is never
//! copied eagerly out of the underlying stream.

mod line;
mod request;
mod response;

use thiserror::Error;

pub use request::{decode_request, encode_request_head};
pub use response::{decode_response, encode_response_head};

pub(crate) const MAX_HEAD_LINE_BYTES: usize = 64 * 1024;

/// Why a serialized message could not be decoded. Callers treat every variant
/// identically to a storage-read fault: the entry is ignored, never trusted.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of stream")]
    UnexpectedEof,
    #[error("head line exceeds {MAX_HEAD_LINE_BYTES} bytes")]
    LineTooLong,
    #[error("head line is not valid UTF-8")]
    InvalidEncoding,
    #[error("malformed status line {0:?}")]
    MalformedStatusLine(String),
    #[error("malformed status code {0:?}")]
    MalformedStatusCode(String),
    #[error("malformed request line {0:?}")]
    MalformedRequestLine(String),
    #[error("unrecognized protocol version {0:?}")]
    UnrecognizedVersion(String),
    #[error("header line missing ':' separator {0:?}")]
    MalformedHeader(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
