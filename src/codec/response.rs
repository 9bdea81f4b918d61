use http::{StatusCode, Version};
use tokio::io::{AsyncRead, BufReader};

use crate::message::{Body, Response, ResponseHead};

use super::DecodeError;
use super::line::{read_head_line, read_header_lines};

/// Encodes a response head: status line, header block, terminating blank
/// line. Headers are written exactly as held in the head; no framing header is
/// invented or removed.
pub fn encode_response_head(head: &ResponseHead) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(256);
    buffer.extend_from_slice(version_token(head.version).as_bytes());
    buffer.push(b' ');
    buffer.extend_from_slice(head.status.as_str().as_bytes());
    if !head.reason.is_empty() {
        buffer.push(b' ');
        buffer.extend_from_slice(head.reason.as_bytes());
    }
    buffer.extend_from_slice(b"\r\n");
    for line in &head.headers {
        buffer.extend_from_slice(line.name.as_bytes());
        buffer.extend_from_slice(b": ");
        buffer.extend_from_slice(line.value.as_bytes());
        buffer.extend_from_slice(b"\r\n");
    }
    buffer.extend_from_slice(b"\r\n");
    buffer
}

/// Decodes a serialized response. The remainder of `reader` past the header
/// block becomes the body, handed back as a lazily-read stream.
pub async fn decode_response<R>(reader: R) -> Result<Response, DecodeError>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let read = read_head_line(&mut reader, &mut line).await?;
    if read == 0 {
        return Err(DecodeError::UnexpectedEof);
    }
    let (version, status, reason) = parse_status_line(&line)?;
    let headers = read_header_lines(&mut reader).await?;

    Ok(Response::new(
        ResponseHead {
            version,
            status,
            reason,
            headers,
        },
        Body::from_reader(reader),
    ))
}

pub(super) fn version_token(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    }
}

pub(super) fn parse_version(token: &str) -> Result<Version, DecodeError> {
    match token {
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        other => Err(DecodeError::UnrecognizedVersion(other.to_string())),
    }
}

fn parse_status_line(line: &str) -> Result<(Version, StatusCode, String), DecodeError> {
    let (proto, rest) = line
        .split_once(' ')
        .ok_or_else(|| DecodeError::MalformedStatusLine(line.to_string()))?;
    let version = parse_version(proto)?;

    let rest = rest.trim_start_matches(' ');
    let (code, reason) = match rest.split_once(' ') {
        Some((code, reason)) => (code, reason),
        None => (rest, ""),
    };
    if code.len() != 3 || !code.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(DecodeError::MalformedStatusCode(code.to_string()));
    }
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| DecodeError::MalformedStatusCode(code.to_string()))?;

    Ok((version, status, reason.to_string()))
}
