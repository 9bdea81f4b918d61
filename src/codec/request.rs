use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use tokio::io::{AsyncRead, BufReader};

use crate::message::{Body, Request};

use super::DecodeError;
use super::line::{read_head_line, read_header_lines};
use super::response::{parse_version, version_token};

/// Encodes a request head with the same framing as a response: request line,
/// header block, blank line. Kept for storage and diagnostic parity.
pub fn encode_request_head(request: &Request) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(256);
    buffer.extend_from_slice(request.method.as_str().as_bytes());
    buffer.push(b' ');
    buffer.extend_from_slice(request.uri.to_string().as_bytes());
    buffer.push(b' ');
    buffer.extend_from_slice(version_token(request.version).as_bytes());
    buffer.extend_from_slice(b"\r\n");
    for (name, value) in request.headers.iter() {
        buffer.extend_from_slice(name.as_str().as_bytes());
        buffer.extend_from_slice(b": ");
        buffer.extend_from_slice(value.as_bytes());
        buffer.extend_from_slice(b"\r\n");
    }
    buffer.extend_from_slice(b"\r\n");
    buffer
}

/// Decodes a serialized request; the remainder of the stream becomes the body.
pub async fn decode_request<R>(reader: R) -> Result<Request, DecodeError>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let read = read_head_line(&mut reader, &mut line).await?;
    if read == 0 {
        return Err(DecodeError::UnexpectedEof);
    }
    let (method, uri, version) = parse_request_line(&line)?;

    let mut headers = HeaderMap::new();
    for header in read_header_lines(&mut reader).await? {
        let name = HeaderName::try_from(header.name.as_str())
            .map_err(|_| DecodeError::MalformedHeader(header.name.clone()))?;
        let value = HeaderValue::from_str(&header.value)
            .map_err(|_| DecodeError::MalformedHeader(header.value.clone()))?;
        headers.append(name, value);
    }

    Ok(Request {
        method,
        uri,
        version,
        headers,
        body: Body::from_reader(reader),
    })
}

fn parse_request_line(line: &str) -> Result<(Method, Uri, http::Version), DecodeError> {
    let mut parts = line.split(' ').filter(|part| !part.is_empty());
    let method = parts
        .next()
        .ok_or_else(|| DecodeError::MalformedRequestLine(line.to_string()))?;
    let target = parts
        .next()
        .ok_or_else(|| DecodeError::MalformedRequestLine(line.to_string()))?;
    let proto = parts
        .next()
        .ok_or_else(|| DecodeError::MalformedRequestLine(line.to_string()))?;

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| DecodeError::MalformedRequestLine(line.to_string()))?;
    let uri = target
        .parse::<Uri>()
        .map_err(|_| DecodeError::MalformedRequestLine(line.to_string()))?;
    let version = parse_version(proto)?;

    Ok((method, uri, version))
}
