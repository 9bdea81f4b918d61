use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::pool::PooledBuf;

/// One raw header line. Name casing and per-name insertion order are preserved
/// so a decoded head re-encodes byte for byte; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    pub name: String,
    pub value: String,
}

impl HeaderLine {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
    pub headers: Vec<HeaderLine>,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            version: Version::HTTP_11,
            status,
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HeaderLine::new(name, value));
        self
    }

    /// First value of the named header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|line| line.is(name))
            .map(|line| line.value.as_str())
    }

    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |line| line.is(name))
            .map(|line| line.value.as_str())
    }

    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for line in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(line.name.as_str()),
                HeaderValue::from_str(&line.value),
            ) {
                map.append(name, value);
            }
        }
        map
    }
}

pub struct Response {
    pub head: ResponseHead,
    pub body: Body,
}

impl Response {
    pub fn new(head: ResponseHead, body: Body) -> Self {
        Self { head, body }
    }

    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    pub fn into_parts(self) -> (ResponseHead, Body) {
        (self.head, self.body)
    }

    pub fn from_parts(head: ResponseHead, body: Body) -> Self {
        Self { head, body }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

/// Response or request payload with a definite end. Pooled variants hand their
/// buffer back to the owning pool when the body is dropped.
pub struct Body {
    kind: BodyKind,
}

enum BodyKind {
    Empty,
    Bytes { data: Bytes, pos: usize },
    Pooled { buf: PooledBuf, pos: usize },
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl Body {
    pub fn empty() -> Self {
        Self {
            kind: BodyKind::Empty,
        }
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            kind: BodyKind::Bytes {
                data: data.into(),
                pos: 0,
            },
        }
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            kind: BodyKind::Stream(Box::new(reader)),
        }
    }

    pub(crate) fn from_pooled(buf: PooledBuf) -> Self {
        Self {
            kind: BodyKind::Pooled { buf, pos: 0 },
        }
    }

    /// Drains the body to completion and returns the collected bytes.
    pub async fn bytes(mut self) -> io::Result<Bytes> {
        match self.kind {
            BodyKind::Empty => Ok(Bytes::new()),
            BodyKind::Bytes { data, pos } => Ok(data.slice(pos..)),
            BodyKind::Pooled { ref buf, pos } => Ok(Bytes::copy_from_slice(&buf[pos..])),
            BodyKind::Stream(ref mut reader) => {
                let mut collected = Vec::new();
                reader.read_to_end(&mut collected).await?;
                Ok(Bytes::from(collected))
            }
        }
    }

    /// Appends the remaining body bytes to `out`.
    pub(crate) async fn drain_into(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        match &mut self.kind {
            BodyKind::Empty => Ok(()),
            BodyKind::Bytes { data, pos } => {
                out.extend_from_slice(&data[*pos..]);
                *pos = data.len();
                Ok(())
            }
            BodyKind::Pooled { buf, pos } => {
                out.extend_from_slice(&buf[*pos..]);
                *pos = buf.len();
                Ok(())
            }
            BodyKind::Stream(reader) => reader.read_to_end(out).await.map(|_| ()),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            BodyKind::Empty => "Empty",
            BodyKind::Bytes { .. } => "Bytes",
            BodyKind::Pooled { .. } => "Pooled",
            BodyKind::Stream(_) => "Stream",
        };
        f.debug_tuple("Body").field(&kind).finish()
    }
}

fn copy_slice(slice: &[u8], pos: &mut usize, buf: &mut ReadBuf<'_>) {
    let remaining = &slice[*pos..];
    let take = remaining.len().min(buf.remaining());
    buf.put_slice(&remaining[..take]);
    *pos += take;
}

impl AsyncRead for Body {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().kind {
            BodyKind::Empty => Poll::Ready(Ok(())),
            BodyKind::Bytes { data, pos } => {
                copy_slice(&data[..], pos, buf);
                Poll::Ready(Ok(()))
            }
            BodyKind::Pooled { buf: data, pos } => {
                copy_slice(&data[..], pos, buf);
                Poll::Ready(Ok(()))
            }
            BodyKind::Stream(reader) => Pin::new(reader).poll_read(cx, buf),
        }
    }
}
