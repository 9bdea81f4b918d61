use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;

use crate::message::{Body, Request};

const JOINT_SEPARATOR: char = '/';
const EMPTY_KEY: &str = "empty";

/// Derives a deterministic cache key from a request. Derivation is
/// side-effect-free with one exception: a body-based keyer consumes the body
/// and must leave an equivalent re-readable body behind for the origin call.
#[async_trait]
pub trait Keyer: Send + Sync {
    async fn key(&self, request: &mut Request) -> String;
}

/// Hex-encoded fixed-size digest of the extracted bytes.
pub fn hash_key(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Unpadded base64 of the raw extracted bytes, for extractions that do not
/// need collision resistance.
pub fn base64_key(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes)
}

/// Concatenates sub-keys with a path-safe separator, preserving the supplied
/// order; reordering sub-keyers changes every derived key. Joining zero
/// keyers degenerates to a constant key.
pub struct JointKeyer {
    keyers: Vec<Box<dyn Keyer>>,
}

impl JointKeyer {
    pub fn new(keyers: Vec<Box<dyn Keyer>>) -> Self {
        Self { keyers }
    }
}

#[async_trait]
impl Keyer for JointKeyer {
    async fn key(&self, request: &mut Request) -> String {
        if self.keyers.is_empty() {
            return EMPTY_KEY.to_string();
        }
        let mut keys = Vec::with_capacity(self.keyers.len());
        for keyer in &self.keyers {
            keys.push(keyer.key(request).await);
        }
        keys.join(&JOINT_SEPARATOR.to_string())
    }
}

/// Content-addresses bytes extracted by a caller-supplied function.
pub struct HashKeyer<F> {
    extract: F,
}

impl<F> HashKeyer<F>
where
    F: Fn(&Request) -> Vec<u8> + Send + Sync,
{
    pub fn new(extract: F) -> Self {
        Self { extract }
    }
}

#[async_trait]
impl<F> Keyer for HashKeyer<F>
where
    F: Fn(&Request) -> Vec<u8> + Send + Sync,
{
    async fn key(&self, request: &mut Request) -> String {
        hash_key(&(self.extract)(request))
    }
}

/// Base64-encodes bytes extracted by a caller-supplied function.
pub struct Base64Keyer<F> {
    extract: F,
}

impl<F> Base64Keyer<F>
where
    F: Fn(&Request) -> Vec<u8> + Send + Sync,
{
    pub fn new(extract: F) -> Self {
        Self { extract }
    }
}

#[async_trait]
impl<F> Keyer for Base64Keyer<F>
where
    F: Fn(&Request) -> Vec<u8> + Send + Sync,
{
    async fn key(&self, request: &mut Request) -> String {
        base64_key(&(self.extract)(request))
    }
}

pub struct MethodKeyer;

#[async_trait]
impl Keyer for MethodKeyer {
    async fn key(&self, request: &mut Request) -> String {
        request.method.as_str().to_string()
    }
}

pub struct PathKeyer;

#[async_trait]
impl Keyer for PathKeyer {
    async fn key(&self, request: &mut Request) -> String {
        base64_key(request.uri.path().as_bytes())
    }
}

pub struct HostKeyer;

#[async_trait]
impl Keyer for HostKeyer {
    async fn key(&self, request: &mut Request) -> String {
        let authority = request
            .uri
            .authority()
            .map(|authority| authority.as_str())
            .unwrap_or("");
        base64_key(authority.as_bytes())
    }
}

/// Keys on named query parameters, in the order the names were supplied. A
/// parameter present with no value contributes its name and a trailing
/// separator, which keeps it distinct from an absent parameter.
pub struct QueryKeyer {
    names: Vec<String>,
}

impl QueryKeyer {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Keyer for QueryKeyer {
    async fn key(&self, request: &mut Request) -> String {
        let query = request.uri.query().unwrap_or("");
        let mut extracted = Vec::new();
        for name in &self.names {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                match pair.split_once('=') {
                    Some((key, value)) if key == name => {
                        extracted.extend_from_slice(name.as_bytes());
                        extracted.push(b'=');
                        extracted.extend_from_slice(value.as_bytes());
                        extracted.push(b'&');
                    }
                    None if pair == name => {
                        extracted.extend_from_slice(name.as_bytes());
                        extracted.push(b'&');
                    }
                    _ => {}
                }
            }
        }
        base64_key(&extracted)
    }
}

/// Keys on named headers, in the order the names were supplied; every value
/// of a repeated header contributes in insertion order.
pub struct HeaderKeyer {
    names: Vec<String>,
}

impl HeaderKeyer {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Keyer for HeaderKeyer {
    async fn key(&self, request: &mut Request) -> String {
        let mut extracted = Vec::new();
        for name in &self.names {
            for value in request.headers.get_all(name.as_str()) {
                extracted.extend_from_slice(name.as_bytes());
                extracted.push(b'=');
                extracted.extend_from_slice(value.as_bytes());
                extracted.push(b'\n');
            }
        }
        base64_key(&extracted)
    }
}

/// Content-addresses the request body. The body is drained to compute the
/// digest and replaced with an equivalent in-memory body so the origin still
/// observes the full payload.
pub struct BodyKeyer;

#[async_trait]
impl Keyer for BodyKeyer {
    async fn key(&self, request: &mut Request) -> String {
        let body = std::mem::take(&mut request.body);
        let content = body.bytes().await.unwrap_or_default();
        let key = hash_key(&content);
        request.body = Body::from_bytes(content);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, Method, Uri};

    fn request(uri: &str) -> Request {
        Request::get(uri.parse::<Uri>().unwrap())
    }

    #[tokio::test]
    async fn joint_key_preserves_keyer_order() {
        let mut req = request("http://example.com/path");
        let host_then_path = JointKeyer::new(vec![Box::new(HostKeyer), Box::new(PathKeyer)])
            .key(&mut req)
            .await;
        let path_then_host = JointKeyer::new(vec![Box::new(PathKeyer), Box::new(HostKeyer)])
            .key(&mut req)
            .await;
        assert_ne!(host_then_path, path_then_host);
        assert!(host_then_path.contains(JOINT_SEPARATOR));
    }

    #[tokio::test]
    async fn empty_joint_keyer_yields_constant_key() {
        let mut req = request("http://example.com/path");
        assert_eq!(JointKeyer::new(Vec::new()).key(&mut req).await, EMPTY_KEY);
    }

    #[tokio::test]
    async fn host_keyer_separates_hosts_with_identical_paths() {
        let mut alpha = request("http://alpha.example.com/shared");
        let mut beta = request("http://beta.example.com/shared");
        assert_ne!(
            HostKeyer.key(&mut alpha).await,
            HostKeyer.key(&mut beta).await
        );
    }

    #[tokio::test]
    async fn query_keyer_distinguishes_empty_from_absent() {
        let mut with_flag = request("http://example.com/?flag");
        let mut without_flag = request("http://example.com/");
        let keyer = QueryKeyer::new(["flag"]);
        assert_ne!(
            keyer.key(&mut with_flag).await,
            keyer.key(&mut without_flag).await
        );
    }

    #[tokio::test]
    async fn query_keyer_ignores_unlisted_parameters() {
        let mut a = request("http://example.com/?q=1&noise=x");
        let mut b = request("http://example.com/?q=1&noise=y");
        let keyer = QueryKeyer::new(["q"]);
        assert_eq!(keyer.key(&mut a).await, keyer.key(&mut b).await);
    }

    #[tokio::test]
    async fn header_keyer_covers_repeated_values() {
        let keyer = HeaderKeyer::new(["accept"]);

        let mut single = request("http://example.com/");
        single
            .headers
            .append("accept", HeaderValue::from_static("text/html"));

        let mut repeated = request("http://example.com/");
        repeated
            .headers
            .append("accept", HeaderValue::from_static("text/html"));
        repeated
            .headers
            .append("accept", HeaderValue::from_static("application/json"));

        assert_ne!(keyer.key(&mut single).await, keyer.key(&mut repeated).await);
    }

    #[tokio::test]
    async fn body_keyer_restores_a_readable_body() {
        let mut req = Request::new(Method::POST, "http://example.com/".parse().unwrap())
            .with_body(Body::from_bytes("the payload"));

        let first = BodyKeyer.key(&mut req).await;
        assert_eq!(first, hash_key(b"the payload"));

        // The origin must still see the full body afterwards.
        let body = std::mem::take(&mut req.body);
        assert_eq!(body.bytes().await.unwrap().as_ref(), b"the payload");
    }

    #[tokio::test]
    async fn derivation_is_deterministic() {
        let keyer = JointKeyer::new(vec![
            Box::new(MethodKeyer),
            Box::new(HostKeyer),
            Box::new(PathKeyer),
            Box::new(QueryKeyer::new(["q"])),
        ]);
        let mut a = request("http://example.com/search?q=cache");
        let mut b = request("http://example.com/search?q=cache");
        assert_eq!(keyer.key(&mut a).await, keyer.key(&mut b).await);
    }
}
