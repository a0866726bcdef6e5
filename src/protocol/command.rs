use hyper::body::Body;
use hyper::{Method, Request};
use percent_encoding::percent_decode_str;
use tracing::warn;

use crate::error::{BoxError, Error, Result};
use crate::protocol::delete::DeleteCmd;
use crate::protocol::get::GetCmd;
use crate::protocol::reply::Reply;
use crate::protocol::set::{BodyPolicy, SetCmd, read_body};
use crate::store::Store;

/// Decode `%XX` escapes in a request path.
///
/// A `%` not followed by two hex digits is rejected. Bytes that do not form
/// valid UTF-8 after decoding are replaced with U+FFFD.
pub fn decode_path(path: &str) -> Result<String> {
    let bytes = path.as_bytes();
    let malformed = bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    });
    if malformed {
        return Err(Error::InvalidPath(path.to_string()));
    }

    Ok(percent_decode_str(path).decode_utf8_lossy().into_owned())
}

/// Store operation selected by the request method
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// GET path
    Get(GetCmd),
    /// POST path, body
    Set(SetCmd),
    /// DELETE path
    Delete(DeleteCmd),
    /// Any other method
    Unsupported(Method),
}

impl Command {
    /// Build a command from an HTTP request.
    ///
    /// The key is the percent-decoded URI path; dot segments and repeated
    /// slashes are kept as sent. A POST body is fully buffered here, so a
    /// failed read never reaches the store.
    pub async fn from_request<B>(request: Request<B>, policy: &BodyPolicy) -> Result<Self>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let key = decode_path(parts.uri.path())?;

        let cmd = match parts.method {
            Method::GET => Command::Get(GetCmd::new(key)),
            Method::POST => {
                let value = read_body(body, policy).await?;
                Command::Set(SetCmd::new(key, value))
            }
            Method::DELETE => Command::Delete(DeleteCmd::new(key)),
            other => Command::Unsupported(other),
        };
        Ok(cmd)
    }

    /// Execute the command on the given store and return the reply
    pub fn execute(&self, store: &Store) -> Reply {
        match self {
            Command::Get(cmd) => cmd.execute(store),
            Command::Set(cmd) => cmd.execute(store),
            Command::Delete(cmd) => cmd.execute(store),
            Command::Unsupported(_) => Reply::MethodNotAllowed,
        }
    }

    /// Parse and execute a request against the given store
    pub async fn handle<B>(request: Request<B>, store: &Store, policy: &BodyPolicy) -> Reply
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match Self::from_request(request, policy).await {
            Ok(cmd) => cmd.execute(store),
            Err(e @ Error::BodyTooLarge { .. }) => {
                warn!("{} {} rejected: {}", method, path, e);
                Reply::PayloadTooLarge
            }
            Err(e @ Error::InvalidPath(_)) => {
                warn!("{} {} rejected: {}", method, path, e);
                Reply::BadRequest
            }
            Err(e) => {
                warn!("{} {} failed: {}", method, path, e);
                Reply::InternalError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;

    fn request(method: Method, path: &str, body: &'static [u8]) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    async fn send(store: &Store, method: Method, path: &str, body: &'static [u8]) -> Reply {
        Command::handle(request(method, path, body), store, &BodyPolicy::default()).await
    }

    #[tokio::test]
    async fn test_parse_get_command() {
        let cmd = Command::from_request(request(Method::GET, "/mykey", b""), &BodyPolicy::default())
            .await
            .unwrap();
        assert_eq!(cmd, Command::Get(GetCmd::new("/mykey")));
    }

    #[tokio::test]
    async fn test_parse_set_command() {
        let cmd = Command::from_request(
            request(Method::POST, "/mykey", b"myvalue"),
            &BodyPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(cmd, Command::Set(SetCmd::new("/mykey", "myvalue")));
    }

    #[tokio::test]
    async fn test_key_is_decoded_path() {
        let cmd = Command::from_request(
            request(Method::GET, "http://example.com/a/../b%20c?q=1", b""),
            &BodyPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(cmd, Command::Get(GetCmd::new("/a/../b c")));
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/plain").unwrap(), "/plain");
        assert_eq!(decode_path("/a%2Fb").unwrap(), "/a/b");
        assert_eq!(decode_path("/100%25").unwrap(), "/100%");
        assert_eq!(decode_path("/%e2%9c%93").unwrap(), "/\u{2713}");
        assert_eq!(decode_path("/%ff").unwrap(), "/\u{fffd}");
    }

    #[test]
    fn test_decode_path_rejects_bad_escapes() {
        for path in ["/%", "/%4", "/%zz", "/a%%41"] {
            assert!(
                matches!(decode_path(path), Err(Error::InvalidPath(_))),
                "{}",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_escaped_and_plain_paths_share_a_key() {
        let store = Store::new();
        send(&store, Method::POST, "/a/b", b"nested").await;

        assert_eq!(
            send(&store, Method::GET, "/a%2Fb", b"").await,
            Reply::Value(Bytes::from_static(b"nested"))
        );
    }

    #[tokio::test]
    async fn test_bad_escape_is_rejected_without_mutation() {
        let store = Store::new();

        assert_eq!(
            send(&store, Method::POST, "/bad%zz", b"v").await,
            Reply::BadRequest
        );
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_parse_unsupported_method() {
        let cmd = Command::from_request(request(Method::PUT, "/k", b"v"), &BodyPolicy::default())
            .await
            .unwrap();
        assert_eq!(cmd, Command::Unsupported(Method::PUT));
    }

    #[tokio::test]
    async fn test_end_to_end_sequence() {
        let store = Store::new();

        assert_eq!(
            send(&store, Method::POST, "/x", b"hello").await,
            Reply::Value(Bytes::from_static(b"hello"))
        );
        assert_eq!(
            send(&store, Method::GET, "/x", b"").await,
            Reply::Value(Bytes::from_static(b"hello"))
        );
        assert_eq!(send(&store, Method::DELETE, "/x", b"").await, Reply::Empty);
        assert_eq!(send(&store, Method::GET, "/x", b"").await, Reply::NotFound);
        assert_eq!(
            send(&store, Method::PATCH, "/x", b"").await,
            Reply::MethodNotAllowed
        );
    }

    #[tokio::test]
    async fn test_unsupported_method_leaves_store_untouched() {
        let store = Store::new();
        send(&store, Method::POST, "/k", b"v1").await;

        assert_eq!(
            send(&store, Method::PUT, "/k", b"v2").await,
            Reply::MethodNotAllowed
        );
        assert_eq!(
            send(&store, Method::PUT, "/other", b"v2").await,
            Reply::MethodNotAllowed
        );
        assert_eq!(store.get("/k").unwrap(), Some(Bytes::from_static(b"v1")));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_without_mutation() {
        let store = Store::new();
        let policy = BodyPolicy {
            max_bytes: Some(2),
            ..BodyPolicy::default()
        };

        let reply = Command::handle(request(Method::POST, "/k", b"abc"), &store, &policy).await;

        assert_eq!(reply, Reply::PayloadTooLarge);
        assert!(store.is_empty().unwrap());
    }
}
