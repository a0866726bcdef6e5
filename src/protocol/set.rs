use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use tokio::time::timeout;
use tracing::error;

use crate::error::{BoxError, Error, Result};
use crate::protocol::reply::Reply;
use crate::store::Store;

/// Default deadline for receiving a complete request body
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Limits applied while buffering a POST body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyPolicy {
    pub read_timeout: Duration,
    /// `None` buffers bodies of any size
    pub max_bytes: Option<usize>,
}

impl Default for BodyPolicy {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_bytes: None,
        }
    }
}

/// Buffer the whole body into memory, bounded by `policy`
pub async fn read_body<B>(body: B, policy: &BodyPolicy) -> Result<Bytes>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let limit = policy.max_bytes.unwrap_or(usize::MAX);
    let collected = timeout(policy.read_timeout, Limited::new(body, limit).collect())
        .await
        .map_err(|_| Error::ReadTimeout(policy.read_timeout))?;

    match collected {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(Error::BodyTooLarge { limit }),
        Err(e) => Err(Error::ReadBody(e)),
    }
}

/// POST: store the buffered body under the request path and echo it back
#[derive(Debug, Clone, PartialEq)]
pub struct SetCmd {
    pub key: String,
    pub value: Bytes,
}

impl SetCmd {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Execute the SET command
    pub fn execute(&self, store: &Store) -> Reply {
        match store.set(self.key.clone(), self.value.clone()) {
            Ok(()) => Reply::Value(self.value.clone()),
            Err(e) => {
                error!("POST {} failed: {}", self.key, e);
                Reply::InternalError
            }
        }
    }
}
