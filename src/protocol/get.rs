use tracing::error;

use crate::protocol::reply::Reply;
use crate::store::Store;

/// GET: fetch the value stored under the request path
#[derive(Debug, Clone, PartialEq)]
pub struct GetCmd {
    pub key: String,
}

impl GetCmd {
    /// Create a new GET command
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Execute the GET command
    pub fn execute(&self, store: &Store) -> Reply {
        match store.get(&self.key) {
            Ok(Some(value)) => Reply::Value(value),
            Ok(None) => Reply::NotFound,
            Err(e) => {
                error!("GET {} failed: {}", self.key, e);
                Reply::InternalError
            }
        }
    }
}
