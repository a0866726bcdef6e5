use tracing::error;

use crate::protocol::reply::Reply;
use crate::store::Store;

/// DELETE: drop the value stored under the request path, if any
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCmd {
    pub key: String,
}

impl DeleteCmd {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Execute the DELETE command. An absent key still answers 200.
    pub fn execute(&self, store: &Store) -> Reply {
        match store.delete(&self.key) {
            Ok(_) => Reply::Empty,
            Err(e) => {
                error!("DELETE {} failed: {}", self.key, e);
                Reply::InternalError
            }
        }
    }
}
