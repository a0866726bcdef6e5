use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;

use crate::error::{Error, Result};

/// In-memory key-value store
///
/// Every key shares one reader/writer lock: lookups run concurrently with
/// each other, writes and deletes are exclusive against everything.
pub struct Store {
    data: RwLock<HashMap<String, Bytes>>,
}

impl Store {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Set a key to the given value, replacing any previous value
    pub fn set(&self, key: String, value: Bytes) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Error::LockPoisoned)?;
        data.insert(key, value);
        Ok(())
    }

    /// Get the value for a key
    pub fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let data = self.data.read().map_err(|_| Error::LockPoisoned)?;
        Ok(data.get(key).cloned())
    }

    /// Remove a key, returning whether a value was present
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut data = self.data.write().map_err(|_| Error::LockPoisoned)?;
        Ok(data.remove(key).is_some())
    }

    /// Number of stored keys
    pub fn len(&self) -> Result<usize> {
        let data = self.data.read().map_err(|_| Error::LockPoisoned)?;
        Ok(data.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
