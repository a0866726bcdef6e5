//! plaincache: an in-memory key/value store served over HTTP.
//!
//! The URL path of a request is the key. `GET` fetches, `POST` stores the
//! request body and echoes it, `DELETE` removes. All keys share one
//! reader/writer lock.

pub mod config;
mod error;
pub mod protocol;
pub mod server;
pub mod store;

pub use error::{BoxError, Error, Result};
pub use server::Server;
pub use store::Store;
