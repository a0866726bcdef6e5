//! HTTP request handling
//!
//! Maps a request method onto one of the store operations (GET, POST,
//! DELETE) and renders the outcome as a plain-text HTTP response.

pub mod command;
pub mod delete;
pub mod get;
pub mod reply;
pub mod set;

pub use command::Command;
pub use reply::Reply;
pub use set::{BodyPolicy, DEFAULT_READ_TIMEOUT};
