use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::error::Result;
use crate::protocol::BodyPolicy;

pub mod address;

/// Default deadline for a response write that makes no progress
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Command line arguments
#[derive(Parser, Debug, Clone)]
#[command(version, about = "In-memory key/value store served over HTTP", long_about = None)]
pub struct Cli {
    /// Address to listen on, e.g. :8080, 127.0.0.1:8080 or [::1]:http
    pub address: String,

    /// Seconds allowed for reading request headers and a POST body
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub read_timeout: u64,

    /// Seconds a response write may stall before the connection is dropped
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub write_timeout: u64,

    /// Reject POST bodies larger than this many bytes (unbounded if unset)
    #[arg(long, value_name = "N")]
    pub max_body_bytes: Option<usize>,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Resolved address the listener binds to
    pub listen_addr: SocketAddr,
    /// Limits for buffering request bodies
    pub body: BodyPolicy,
    /// Deadline for a stalled response write
    pub write_timeout: Duration,
}

impl Config {
    /// Configuration with default limits
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            body: BodyPolicy::default(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Build configuration from parsed arguments, resolving the address
    pub async fn from_cli(cli: &Cli) -> Result<Self> {
        let listen_addr = address::resolve(&cli.address).await?;

        Ok(Self {
            listen_addr,
            body: BodyPolicy {
                read_timeout: Duration::from_secs(cli.read_timeout),
                max_bytes: cli.max_body_bytes,
            },
            write_timeout: Duration::from_secs(cli.write_timeout),
        })
    }
}

/// Usage text printed when the listen address is missing or invalid
pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n\
         {program} server_address\n\
         \n\
         Example:\n\
         {program} :8080\n\
         {program} 127.0.0.1:8080\n\
         {program} [::1]:http\n"
    )
}
