use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio_io_timeout::TimeoutStream;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{BodyPolicy, Command};
use crate::store::Store;

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

// errno values for "too many open files" (process and system wide)
const EMFILE: i32 = 24;
const ENFILE: i32 = 23;

/// Accept errors that clear up on their own; the loop retries after a delay
fn is_transient_accept_error(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => true,
        _ => matches!(e.raw_os_error(), Some(EMFILE) | Some(ENFILE)),
    }
}

/// Retry delay after transient accept errors: doubles from 5ms up to 1s
#[derive(Debug, Default)]
struct AcceptBackoff {
    delay: Option<Duration>,
}

impl AcceptBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = self
            .delay
            .map_or(ACCEPT_BACKOFF_MIN, |d| (d * 2).min(ACCEPT_BACKOFF_MAX));
        self.delay = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.delay = None;
    }
}

/// HTTP server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<Store>,
    body_policy: BodyPolicy,
    write_timeout: Duration,
}

impl Server {
    /// Create and bind the server with a fresh, empty store
    pub async fn bind(config: Config) -> Result<Self> {
        Self::with_store(config, Arc::new(Store::new())).await
    }

    /// Create and bind the server around an existing store
    pub async fn with_store(config: Config, store: Arc<Store>) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: config.listen_addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: config.listen_addr,
            source,
        })?;
        info!("HTTP server bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            store,
            body_policy: config.body,
            write_timeout: config.write_timeout,
        })
    }

    /// Get local listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the store served by this server
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Answer a single request
    async fn handle_request(
        self: Arc<Self>,
        request: Request<Incoming>,
        peer_addr: SocketAddr,
    ) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let reply = Command::handle(request, &self.store, &self.body_policy).await;
        debug!("{} {} -> {} ({})", method, path, reply.status(), peer_addr);

        Ok(reply.into_response())
    }

    /// Handle a single client connection
    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> hyper::Result<()> {
        let read_timeout = self.body_policy.read_timeout;

        // A write that makes no progress for `write_timeout` fails the connection
        let mut stream = TimeoutStream::new(stream);
        stream.set_write_timeout(Some(self.write_timeout));
        let io = TokioIo::new(Box::pin(stream));
        let service =
            service_fn(move |request| Arc::clone(&self).handle_request(request, peer_addr));

        http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(read_timeout)
            .serve_connection(io, service)
            .await
    }

    /// Start server, accept and process connections
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accept and process connections until `shutdown` completes.
    ///
    /// Connections already accepted keep running on their own tasks.
    /// Transient accept errors are retried with backoff; any other accept
    /// error stops the loop and is returned.
    pub async fn run_until<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Server started, listening on {}", self.local_addr);
        tokio::pin!(shutdown);
        let mut backoff = AcceptBackoff::default();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        backoff.reset();
                        debug!("New connection accepted from {}", peer_addr);

                        // Clone the Arc<Server> for the new connection
                        let server = Arc::clone(&self);

                        // Spawn an independent task for each connection
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                warn!("Error serving connection from {}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        let delay = backoff.next_delay();
                        warn!("Failed to accept connection: {}; retrying in {:?}", e, delay);
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        return Err(Error::Accept(e));
                    }
                },
            }
        }
    }

    /// Run until the process receives Ctrl-C
    pub async fn run_until_ctrl_c(self: Arc<Self>) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl-C handler: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> Config {
        Config::new("127.0.0.1:0".parse().unwrap())
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind(local_config()).await.unwrap();
        assert!(server.local_addr().ip().is_loopback());
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_bind_address_in_use() {
        let first = Server::bind(local_config()).await.unwrap();
        let err = Server::bind(Config::new(first.local_addr()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Bind { .. }));
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let server = Arc::new(Server::bind(local_config()).await.unwrap());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(server.run_until(async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_transient_accept_errors() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
        ] {
            assert!(is_transient_accept_error(&io::Error::from(kind)), "{:?}", kind);
        }
        assert!(is_transient_accept_error(&io::Error::from_raw_os_error(EMFILE)));
        assert!(is_transient_accept_error(&io::Error::from_raw_os_error(ENFILE)));
    }

    #[test]
    fn test_fatal_accept_errors() {
        assert!(!is_transient_accept_error(&io::Error::from(
            io::ErrorKind::InvalidInput
        )));
        assert!(!is_transient_accept_error(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
    }

    #[test]
    fn test_accept_backoff_doubles_up_to_cap() {
        let mut backoff = AcceptBackoff::default();
        let delays: Vec<_> = (0..10).map(|_| backoff.next_delay()).collect();

        assert_eq!(delays[0], Duration::from_millis(5));
        assert_eq!(delays[1], Duration::from_millis(10));
        assert_eq!(delays[7], Duration::from_millis(640));
        assert_eq!(delays[8], Duration::from_secs(1));
        assert_eq!(delays[9], Duration::from_secs(1));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
    }
}
