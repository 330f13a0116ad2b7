//! A thin HTTP/1.1 listener feeding a [`Router`].
//!
//! ```no_run
//! use micro_router::{Router, Server};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Arc::new(
//!     Server::builder()
//!         .address("127.0.0.1:8080")
//!         .router(Router::new())
//!         .shutdown_timeout(Duration::from_secs(3))
//!         .build()?,
//! );
//!
//! let running = tokio::spawn({
//!     let server = Arc::clone(&server);
//!     async move { server.start().await }
//! });
//!
//! // later
//! server.shutdown().await?;
//! running.await??;
//! # Ok(())
//! # }
//! ```

use crate::body::ResponseBody;
use crate::error::{standard_error_response, RouterError};
use crate::router::Router;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use once_cell::sync::OnceCell;
use std::convert::Infallible;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub struct ServerBuilder {
    router: Option<Router>,
    address: Option<io::Result<Vec<SocketAddr>>>,
    shutdown_timeout: Duration,
    max_body_size: usize,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            router: None,
            address: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(|addrs| addrs.collect()));
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// How long [`Server::shutdown`] waits for in-flight connections, 5 seconds by default
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Largest request body read into memory, 10 MiB by default.
    ///
    /// Larger bodies are answered with `400 Bad Request` before reaching the router.
    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self
            .address
            .ok_or(ServerBuildError::MissingAddress)?
            .map_err(ServerBuildError::invalid_address)?;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }

        let (shutdown, _) = watch::channel(false);
        let (drained, _) = watch::channel(None);
        Ok(Server {
            router: Arc::new(router),
            address,
            shutdown_timeout: self.shutdown_timeout,
            max_body_size: self.max_body_size,
            started: AtomicBool::new(false),
            local_addr: OnceCell::new(),
            shutdown,
            drained,
        })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },
}

impl ServerBuildError {
    fn invalid_address(source: io::Error) -> Self {
        Self::InvalidAddress { source }
    }
}

#[derive(Debug)]
pub struct Server {
    router: Arc<Router>,
    address: Vec<SocketAddr>,
    shutdown_timeout: Duration,
    max_body_size: usize,
    started: AtomicBool,
    local_addr: OnceCell<SocketAddr>,
    shutdown: watch::Sender<bool>,
    // Some(true) once every connection closed in time
    drained: watch::Sender<Option<bool>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The bound address, available once [`Server::start`] is listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Accepts connections until [`Server::shutdown`] is called.
    ///
    /// A server starts only once, later calls fail with
    /// [`RouterError::AlreadyStarted`].
    pub async fn start(&self) -> Result<(), RouterError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RouterError::AlreadyStarted);
        }

        let bound = TcpListener::bind(self.address.as_slice()).await.and_then(|listener| {
            let local_addr = listener.local_addr()?;
            Ok((listener, local_addr))
        });
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                self.drained.send_replace(Some(true));
                return Err(RouterError::bind(e));
            }
        };
        let _ = self.local_addr.set(local_addr);
        info!(%local_addr, "start listening");

        let graceful = GracefulShutdown::new();
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(cause = %e, "failed to accept");
                            continue;
                        }
                    };

                    let router = Arc::clone(&self.router);
                    let max_body_size = self.max_body_size;
                    let service = service_fn(move |request: Request<Incoming>| {
                        let router = Arc::clone(&router);
                        async move { Ok::<_, Infallible>(handle(&router, request, peer, max_body_size).await) }
                    });
                    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                    let connection = graceful.watch(connection);

                    tokio::spawn(async move {
                        if let Err(e) = connection.await {
                            debug!(%peer, cause = %e, "connection closed with error");
                        }
                    });
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        drop(listener);
        info!(timeout = ?self.shutdown_timeout, "stop listening, draining connections");

        let drained = tokio::time::timeout(self.shutdown_timeout, graceful.shutdown()).await.is_ok();
        if !drained {
            warn!(timeout = ?self.shutdown_timeout, "connections still active after shutdown timeout");
        }
        self.drained.send_replace(Some(drained));
        Ok(())
    }

    /// Stops accepting connections and waits for in-flight ones.
    ///
    /// A drain exceeding the shutdown timeout is returned as
    /// [`RouterError::ShutdownTimeout`] and also passed to the router error
    /// callback. Does nothing on a server that was never started.
    pub async fn shutdown(&self) -> Result<(), RouterError> {
        if !self.started.load(Ordering::Acquire) {
            return Ok(());
        }

        self.shutdown.send_replace(true);

        let mut drained = self.drained.subscribe();
        let completed = drained.wait_for(Option::is_some).await.map(|outcome| *outcome == Some(true)).unwrap_or(false);
        if completed {
            info!("server stopped");
            return Ok(());
        }

        let timeout = self.shutdown_timeout;
        self.router.report_error(RouterError::ShutdownTimeout { timeout });
        Err(RouterError::ShutdownTimeout { timeout })
    }
}

async fn handle(
    router: &Router,
    request: Request<Incoming>,
    peer: SocketAddr,
    max_body_size: usize,
) -> Response<ResponseBody> {
    let (mut parts, body) = request.into_parts();
    let body: Bytes = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(%peer, cause = %e, "read request body error");
            return standard_error_response(StatusCode::BAD_REQUEST);
        }
    };

    parts.extensions.insert(peer);
    router.dispatch(Request::from_parts(parts, body)).await
}
