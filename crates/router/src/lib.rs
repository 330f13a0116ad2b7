//! An embeddable HTTP router.
//!
//! Routes are kept in a per method trie of path segments supporting literal,
//! `:name` parameter and trailing `*` wildcard segments. Each request runs
//! through a fixed pipeline: exact file routes, static directories, the `uid`
//! session cookie, `GET` redirects, then the matched handler with panic
//! recovery, followed by access logging.
//!
//! ```
//! use http::{Method, Request, StatusCode};
//! use micro_router::{handler_fn, Router};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut router = Router::new();
//! router.register(
//!     Method::GET,
//!     "/files/*",
//!     handler_fn(|ctx| {
//!         Box::pin(async move {
//!             let tail = ctx.param("*").to_owned();
//!             ctx.write_string(&tail);
//!         })
//!     }),
//! );
//!
//! let request = Request::get("/files/docs/readme.md").body(bytes::Bytes::new()).unwrap();
//! let response = router.dispatch(request).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! # }
//! ```
//!
//! A parameter or wildcard segment always wins over a literal segment at the
//! same position: once `/user/:name` is registered, `/user/admin` is never
//! reached.

mod auth;
mod body;
mod context;
mod convert;
mod cookie;
mod error;
mod handler;
mod log;
mod multipart;
mod params;
mod query;
mod router;
mod rpc;
mod server;
mod session;
mod static_files;
mod template;

pub mod path;
pub mod trie;

pub use auth::AuthCheck;
pub use auth::AuthHandler;
pub use body::ResponseBody;
pub use context::RequestContext;
pub use cookie::Cookie;
pub use error::standard_error;
pub use error::standard_error_response;
pub use error::BoxError;
pub use error::ErrorHandler;
pub use error::RouterError;
pub use handler::handler_fn;
pub use handler::FnHandler;
pub use handler::RequestHandler;
pub use log::tracing_logger;
pub use log::LogRecord;
pub use log::Logger;
pub use log::LongQueryHandler;
pub use multipart::FormFile;
pub use params::PathParams;
pub use query::Query;
pub use router::Router;
pub use rpc::RpcProcessor;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;
pub use session::uuid_generator;
pub use session::UidGenerator;
pub use session::UID_COOKIE;
pub use template::TemplateEngine;
