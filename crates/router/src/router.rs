//! The router: route registration and the per request dispatch pipeline.
//!
//! Every request goes through the same ordered stages, the first stage that
//! answers ends the pipeline:
//!
//! 1. a file registered for the exact request path
//! 2. a static directory whose prefix starts the request path
//! 3. `uid` session cookie assignment, when enabled
//! 4. the redirect table, for `GET` requests only
//! 5. the route trie, with panics of the handler caught
//!
//! The access logger and the long query hook run after any of them.

use crate::auth::{AuthCheck, AuthHandler};
use crate::body::ResponseBody;
use crate::context::{ContextHooks, RequestContext};
use crate::error::RouterError;
use crate::handler::RequestHandler;
use crate::log::{LogRecord, Logger, LongQueryHandler};
use crate::rpc::{JsonRpcHandler, RpcProcessor};
use crate::session::{self, UID_COOKIE, UidGenerator};
use crate::static_files::{self, StaticDir};
use crate::template::TemplateEngine;
use crate::trie::{RouteMatch, RouteTrie};
use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use http::header::{REFERER, USER_AGENT};
use http::{Method, Request, Response, StatusCode};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

type BoxedHandler = Arc<dyn RequestHandler>;

/// Answers with one of the fixed plain text error bodies
#[derive(Debug, Clone, Copy)]
struct StandardErrorHandler(StatusCode);

#[async_trait]
impl RequestHandler for StandardErrorHandler {
    async fn invoke(&self, ctx: &mut RequestContext) {
        ctx.standard_error(self.0);
    }
}

pub struct Router {
    routes: RouteTrie<BoxedHandler>,
    redirects: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
    // longest prefix first
    statics: Vec<StaticDir>,
    not_found: BoxedHandler,
    bad_request: BoxedHandler,
    internal_error: BoxedHandler,
    options: Option<BoxedHandler>,
    logger: Option<Logger>,
    long_query: Option<(Duration, LongQueryHandler)>,
    need_uid: bool,
    uid_generator: UidGenerator,
    hooks: ContextHooks,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("redirects", &self.redirects)
            .field("files", &self.files)
            .field("statics", &self.statics)
            .field("need_uid", &self.need_uid)
            .finish_non_exhaustive()
    }
}

macro_rules! method_register {
    ($method:ident, $method_const:ident) => {
        #[doc = concat!("Registers `handler` for `", stringify!($method_const), "` requests on `path`")]
        pub fn $method<H: RequestHandler + 'static>(&mut self, path: &str, handler: H) -> &mut Self {
            self.register(Method::$method_const, path, handler)
        }
    };
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: RouteTrie::new(),
            redirects: HashMap::new(),
            files: HashMap::new(),
            statics: Vec::new(),
            not_found: Arc::new(StandardErrorHandler(StatusCode::NOT_FOUND)),
            bad_request: Arc::new(StandardErrorHandler(StatusCode::BAD_REQUEST)),
            internal_error: Arc::new(StandardErrorHandler(StatusCode::INTERNAL_SERVER_ERROR)),
            options: None,
            logger: None,
            long_query: None,
            need_uid: false,
            uid_generator: session::uuid_generator(),
            hooks: ContextHooks::default(),
        }
    }

    /// Registers `handler` for `method` and `path`.
    ///
    /// `:name` segments bind a path parameter, a final `*` segment captures
    /// the rest of the path. Registering the same route again replaces its
    /// handler, and a path not starting with `/` is ignored.
    pub fn register<H: RequestHandler + 'static>(&mut self, method: Method, path: &str, handler: H) -> &mut Self {
        debug!(%method, path, "register route");
        self.routes.insert(method, path, Arc::new(handler));
        self
    }

    /// Registers a route only reachable with HTTP Basic credentials accepted by the auth check
    pub fn register_auth<H: RequestHandler + 'static>(&mut self, method: Method, path: &str, handler: H) -> &mut Self {
        self.register(method, path, AuthHandler::new(handler))
    }

    method_register!(get, GET);
    method_register!(post, POST);
    method_register!(put, PUT);
    method_register!(delete, DELETE);
    method_register!(patch, PATCH);
    method_register!(head, HEAD);
    method_register!(options, OPTIONS);

    /// Redirects `GET` requests for exactly `from` to `to` with `302 Found`
    pub fn register_redirect(&mut self, from: &str, to: &str) -> &mut Self {
        self.redirects.insert(from.to_owned(), to.to_owned());
        self
    }

    /// Serves the files under `dir` for every request path starting with `prefix`.
    ///
    /// When several prefixes match, the longest one is used.
    pub fn register_static(&mut self, prefix: &str, dir: impl Into<PathBuf>) -> &mut Self {
        let dir = StaticDir::new(prefix, dir);
        self.statics.retain(|existing| existing.prefix() != dir.prefix());
        self.statics.push(dir);
        self.statics.sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));
        self
    }

    /// Serves the file `filename` for requests of exactly `path`
    pub fn register_file(&mut self, path: &str, filename: impl Into<PathBuf>) -> &mut Self {
        self.files.insert(path.to_owned(), filename.into());
        self
    }

    /// Hands the body of `POST` requests on `url` to `processor`
    pub fn register_json_rpc<P: RpcProcessor + 'static>(&mut self, url: &str, processor: P) -> &mut Self {
        self.register(Method::POST, url, JsonRpcHandler::new(processor))
    }

    pub fn set_not_found_handler<H: RequestHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.not_found = Arc::new(handler);
        self
    }

    pub fn set_bad_request_handler<H: RequestHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.bad_request = Arc::new(handler);
        self
    }

    /// Handler answering requests whose handler panicked before writing anything
    pub fn set_internal_error_handler<H: RequestHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.internal_error = Arc::new(handler);
        self
    }

    /// Handler answering unrouted `OPTIONS` requests instead of the not found handler
    pub fn set_options_handler<H: RequestHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.options = Some(Arc::new(handler));
        self
    }

    pub fn set_logger<F>(&mut self, logger: F) -> &mut Self
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Calls `handler` after every request that took longer than `threshold`
    pub fn set_long_query_handler<F>(&mut self, threshold: Duration, handler: F) -> &mut Self
    where
        F: Fn(Duration, &RequestContext) + Send + Sync + 'static,
    {
        let handler: LongQueryHandler = Arc::new(handler);
        self.long_query = Some((threshold, handler));
        self
    }

    pub fn set_error_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(RouterError) + Send + Sync + 'static,
    {
        self.hooks.error_handler = Some(Arc::new(handler));
        self
    }

    /// Predicate for routes registered with [`Router::register_auth`], which reject everyone until it is set
    pub fn set_auth_check<F>(&mut self, check: F) -> &mut Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        let check: AuthCheck = Arc::new(check);
        self.hooks.auth_check = Some(check);
        self
    }

    /// Enables the `uid` session cookie
    pub fn set_uid(&mut self, enable: bool) -> &mut Self {
        self.need_uid = enable;
        self
    }

    pub fn set_uid_generator<F>(&mut self, generator: F) -> &mut Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.uid_generator = Arc::new(generator);
        self
    }

    pub fn set_template_engine<T: TemplateEngine + 'static>(&mut self, engine: T) -> &mut Self {
        self.hooks.templates = Some(Arc::new(engine));
        self
    }

    pub(crate) fn report_error(&self, err: RouterError) {
        match &self.hooks.error_handler {
            Some(handler) => handler(err),
            None => error!(cause = %err, "unhandled router error"),
        }
    }

    /// Runs `request` through the pipeline and returns the response.
    ///
    /// Never fails: every request ends with a response, a panicking handler
    /// included.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<ResponseBody> {
        let started = Instant::now();

        let mut ctx = RequestContext::from_request(request);
        ctx.set_hooks(self.hooks.clone());

        self.serve(&mut ctx).await;

        self.instrument(&ctx, started.elapsed());
        ctx.into_response()
    }

    async fn serve(&self, ctx: &mut RequestContext) {
        if let Some(file) = self.files.get(ctx.request_path()) {
            static_files::serve_file(ctx, file).await;
            return;
        }

        if let Some(dir) = self.statics.iter().find(|dir| dir.matches(ctx.request_path())) {
            dir.serve(ctx).await;
            return;
        }

        if self.need_uid {
            session::assign(ctx, &self.uid_generator);
        }

        if ctx.method() == Method::GET
            && let Some(location) = self.redirects.get(ctx.request_path())
        {
            ctx.write_redirect(location);
            return;
        }

        if let Err(payload) = AssertUnwindSafe(self.route(ctx)).catch_unwind().await {
            self.recover(ctx, payload).await;
        }
    }

    async fn route(&self, ctx: &mut RequestContext) {
        match self.routes.find(ctx.method(), ctx.request_path()) {
            RouteMatch::Found { handler, params } => {
                ctx.set_params(params);
                handler.invoke(ctx).await;
            }
            RouteMatch::InvalidPath => {
                warn!(path = ctx.request_path(), "unparseable request path");
                self.bad_request.invoke(ctx).await;
            }
            RouteMatch::MethodNotFound | RouteMatch::NotFound => {
                debug!(method = %ctx.method(), path = ctx.request_path(), "no route matched");
                self.options_or_not_found(ctx).await;
            }
        }
    }

    async fn options_or_not_found(&self, ctx: &mut RequestContext) {
        match &self.options {
            Some(options) if ctx.method() == Method::OPTIONS => options.invoke(ctx).await,
            _ => self.not_found.invoke(ctx).await,
        }
    }

    async fn recover(&self, ctx: &mut RequestContext, payload: Box<dyn Any + Send>) {
        let message = panic_message(payload.as_ref());
        drop(payload);
        error!(method = %ctx.method(), path = ctx.request_path(), panic = %message, "request handler panicked");

        if !ctx.is_written() && AssertUnwindSafe(self.internal_error.invoke(ctx)).catch_unwind().await.is_err() {
            ctx.standard_error(StatusCode::INTERNAL_SERVER_ERROR);
        }

        if let Some(handler) = &self.hooks.error_handler {
            handler(RouterError::panic(message));
        }
    }

    fn instrument(&self, ctx: &RequestContext, elapsed: Duration) {
        if let Some(logger) = &self.logger {
            let record = LogRecord {
                method: ctx.method().to_string(),
                addr: ctx.remote_addr(),
                auth: ctx.basic_auth().map_or_else(|| "-".to_owned(), |(user, _)| user),
                request_uri: ctx.request_uri().to_owned(),
                status: ctx.status().unwrap_or(StatusCode::OK).as_u16(),
                seconds: elapsed.as_secs_f64(),
                referer: ctx.header(REFERER).to_owned(),
                user_agent: ctx.header(USER_AGENT).to_owned(),
                uid: ctx.cookie(UID_COOKIE).unwrap_or_default().to_owned(),
            };
            logger(&record);
        }

        if let Some((threshold, handler)) = &self.long_query
            && *threshold < elapsed
        {
            handler(elapsed, ctx);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
