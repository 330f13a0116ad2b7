//! Request handlers invoked by the dispatcher.
//!
//! A handler receives the [`RequestContext`] of the request and writes its
//! response through it. Implement [`RequestHandler`] directly, or wrap a
//! closure returning a boxed future with [`handler_fn`]:
//!
//! ```
//! use micro_router::{handler_fn, Router};
//!
//! let mut router = Router::new();
//! router.get(
//!     "/user/:name",
//!     handler_fn(|ctx| {
//!         Box::pin(async move {
//!             let greeting = format!("Hello, {}!", ctx.param("name"));
//!             ctx.write_string(&greeting);
//!         })
//!     }),
//! );
//! ```

use crate::RequestContext;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: &mut RequestContext);
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    async fn invoke(&self, ctx: &mut RequestContext) {
        (**self).invoke(ctx).await;
    }
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn invoke(&self, ctx: &mut RequestContext) {
        (**self).invoke(ctx).await;
    }
}

/// A closure holder which represents an async handler function
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'c> Fn(&'c mut RequestContext) -> BoxFuture<'c, ()> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait]
impl<F> RequestHandler for FnHandler<F>
where
    F: for<'c> Fn(&'c mut RequestContext) -> BoxFuture<'c, ()> + Send + Sync,
{
    async fn invoke(&self, ctx: &mut RequestContext) {
        (self.f)(ctx).await;
    }
}
