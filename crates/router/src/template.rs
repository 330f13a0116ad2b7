use crate::error::BoxError;
use bytes::Bytes;

/// Renders named templates or inline template sources with json variables.
///
/// The router owns at most one engine, used by
/// [`RequestContext::render`](crate::RequestContext::render) and
/// [`RequestContext::render_str`](crate::RequestContext::render_str).
#[cfg_attr(test, mockall::automock)]
pub trait TemplateEngine: Send + Sync {
    fn render(&self, name: &str, vars: &serde_json::Value) -> Result<Bytes, BoxError>;

    fn render_str(&self, source: &str, vars: &serde_json::Value) -> Result<Bytes, BoxError>;
}
