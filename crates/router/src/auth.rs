//! HTTP Basic authentication for routes registered with auth.

use crate::handler::RequestHandler;
use crate::RequestContext;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderMap, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Predicate deciding whether a user and password pair is accepted
pub type AuthCheck = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

pub(crate) const CHALLENGE: &str = r#"Basic realm="Enter your login and password""#;

/// Decodes the `Authorization: Basic ...` credentials of a request
pub(crate) fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_owned(), password.to_owned()))
}

/// Runs the wrapped handler only when the request carries accepted credentials.
///
/// Otherwise answers `401` with a `WWW-Authenticate` challenge.
#[derive(Debug)]
pub struct AuthHandler<H> {
    inner: H,
}

impl<H> AuthHandler<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: RequestHandler> RequestHandler for AuthHandler<H> {
    async fn invoke(&self, ctx: &mut RequestContext) {
        let accepted = match ctx.basic_auth() {
            Some((user, password)) => ctx.check_credentials(&user, &password),
            None => false,
        };

        if accepted {
            self.inner.invoke(ctx).await;
            return;
        }

        debug!(path = ctx.request_path(), "reject unauthenticated request");
        ctx.set_header(WWW_AUTHENTICATE, CHALLENGE);
        ctx.standard_error(StatusCode::UNAUTHORIZED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_basic_credentials() {
        let mut headers = HeaderMap::new();
        assert_eq!(basic_credentials(&headers), None);

        // admin:secret
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic YWRtaW46c2VjcmV0"));
        assert_eq!(basic_credentials(&headers), Some(("admin".into(), "secret".into())));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("basic YWRtaW46c2VjcmV0"));
        assert_eq!(basic_credentials(&headers), Some(("admin".into(), "secret".into())));

        // password may contain ':'
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic YTpiOmM="));
        assert_eq!(basic_credentials(&headers), Some(("a".into(), "b:c".into())));
    }

    #[test]
    fn test_malformed_credentials() {
        let mut headers = HeaderMap::new();

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer YWRtaW46c2VjcmV0"));
        assert_eq!(basic_credentials(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert_eq!(basic_credentials(&headers), None);

        // no ':' separator
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic YWRtaW4="));
        assert_eq!(basic_credentials(&headers), None);
    }
}
