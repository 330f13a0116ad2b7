//! Long lived `uid` cookie identifying a browser across requests.

use crate::cookie::Cookie;
use crate::RequestContext;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

pub const UID_COOKIE: &str = "uid";

const UID_LIFETIME: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Produces the opaque value of a freshly issued `uid` cookie
pub type UidGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Random v4 uuid in its 32 digit hex form
pub fn uuid_generator() -> UidGenerator {
    Arc::new(|| Uuid::new_v4().simple().to_string())
}

/// Echoes the request's `uid` cookie or mints a new one.
///
/// The value is made visible to handlers through the request `Cookie` header
/// and sent back with `Set-Cookie`.
pub(crate) fn assign(ctx: &mut RequestContext, generate: &UidGenerator) {
    let uid = match ctx.cookie(UID_COOKIE) {
        Some(uid) => uid.to_owned(),
        None => {
            let uid = generate();
            ctx.add_request_cookie(UID_COOKIE, &uid);
            uid
        }
    };

    let cookie = Cookie::new(UID_COOKIE, uid)
        .path("/")
        .expires(SystemTime::now() + UID_LIFETIME)
        .http_only(true);
    ctx.set_cookie(&cookie);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::{COOKIE, SET_COOKIE};
    use http::Request;

    fn fixed(uid: &'static str) -> UidGenerator {
        Arc::new(move || uid.to_owned())
    }

    #[test]
    fn test_uuid_generator() {
        let generate = uuid_generator();
        let first = generate();
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, generate());
    }

    #[test]
    fn test_mint_uid() {
        let mut ctx = RequestContext::from_request(Request::new(Bytes::new()));
        assign(&mut ctx, &fixed("fresh"));

        assert_eq!(ctx.cookie(UID_COOKIE), Some("fresh"));
        let set_cookie = ctx.response_headers()[SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("uid=fresh; Path=/; Expires="));
        assert!(set_cookie.ends_with("; HttpOnly"));
    }

    #[test]
    fn test_echo_uid() {
        let request = Request::builder().header(COOKIE, "theme=dark; uid=known").body(Bytes::new()).unwrap();
        let mut ctx = RequestContext::from_request(request);
        assign(&mut ctx, &fixed("fresh"));

        assert_eq!(ctx.cookie(UID_COOKIE), Some("known"));
        let set_cookie = ctx.response_headers()[SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("uid=known;"));
    }
}
