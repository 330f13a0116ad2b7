use crate::body::ResponseBody;
use http::{HeaderValue, Response, StatusCode};
use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error type returned by the pluggable collaborators (template engine, rpc processor)
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Callback receiving handler faults and failures the dispatcher can't answer itself
pub type ErrorHandler = Arc<dyn Fn(RouterError) + Send + Sync>;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("handler panicked: {message}")]
    Panic { message: String },

    #[error("render template '{name}' error: {source}")]
    Render { name: String, source: BoxError },

    #[error("no template engine configured")]
    MissingTemplateEngine,

    #[error("empty body")]
    EmptyBody,

    #[error("invalid request method")]
    InvalidRequestMethod,

    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("bind server error: {source}")]
    Bind { source: io::Error },

    #[error("server already started")]
    AlreadyStarted,

    #[error("shutdown timed out after {timeout:?}, connections still active")]
    ShutdownTimeout { timeout: Duration },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl RouterError {
    pub fn panic<S: ToString>(message: S) -> Self {
        Self::Panic { message: message.to_string() }
    }

    pub fn render<S: ToString>(name: S, source: BoxError) -> Self {
        Self::Render { name: name.to_string(), source }
    }

    pub fn bind(source: io::Error) -> Self {
        Self::Bind { source }
    }
}

/// Resolves the status and the one line plain text body sent to clients.
///
/// Only 400, 401, 403, 404, 405, 409, 429 and 500 have a body of their own,
/// any other code is replaced by 500 in both status and body.
pub fn standard_error(code: StatusCode) -> (StatusCode, &'static str) {
    let text = match code.as_u16() {
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        403 => "403 Forbidden",
        404 => "404 Not Found",
        405 => "405 Method Not Allowed",
        409 => "409 Conflict",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        _ => return standard_error(StatusCode::INTERNAL_SERVER_ERROR),
    };
    (code, text)
}

/// Builds a complete response carrying a [`standard_error`] body
pub fn standard_error_response(code: StatusCode) -> Response<ResponseBody> {
    let (status, text) = standard_error(code);
    let mut response = Response::new(ResponseBody::from(text));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
