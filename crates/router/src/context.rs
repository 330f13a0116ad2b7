//! Per request state shared by the dispatcher and the handlers.
//!
//! A [`RequestContext`] owns the buffered request, the path parameters bound
//! by the route trie and the response being built. Query and form values are
//! parsed on first access and cached for the rest of the request.
//!
//! The response status is written at most once: the first call that sets it
//! wins and every later attempt is ignored. Writing body bytes without an
//! explicit status commits `200 OK`. Once the status is committed, response
//! headers are frozen as well.

use crate::auth::{self, AuthCheck};
use crate::body::ResponseBody;
use crate::cookie::{self, Cookie};
use crate::error::{standard_error, ErrorHandler, RouterError};
use crate::multipart::{self, FormFile};
use crate::params::PathParams;
use crate::query::Query;
use crate::template::TemplateEngine;
use bytes::{Bytes, BytesMut};
use http::header::{AsHeaderName, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri, Version};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error};

pub(crate) const APPLICATION_JSON_UTF_8: &str = "application/json; charset=utf-8";

/// Forwarded addresses of this length or longer are not trusted
const MAX_ADDR_LEN: usize = 20;

/// Router level collaborators reachable from a request
#[derive(Clone, Default)]
pub(crate) struct ContextHooks {
    pub(crate) error_handler: Option<ErrorHandler>,
    pub(crate) auth_check: Option<AuthCheck>,
    pub(crate) templates: Option<Arc<dyn TemplateEngine>>,
}

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

#[derive(Debug, Default)]
struct Form {
    values: Query,
    files: HashMap<String, Vec<FormFile>>,
}

pub struct RequestContext {
    parts: Parts,
    body: Bytes,
    params: PathParams,
    query: OnceCell<Query>,
    form: OnceCell<Form>,
    response: ResponseState,
    hooks: ContextHooks,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("params", &self.params)
            .field("status", &self.response.status)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Wraps a request whose body has already been collected
    pub fn from_request(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            body,
            params: PathParams::empty(),
            query: OnceCell::new(),
            form: OnceCell::new(),
            response: ResponseState::default(),
            hooks: ContextHooks::default(),
        }
    }

    pub(crate) fn set_hooks(&mut self, hooks: ContextHooks) {
        self.hooks = hooks;
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    // request side

    #[inline]
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.parts.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Returns the request header `name`, or `""` when absent or not visible ascii
    pub fn header<K: AsHeaderName>(&self, name: K) -> &str {
        self.parts.headers.get(name).and_then(|value| value.to_str().ok()).unwrap_or_default()
    }

    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE)
    }

    /// The raw path of the request uri, e.g. `/search`
    pub fn request_path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Path and query as sent by the client, e.g. `/search?q=rust`
    pub fn request_uri(&self) -> &str {
        self.parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| self.parts.uri.path())
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the json body of a `POST` or `PUT` request
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, RouterError> {
        if self.body.is_empty() {
            return Err(RouterError::EmptyBody);
        }
        if self.parts.method != Method::POST && self.parts.method != Method::PUT {
            return Err(RouterError::InvalidRequestMethod);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// User and password of the `Authorization: Basic` header
    pub fn basic_auth(&self) -> Option<(String, String)> {
        auth::basic_credentials(&self.parts.headers)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        cookie::find(&self.parts.headers, name)
    }

    /// Best effort client address.
    ///
    /// Tries the first `X-Forwarded-For` entry, then `X-Real-Ip`, then the
    /// peer address of the connection. Values of 20 characters or more are
    /// skipped; `""` when nothing qualifies.
    pub fn remote_addr(&self) -> String {
        let forwarded = self.header("x-forwarded-for");
        if !forwarded.is_empty() {
            let first = forwarded.split(',').next().unwrap_or_default().trim();
            if first.len() < MAX_ADDR_LEN {
                return first.to_owned();
            }
        }

        let real_ip = self.header("x-real-ip");
        if !real_ip.is_empty() && real_ip.len() < MAX_ADDR_LEN {
            return real_ip.to_owned();
        }

        match self.parts.extensions.get::<SocketAddr>() {
            Some(peer) => {
                let ip = peer.ip().to_string();
                if ip.len() < MAX_ADDR_LEN { ip } else { String::new() }
            }
            None => String::new(),
        }
    }

    #[inline]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> &str {
        self.params.string(name)
    }

    pub fn param_int(&self, name: &str) -> isize {
        self.params.int(name)
    }

    pub fn param_int64(&self, name: &str) -> i64 {
        self.params.int64(name)
    }

    pub fn param_float(&self, name: &str) -> f64 {
        self.params.float(name)
    }

    pub fn param_bool(&self, name: &str) -> bool {
        self.params.bool(name)
    }

    /// Query string values, parsed once per request
    pub fn query(&self) -> &Query {
        self.query.get_or_init(|| Query::parse(self.parts.uri.query().unwrap_or_default()))
    }

    pub fn query_string(&self, name: &str) -> &str {
        self.query().string(name)
    }

    pub fn query_int(&self, name: &str) -> isize {
        self.query().int(name)
    }

    pub fn query_int64(&self, name: &str) -> i64 {
        self.query().int64(name)
    }

    pub fn query_float(&self, name: &str) -> f64 {
        self.query().float(name)
    }

    pub fn query_bool(&self, name: &str) -> bool {
        self.query().bool(name)
    }

    pub fn has_query_param(&self, name: &str) -> bool {
        self.query().has(name)
    }

    /// Form values, parsed once per request.
    ///
    /// For `POST`, `PUT` and `PATCH` requests with an urlencoded or a
    /// `multipart/form-data` body the body values come first, followed by the
    /// query string values. Multipart file parts are read with [`Self::form_file`].
    pub fn form(&self) -> &Query {
        &self.parsed_form().values
    }

    /// The first file uploaded under `name` in a `multipart/form-data` body
    pub fn form_file(&self, name: &str) -> Option<&FormFile> {
        self.form_files(name).first()
    }

    /// Every file uploaded under `name`, in body order
    pub fn form_files(&self, name: &str) -> &[FormFile] {
        self.parsed_form().files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    fn parsed_form(&self) -> &Form {
        self.form.get_or_init(|| {
            let mut form = Form::default();
            match self.form_body_essence().as_deref() {
                Some("application/x-www-form-urlencoded") => match std::str::from_utf8(&self.body) {
                    Ok(body) => form.values.extend_from(body),
                    Err(e) => debug!(cause = %e, "ignore non utf-8 form body"),
                },
                Some("multipart/form-data") => {
                    if let Some(multipart) = multipart::parse(self.content_type(), self.body.clone()) {
                        for (name, value) in multipart.values {
                            form.values.push(name, value);
                        }
                        form.files = multipart.files;
                    }
                }
                _ => {}
            }
            form.values.extend_from(self.parts.uri.query().unwrap_or_default());
            form
        })
    }

    /// Lowercased media type of a body that may carry form values
    fn form_body_essence(&self) -> Option<String> {
        let method = &self.parts.method;
        if method != Method::POST && method != Method::PUT && method != Method::PATCH {
            return None;
        }
        self.content_type().split(';').next().map(|essence| essence.trim().to_ascii_lowercase())
    }

    pub fn form_value(&self, name: &str) -> &str {
        self.form().string(name)
    }

    pub fn form_value_int(&self, name: &str) -> isize {
        self.form().int(name)
    }

    pub fn form_value_int64(&self, name: &str) -> i64 {
        self.form().int64(name)
    }

    pub fn form_value_float(&self, name: &str) -> f64 {
        self.form().float(name)
    }

    pub fn form_value_bool(&self, name: &str) -> bool {
        self.form().bool(name)
    }

    /// Appends `name=value` to the request `Cookie` header
    pub(crate) fn add_request_cookie(&mut self, name: &str, value: &str) {
        let pair = format!("{name}={value}");
        let cookies = match self.parts.headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}; {pair}"),
            _ => pair,
        };

        match HeaderValue::try_from(cookies) {
            Ok(value) => {
                self.parts.headers.insert(COOKIE, value);
            }
            Err(e) => debug!(cause = %e, cookie = name, "skip unencodable request cookie"),
        }
    }

    pub(crate) fn check_credentials(&self, user: &str, password: &str) -> bool {
        self.hooks.auth_check.as_ref().is_some_and(|check| check(user, password))
    }

    /// Hands `err` to the router error callback, or logs it when none is set
    pub(crate) fn report_error(&self, err: RouterError) {
        match &self.hooks.error_handler {
            Some(handler) => handler(err),
            None => error!(cause = %err, path = self.request_path(), "unhandled request error"),
        }
    }

    // response side

    /// The committed status, `None` until something was written
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.response.status
    }

    #[inline]
    pub fn is_written(&self) -> bool {
        self.response.status.is_some()
    }

    /// Commits the response status, ignored when a status is already committed
    pub fn write_header(&mut self, status: StatusCode) {
        match self.response.status {
            None => self.response.status = Some(status),
            Some(committed) => {
                debug!(committed = committed.as_u16(), ignored = status.as_u16(), "superfluous write_header call")
            }
        }
    }

    /// Replaces the response header `name`
    pub fn set_header<K, V>(&mut self, name: K, value: V)
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.response.headers.insert(name, value);
        }
    }

    /// Adds a value to the response header `name`, keeping previous ones
    pub fn add_header<K, V>(&mut self, name: K, value: V)
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.response.headers.append(name, value);
        }
    }

    fn header_pair<K, V>(&self, name: K, value: V) -> Option<(HeaderName, HeaderValue)>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if self.is_written() {
            debug!("response already committed, header ignored");
            return None;
        }

        let name = match HeaderName::try_from(name) {
            Ok(name) => name,
            Err(e) => {
                let e: http::Error = e.into();
                debug!(cause = %e, "skip invalid header name");
                return None;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => Some((name, value)),
            Err(e) => {
                let e: http::Error = e.into();
                debug!(header = %name, cause = %e, "skip invalid header value");
                None
            }
        }
    }

    pub fn set_content_type(&mut self, value: &str) {
        self.set_header(CONTENT_TYPE, value);
    }

    /// Appends `data` to the response body, committing `200 OK` if no status was set
    pub fn write(&mut self, data: &[u8]) {
        if self.response.status.is_none() {
            self.response.status = Some(StatusCode::OK);
        }
        self.response.body.extend_from_slice(data);
    }

    pub fn write_string(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    /// Writes `value` as a json document.
    ///
    /// Nothing is written when serialization fails.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), RouterError> {
        let json = serde_json::to_vec(value)?;
        self.set_content_type(APPLICATION_JSON_UTF_8);
        self.write(&json);
        Ok(())
    }

    /// Redirects with `302 Found`
    pub fn write_redirect(&mut self, location: &str) {
        self.redirect(StatusCode::FOUND, location);
    }

    /// Redirects with `301 Moved Permanently`
    pub fn write_permanent_redirect(&mut self, location: &str) {
        self.redirect(StatusCode::MOVED_PERMANENTLY, location);
    }

    fn redirect(&mut self, status: StatusCode, location: &str) {
        if self.is_written() {
            debug!(location, "response already committed, redirect ignored");
            return;
        }
        self.set_header(LOCATION, location);
        self.write_header(status);
    }

    /// Answers with the plain text body of [`standard_error`]
    pub fn standard_error(&mut self, code: StatusCode) {
        if self.is_written() {
            debug!(code = code.as_u16(), "response already committed, error ignored");
            return;
        }
        let (status, text) = standard_error(code);
        self.set_content_type(mime::TEXT_PLAIN_UTF_8.as_ref());
        self.write_header(status);
        self.write_string(text);
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) {
        self.add_header(SET_COOKIE, cookie.to_string());
    }

    #[inline]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response.headers
    }

    /// Body bytes written so far
    #[inline]
    pub fn written_body(&self) -> &[u8] {
        &self.response.body
    }

    /// Renders the template `name` into the response body.
    ///
    /// Failures, including a router without template engine, go to the error callback.
    pub fn render(&mut self, name: &str, vars: &serde_json::Value) {
        let rendered = match &self.hooks.templates {
            Some(engine) => engine.render(name, vars).map_err(|e| RouterError::render(name, e)),
            None => Err(RouterError::MissingTemplateEngine),
        };
        self.write_rendered(rendered);
    }

    /// Renders an inline template source into the response body
    pub fn render_str(&mut self, source: &str, vars: &serde_json::Value) {
        let rendered = match &self.hooks.templates {
            Some(engine) => engine.render_str(source, vars).map_err(|e| RouterError::render("<inline>", e)),
            None => Err(RouterError::MissingTemplateEngine),
        };
        self.write_rendered(rendered);
    }

    fn write_rendered(&mut self, rendered: Result<Bytes, RouterError>) {
        match rendered {
            Ok(output) => self.write(&output),
            Err(e) => self.report_error(e),
        }
    }

    /// Builds the response, `200 OK` with an empty body when nothing was written
    pub fn into_response(self) -> Response<ResponseBody> {
        let ResponseState { status, headers, body } = self.response;
        let mut response = Response::new(ResponseBody::once(body.freeze()));
        *response.status_mut() = status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = headers;
        response
    }
}
