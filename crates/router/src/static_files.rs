//! Serving of single files and of directories mounted under a path prefix.

use crate::path::unescape;
use crate::RequestContext;
use http::header::LAST_MODIFIED;
use http::StatusCode;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.html";

/// Ensures a non root prefix ends with `/`, so `/static` never matches `/statics`
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') { prefix.to_owned() } else { format!("{prefix}/") }
}

/// A directory served under a request path prefix
#[derive(Debug, Clone)]
pub(crate) struct StaticDir {
    prefix: String,
    root: PathBuf,
}

impl StaticDir {
    pub(crate) fn new(prefix: &str, root: impl Into<PathBuf>) -> Self {
        Self { prefix: normalize_prefix(prefix), root: root.into() }
    }

    #[inline]
    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    #[inline]
    pub(crate) fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    pub(crate) async fn serve(&self, ctx: &mut RequestContext) {
        let relative = match self.resolve(ctx.request_path()) {
            Ok(relative) => relative,
            Err(status) => {
                ctx.standard_error(status);
                return;
            }
        };

        let mut path = self.root.join(relative);
        if tokio::fs::metadata(&path).await.is_ok_and(|meta| meta.is_dir()) {
            path.push(INDEX_FILE);
        }
        serve_file(ctx, &path).await;
    }

    /// Strips the prefix and decodes the rest, refusing any `..` component
    fn resolve(&self, request_path: &str) -> Result<PathBuf, StatusCode> {
        let rest = request_path.strip_prefix(&self.prefix).unwrap_or_default();
        let decoded = unescape(rest).ok_or(StatusCode::BAD_REQUEST)?;

        let mut relative = PathBuf::new();
        for component in Path::new(&*decoded).components() {
            match component {
                Component::Normal(name) => relative.push(name),
                Component::ParentDir => {
                    debug!(path = request_path, "refuse directory traversal");
                    return Err(StatusCode::FORBIDDEN);
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        Ok(relative)
    }
}

/// Writes the content of `path` as the response
pub(crate) async fn serve_file(ctx: &mut RequestContext, path: &Path) {
    let (content, modified) = match read(path).await {
        Ok(read) => read,
        Err(e) => {
            let status = match e.kind() {
                io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
                io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                _ => {
                    warn!(path = %path.display(), cause = %e, "read static file error");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            ctx.standard_error(status);
            return;
        }
    };

    ctx.set_content_type(content_type(path));
    if let Some(modified) = modified {
        ctx.set_header(LAST_MODIFIED, httpdate::fmt_http_date(modified));
    }
    ctx.write_header(StatusCode::OK);
    ctx.write(&content);
}

async fn read(path: &Path) -> io::Result<(Vec<u8>, Option<std::time::SystemTime>)> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.is_dir() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "directory without index"));
    }
    let content = tokio::fs::read(path).await?;
    Ok((content, meta.modified().ok()))
}

fn content_type(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
