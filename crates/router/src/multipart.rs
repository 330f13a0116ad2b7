//! `multipart/form-data` request bodies.
//!
//! The body is already buffered when a handler runs, so the multipart stream
//! is fed from a single ready chunk and every read completes on first poll.

use bytes::Bytes;
use futures::stream;
use futures::FutureExt;
use std::collections::HashMap;
use std::io;
use tracing::debug;

/// A file part of a `multipart/form-data` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

impl FormFile {
    /// The file name sent by the client, as is
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct MultipartForm {
    /// Text fields in body order
    pub(crate) values: Vec<(String, String)>,
    pub(crate) files: HashMap<String, Vec<FormFile>>,
}

/// Parses a buffered `multipart/form-data` body.
///
/// Returns `None` when `content_type` carries no boundary or the body is malformed.
pub(crate) fn parse(content_type: &str, body: Bytes) -> Option<MultipartForm> {
    let boundary = match multer::parse_boundary(content_type) {
        Ok(boundary) => boundary,
        Err(e) => {
            debug!(cause = %e, "ignore multipart body without boundary");
            return None;
        }
    };

    let chunks = stream::once(async move { Ok::<_, io::Error>(body) });
    match read_fields(multer::Multipart::new(chunks, boundary)).now_or_never() {
        Some(Ok(form)) => Some(form),
        Some(Err(e)) => {
            debug!(cause = %e, "ignore malformed multipart body");
            None
        }
        None => {
            debug!("multipart body is not fully buffered");
            None
        }
    }
}

async fn read_fields(mut multipart: multer::Multipart<'static>) -> Result<MultipartForm, multer::Error> {
    let mut form = MultipartForm::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };

        match field.file_name().map(String::from) {
            Some(file_name) => {
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await?;
                form.files.entry(name).or_default().push(FormFile { file_name, content_type, data });
            }
            None => {
                let value = field.text().await?;
                form.values.push((name, value));
            }
        }
    }
    Ok(form)
}
