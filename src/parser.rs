//! Streaming xForm parser
//!
//! A single pass over the form bytes extracts the metadata needed for the
//! form list while every byte read from the source is fed into an md5 context:
//!
//! - **Path tracking**: a [`PathCursor`] records the open element names from
//!   the root, without building a tree
//! - **Extraction**: `id`/`version` come from the first element directly under
//!   the instance path, the name from the text at the name path
//! - **Media detection**: any text node matching the media pattern flags the
//!   form as having attachments
//! - **Hashing**: [`HashingReader`] sits below the tokenizer, so the digest
//!   covers the untouched byte stream

use quick_xml::Reader;
use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, BufReader, ReadBuf};
use tracing::debug;

use crate::config::{FormListConfig, fill_form_id};
use crate::error::{FormListError, Result};
use crate::source::FormStream;

/// Name used when the title element is present but empty, or missing
pub const UNNAMED_FORM: &str = "Unnamed Form";

pub const HASH_ALGORITHM: &str = "md5";

/// Slash-delimited path of the currently open elements, e.g. `/h:html/h:head`.
///
/// Closing an element strips a matching trailing segment (ASCII
/// case-insensitive) and leaves the path alone otherwise. This is not a stack:
/// a close tag that does not match the innermost open element is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathCursor {
    path: String,
}

impl PathCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_at(&self, path: &str) -> bool {
        self.path == path
    }

    pub fn enter(&mut self, name: &str) {
        self.path.push('/');
        self.path.push_str(name);
    }

    pub fn leave(&mut self, name: &str) {
        let segment_len = name.len() + 1;
        if self.path.len() < segment_len {
            return;
        }

        let start = self.path.len() - segment_len;
        if !self.path.is_char_boundary(start) {
            return;
        }

        let tail = &self.path[start..];
        if tail.starts_with('/') && tail[1..].eq_ignore_ascii_case(name) {
            self.path.truncate(start);
        }
    }
}

/// Which of the name and the form id the document supplied first.
///
/// The form list repeats that order, so `h:title` ahead of the instance
/// renders `name` ahead of `formId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrder {
    NameFirst,
    FormIdFirst,
}

/// Metadata for one form, as listed in the form list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMetadata {
    pub field_order: FieldOrder,
    pub form_id: String,
    pub version: Option<String>,
    pub name: String,
    /// `md5:<hex digest>` of the raw form bytes
    pub hash: String,
    pub download_url: Option<String>,
    pub manifest_url: Option<String>,
    /// Text somewhere in the form matched the media pattern (not rendered)
    pub has_attachments: bool,
}

/// Event-driven metadata extraction state for a single form
pub struct FormParser<'a> {
    config: &'a FormListConfig,
    cursor: PathCursor,
    form_id: Option<String>,
    version: Option<String>,
    name: Option<String>,
    name_first: bool,
    has_attachments: bool,
}

impl<'a> FormParser<'a> {
    pub fn new(config: &'a FormListConfig) -> Self {
        Self {
            config,
            cursor: PathCursor::new(),
            form_id: None,
            version: None,
            name: None,
            name_first: false,
            has_attachments: false,
        }
    }

    /// The next opened element will supply the form id and version.
    pub fn expects_form_id(&self) -> bool {
        self.form_id.is_none() && self.cursor.is_at(&self.config.instance_path)
    }

    /// Element opened. `id` and `version` are the element's attribute values;
    /// they are only consulted while [`expects_form_id`](Self::expects_form_id) holds.
    pub fn start_element(&mut self, name: &str, id: Option<String>, version: Option<String>) {
        if self.expects_form_id() {
            self.form_id = Some(
                id.filter(|id| !id.is_empty())
                    .unwrap_or_else(|| name.to_string()),
            );
            if let Some(version) = version.filter(|v| !v.is_empty()) {
                self.version = Some(version);
            }
        }
        self.cursor.enter(name);
    }

    pub fn end_element(&mut self, name: &str) {
        self.cursor.leave(name);
    }

    pub fn text(&mut self, content: &str) {
        if self.name.is_none() && self.cursor.is_at(&self.config.name_path) {
            self.name = Some(if content.is_empty() {
                UNNAMED_FORM.to_string()
            } else {
                content.to_string()
            });
            self.name_first = self.form_id.is_none();
        }
        if !self.has_attachments && self.config.media_pattern.is_match(content) {
            self.has_attachments = true;
        }
    }

    /// Finalize the record once the stream has been fully read.
    pub fn finish(
        self,
        hash: String,
        origin_url: Option<String>,
        form: &str,
    ) -> Result<FormMetadata> {
        let form_id = self.form_id.ok_or_else(|| FormListError::MissingFormId {
            form: form.to_string(),
        })?;

        let download_url = match &self.config.download_url {
            Some(template) => Some(fill_form_id(template, &form_id)),
            None => origin_url,
        };

        let manifest_url = match &self.config.manifest_url {
            Some(template) if self.has_attachments => Some(fill_form_id(template, &form_id)),
            _ => None,
        };

        Ok(FormMetadata {
            field_order: if self.name_first {
                FieldOrder::NameFirst
            } else {
                FieldOrder::FormIdFirst
            },
            form_id,
            version: self.version,
            name: self.name.unwrap_or_else(|| UNNAMED_FORM.to_string()),
            hash,
            download_url,
            manifest_url,
            has_attachments: self.has_attachments,
        })
    }
}

/// Async reader adapter that feeds every byte it yields into an md5 context
pub struct HashingReader<R> {
    inner: R,
    context: md5::Context,
    bytes_read: u64,
}

impl<R> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            context: md5::Context::new(),
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Algorithm-prefixed digest of everything read so far
    pub fn finish(self) -> String {
        format!("{}:{:x}", HASH_ALGORITHM, self.context.compute())
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let already_filled = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;

        let chunk = &buf.filled()[already_filled..];
        this.context.consume(chunk);
        this.bytes_read += chunk.len() as u64;
        Poll::Ready(Ok(()))
    }
}

fn classify_xml_error(error: quick_xml::Error, form: &str) -> FormListError {
    match error {
        quick_xml::Error::Io(io_error) => FormListError::Stream {
            form: form.to_string(),
            source: Arc::try_unwrap(io_error)
                .unwrap_or_else(|shared| io::Error::new(shared.kind(), shared.to_string())),
        },
        source => FormListError::MalformedDocument {
            form: form.to_string(),
            source,
        },
    }
}

fn attribute_value(
    element: &BytesStart<'_>,
    key: &str,
) -> std::result::Result<Option<String>, quick_xml::Error> {
    match element.try_get_attribute(key)? {
        Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Parse one form stream into its metadata.
///
/// `form` labels the input item in errors and log lines. The stream is
/// consumed to the end even after the root element closes, so the hash
/// always covers every byte the source produced.
pub async fn parse_form(
    stream: FormStream,
    config: &FormListConfig,
    form: &str,
) -> Result<FormMetadata> {
    let (reader, origin_url) = stream.into_parts();
    let mut xml = Reader::from_reader(BufReader::new(HashingReader::new(reader)));
    {
        let reader_config = xml.config_mut();
        // Mismatched and stray close tags are left to the lenient path cursor
        reader_config.check_end_names = false;
        reader_config.allow_unmatched_ends = true;
        reader_config.expand_empty_elements = true;
    }

    let mut parser = FormParser::new(config);
    let mut buf = Vec::new();
    // Innermost last; any close tag pops one, matching the tokenizer's nesting
    let mut open_elements: Vec<String> = Vec::new();

    loop {
        let event = xml
            .read_event_into_async(&mut buf)
            .await
            .map_err(|e| classify_xml_error(e, form))?;

        match event {
            Event::Start(ref element) => {
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                let (id, version) = if parser.expects_form_id() {
                    (
                        attribute_value(element, "id").map_err(|e| classify_xml_error(e, form))?,
                        attribute_value(element, "version")
                            .map_err(|e| classify_xml_error(e, form))?,
                    )
                } else {
                    (None, None)
                };
                parser.start_element(&name, id, version);
                open_elements.push(name);
            }
            Event::End(ref element) => {
                parser.end_element(&String::from_utf8_lossy(element.name().as_ref()));
                open_elements.pop();
            }
            Event::Text(ref text) => {
                let content = text.unescape().map_err(|e| classify_xml_error(e, form))?;
                parser.text(&content);
            }
            Event::CData(ref cdata) => {
                parser.text(&String::from_utf8_lossy(cdata));
            }
            Event::Eof => {
                if let Some(unclosed) = open_elements.pop() {
                    return Err(FormListError::MalformedDocument {
                        form: form.to_string(),
                        source: quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(
                            unclosed,
                        )),
                    });
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    let mut hashing = xml.into_inner().into_inner();
    tokio::io::copy(&mut hashing, &mut tokio::io::sink())
        .await
        .map_err(|source| FormListError::Stream {
            form: form.to_string(),
            source,
        })?;

    let bytes_read = hashing.bytes_read();
    let hash = hashing.finish();
    debug!(form, bytes_read, %hash, "parsed form");

    parser.finish(hash, origin_url, form)
}
