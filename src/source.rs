//! Form sources
//!
//! Every input item, whether a URL, a string of XML, or an already open
//! stream, is turned into a [`FormStream`]: a boxed async byte reader plus the
//! URL it was fetched from, when there is one.

use futures::TryStreamExt;
use reqwest::Url;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::error::Result;
use crate::http_client::AsyncHttpClient;

/// Boxed byte reader backing a [`FormStream`]
pub type FormReader = Pin<Box<dyn AsyncRead + Send>>;

/// A readable xForm byte stream, optionally annotated with its origin URL
pub struct FormStream {
    reader: FormReader,
    origin_url: Option<String>,
}

impl FormStream {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            origin_url: None,
        }
    }

    /// Attach the URL the stream was obtained from; used as the fallback download URL
    pub fn with_origin_url(mut self, url: impl Into<String>) -> Self {
        self.origin_url = Some(url.into());
        self
    }

    pub fn origin_url(&self) -> Option<&str> {
        self.origin_url.as_deref()
    }

    pub fn into_parts(self) -> (FormReader, Option<String>) {
        (self.reader, self.origin_url)
    }
}

impl fmt::Debug for FormStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormStream")
            .field("origin_url", &self.origin_url)
            .finish_non_exhaustive()
    }
}

/// One input item before normalization
#[derive(Debug)]
pub enum FormSource {
    /// Fetched with an HTTP GET
    RemoteUrl(String),
    /// Complete xForm document text
    RawText(String),
    /// Stream opened by the caller (file, stdin, pre-fetched response...)
    OpenStream(FormStream),
}

impl FormSource {
    /// Classify a string input: absolute http(s) URLs are fetched, anything else is form XML.
    pub fn detect(input: impl Into<String>) -> Self {
        let input = input.into();
        if Self::is_remote_url(&input) {
            FormSource::RemoteUrl(input)
        } else {
            FormSource::RawText(input)
        }
    }

    pub fn is_remote_url(input: &str) -> bool {
        match Url::parse(input.trim()) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
            Err(_) => false,
        }
    }

    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        FormSource::OpenStream(FormStream::new(reader))
    }

    pub fn stdin() -> Self {
        Self::stream(tokio::io::stdin())
    }

    /// Open a local file as a stream source
    pub async fn open_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        Ok(Self::stream(file))
    }

    /// Human-readable label used to tag errors and log lines
    pub fn label(&self, index: usize) -> String {
        match self {
            FormSource::RemoteUrl(url) => url.clone(),
            FormSource::OpenStream(stream) => match stream.origin_url() {
                Some(url) => url.to_string(),
                None => format!("form #{}", index),
            },
            FormSource::RawText(_) => format!("form #{}", index),
        }
    }

    /// Normalize this source into a readable stream.
    ///
    /// Only `RemoteUrl` touches the network; a non-200 response fails here with
    /// the response body as the error payload.
    pub async fn open(self, client: &AsyncHttpClient) -> Result<FormStream> {
        match self {
            FormSource::RemoteUrl(url) => {
                let response = client.fetch_form(&url).await?;
                let origin_url = response.url().to_string();
                let body = response.bytes_stream().map_err(std::io::Error::other);
                Ok(FormStream::new(StreamReader::new(body)).with_origin_url(origin_url))
            }
            FormSource::RawText(text) => Ok(FormStream::new(Cursor::new(text.into_bytes()))),
            FormSource::OpenStream(stream) => Ok(stream),
        }
    }
}

impl From<FormStream> for FormSource {
    fn from(stream: FormStream) -> Self {
        FormSource::OpenStream(stream)
    }
}
