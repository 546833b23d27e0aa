//! Concurrent form list engine
//!
//! One [`FormPipeline`] per input item runs in its own tokio task:
//! - **Open**: the source is normalized into a [`FormStream`](crate::source::FormStream)
//! - **Parse**: the stream is tokenized and hashed in a single pass
//!
//! The engine joins the tasks through a `FuturesUnordered`, slotting results
//! back into input order. When pipelines fail, the error from the lowest input
//! index is returned; the engine stops waiting as soon as that error is known
//! and every earlier pipeline has finished, and aborts the rest. Dropping the
//! collecting future aborts every pipeline still running.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::FormListConfig;
use crate::error::{FormListError, Result};
use crate::http_client::{AsyncHttpClient, HttpClientConfig};
use crate::manifest::render_manifest;
use crate::parser::{FormMetadata, parse_form};
use crate::source::FormSource;

/// Wires one form source to one parser
#[derive(Clone)]
pub struct FormPipeline {
    client: Arc<AsyncHttpClient>,
    config: Arc<FormListConfig>,
}

impl FormPipeline {
    pub fn new(client: Arc<AsyncHttpClient>, config: Arc<FormListConfig>) -> Self {
        Self { client, config }
    }

    /// Open and parse the form at `index`. The stream is dropped, and so
    /// closed, on every exit path.
    pub async fn run(&self, index: usize, source: FormSource) -> Result<FormMetadata> {
        let form = source.label(index);
        let start = Instant::now();
        debug!(index, form = %form, "starting form pipeline");

        let result = match source.open(&self.client).await {
            Ok(stream) => parse_form(stream, &self.config, &form).await,
            Err(error) => Err(error),
        };

        match &result {
            Ok(metadata) => debug!(
                index,
                form = %form,
                form_id = %metadata.form_id,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "form pipeline finished"
            ),
            Err(error) => warn!(index, form = %form, %error, "form pipeline failed"),
        }

        result
    }
}

/// Aborts the spawned pipelines when dropped
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Builds form lists from many sources concurrently
pub struct FormListEngine {
    pipeline: FormPipeline,
}

impl FormListEngine {
    /// Create an engine for one invocation; `config` is validated and then frozen.
    pub fn new(config: FormListConfig) -> Result<Self> {
        config.validate()?;
        let client = AsyncHttpClient::new(HttpClientConfig::from(&config))?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    pub fn with_client(config: FormListConfig, client: Arc<AsyncHttpClient>) -> Self {
        Self {
            pipeline: FormPipeline::new(client, Arc::new(config)),
        }
    }

    /// Run every pipeline concurrently and collect the metadata in input order.
    pub async fn collect_metadata(&self, sources: Vec<FormSource>) -> Result<Vec<FormMetadata>> {
        let total = sources.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let handles: Vec<JoinHandle<Result<FormMetadata>>> = sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| {
                let pipeline = self.pipeline.clone();
                tokio::spawn(async move { pipeline.run(index, source).await })
            })
            .collect();
        let _abort_guard = AbortOnDrop(handles.iter().map(JoinHandle::abort_handle).collect());

        let mut pending: FuturesUnordered<_> = handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| async move { (index, handle.await) })
            .collect();

        let mut slots: Vec<Option<FormMetadata>> = (0..total).map(|_| None).collect();
        let mut first_error: Option<(usize, FormListError)> = None;

        while let Some((index, joined)) = pending.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(FormListError::Concurrency {
                    details: format!("Task join error for form #{}: {}", index, e),
                })
            });

            match outcome {
                Ok(metadata) => slots[index] = Some(metadata),
                Err(error) => {
                    if first_error.as_ref().is_none_or(|(failed, _)| index < *failed) {
                        first_error = Some((index, error));
                    }
                }
            }

            // Every pipeline before the failing one has succeeded, so no
            // lower-indexed error can still arrive.
            if let Some((failed, _)) = &first_error
                && slots[..*failed].iter().all(Option::is_some)
            {
                break;
            }
        }

        if let Some((failed, error)) = first_error {
            warn!(failed_index = failed, total, "form list aborted");
            return Err(error);
        }

        let forms: Vec<FormMetadata> = slots.into_iter().flatten().collect();
        info!(
            forms = forms.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "collected form metadata"
        );
        Ok(forms)
    }

    /// Collect metadata for every source and render the form list document.
    pub async fn create_form_list(&self, sources: Vec<FormSource>) -> Result<String> {
        let forms = self.collect_metadata(sources).await?;
        render_manifest(&forms)
    }
}

/// Convenience wrapper: build an engine for `config` and render one form list.
pub async fn create_form_list(sources: Vec<FormSource>, config: FormListConfig) -> Result<String> {
    FormListEngine::new(config)?.create_form_list(sources).await
}
