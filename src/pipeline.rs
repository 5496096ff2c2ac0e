//! The image-to-product pipeline.
//!
//! One call to [`Pipeline::analyze`] runs the whole request:
//!
//! ```text
//! bytes ──▶ temp file ──▶ VisionDescriber ──┬─ not describable ──▶ hint
//!                                           └─ described ──▶ QueryExtractor
//!                                                                 │
//!                                      hint if empty ◀── ProductSearch
//! ```
//!
//! Every branch ends in an [`AnalysisResponse`]; nothing is returned as an
//! error, and a panic in a collaborator is reported as an internal failure.
//! The temporary upload is a [`TempPath`], so it is removed when the call
//! returns, fails or unwinds.

use anyhow::{anyhow, Context, Result};
use futures::FutureExt;
use std::any::Any;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{Config, Secrets};
use crate::models::{AnalysisRequest, AnalysisResponse, Reason, Verdict};
use crate::query::BulletLineExtractor;
use crate::search::SerpApiClient;
use crate::traits::{ProductSearch, QueryExtractor};
use crate::vision::{GeminiModel, VisionDescriber};

const NOT_AN_OUTFIT_HINT: &str = "(Please provide an actual image of an outfit for product search.)";
const VISION_UNAVAILABLE_HINT: &str =
    "(The image could not be analyzed right now. Please try again later.)";
const NO_PRODUCTS_HINT: &str = "(No matching products found. Try a clearer outfit image.)";

/// Request-scoped orchestration of describer, extractor and search client.
///
/// Holds no mutable state, so one instance is shared by all concurrent
/// requests.
#[derive(Clone)]
pub struct Pipeline {
    describer: VisionDescriber,
    extractor: Arc<dyn QueryExtractor>,
    search: Arc<dyn ProductSearch>,
    upload_dir: PathBuf,
    max_results: usize,
}

impl Pipeline {
    pub fn new(
        describer: VisionDescriber,
        extractor: Arc<dyn QueryExtractor>,
        search: Arc<dyn ProductSearch>,
        upload_dir: impl Into<PathBuf>,
        max_results: usize,
    ) -> Self {
        Self {
            describer,
            extractor,
            search,
            upload_dir: upload_dir.into(),
            max_results,
        }
    }

    pub fn describer(&self) -> &VisionDescriber {
        &self.describer
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Runs the full pipeline for one uploaded image.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResponse {
        let span = info_span!("analyze", request_id = %uuid::Uuid::new_v4());
        self.analyze_scoped(request).instrument(span).await
    }

    async fn analyze_scoped(&self, request: AnalysisRequest) -> AnalysisResponse {
        info!(filename = %request.filename, bytes = request.bytes.len(), "analysis started");

        if request.bytes.is_empty() {
            warn!("empty upload");
            return AnalysisResponse::failed("No selected file.", Reason::MissingImage);
        }

        let upload = match self.persist(&request) {
            Ok(upload) => upload,
            Err(e) => return unexpected(e),
        };

        let result = AssertUnwindSafe(self.describe_and_search(&upload, &request))
            .catch_unwind()
            .await;
        release(upload);

        match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => unexpected(e),
            Err(payload) => unexpected(anyhow!("panic: {}", panic_message(payload.as_ref()))),
        }
    }

    /// Writes the upload to a uniquely named file in the upload directory.
    fn persist(&self, request: &AnalysisRequest) -> Result<TempPath> {
        std::fs::create_dir_all(&self.upload_dir).with_context(|| {
            format!(
                "Failed to create upload directory: {}",
                self.upload_dir.display()
            )
        })?;

        let suffix = format!(".{}", request.extension());
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.upload_dir)
            .context("Failed to create upload file")?;
        file.write_all(&request.bytes)
            .context("Failed to write upload file")?;
        file.flush().context("Failed to write upload file")?;

        let path = file.into_temp_path();
        info!(path = %path.display(), "image saved");
        Ok(path)
    }

    async fn describe_and_search(
        &self,
        upload: &Path,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse> {
        let image = tokio::fs::read(upload)
            .await
            .with_context(|| format!("Failed to read upload file: {}", upload.display()))?;

        let description = self.describer.describe(&image, &request.mime_type()).await;

        match description.verdict {
            Verdict::Refused => {
                return Ok(AnalysisResponse::degraded(
                    with_hint(&description.text, NOT_AN_OUTFIT_HINT),
                    Reason::NotAnOutfit,
                ));
            }
            Verdict::Unavailable => {
                return Ok(AnalysisResponse::degraded(
                    with_hint(&description.text, VISION_UNAVAILABLE_HINT),
                    Reason::VisionUnavailable,
                ));
            }
            Verdict::Described => {}
        }

        let query = self.extractor.extract(&description.text)?;
        info!(query = %query, "using search query");

        match self.search.search(&query, self.max_results).await {
            Ok(mut links) if !links.is_empty() => {
                links.truncate(self.max_results);
                Ok(AnalysisResponse::ok(description.text, links))
            }
            Ok(_) => {
                warn!("product search returned no products");
                Ok(AnalysisResponse::degraded(
                    with_hint(&description.text, NO_PRODUCTS_HINT),
                    Reason::NoProducts,
                ))
            }
            Err(e) => {
                error!(error = %e, "product search failed");
                Ok(AnalysisResponse::degraded(
                    with_hint(&description.text, NO_PRODUCTS_HINT),
                    Reason::SearchUnavailable,
                ))
            }
        }
    }
}

/// Wires the production pipeline: Gemini, bullet-line extraction, SerpAPI.
pub fn build_pipeline(config: &Config, secrets: &Secrets) -> Result<Pipeline> {
    let model = GeminiModel::new(&config.vision, secrets.gemini_api_key.clone())?;
    let search = SerpApiClient::new(&config.search, secrets.serpapi_key.clone())?;
    let extractor = BulletLineExtractor::new(&config.search.default_query)?;

    Ok(Pipeline::new(
        VisionDescriber::new(Arc::new(model), &config.vision),
        Arc::new(extractor),
        Arc::new(search),
        config.server.upload_dir.clone(),
        config.search.max_results,
    ))
}

fn with_hint(text: &str, hint: &str) -> String {
    format!("{}\n\n{}", text, hint)
}

fn unexpected(err: anyhow::Error) -> AnalysisResponse {
    error!(error = %err, "analysis failed");
    AnalysisResponse::failed(
        format_args!("An unexpected error occurred: {:#}", err),
        Reason::Internal,
    )
}

/// Text of a panic payload, for `&str` and `String` panics.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn release(upload: TempPath) {
    let path = upload.to_path_buf();
    match upload.close() {
        Ok(()) => info!(path = %path.display(), "cleaned up upload"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to clean up upload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_hint_separates_paragraphs() {
        assert_eq!(with_hint("desc", "(hint)"), "desc\n\n(hint)");
    }

    #[test]
    fn test_unexpected_is_error_flavored() {
        let resp = unexpected(anyhow::anyhow!("disk full").context("Failed to write"));
        assert!(resp.description.starts_with("ERROR: An unexpected error occurred:"));
        assert!(resp.description.contains("disk full"));
        assert!(resp.links.is_empty());
        assert_eq!(resp.reason, Some(Reason::Internal));
    }

    #[test]
    fn test_panic_message_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(literal.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "code 7");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
