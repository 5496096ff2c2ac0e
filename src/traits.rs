//! Seams between the pipeline and its external collaborators.
//!
//! The [`Pipeline`](crate::pipeline::Pipeline) never talks to Gemini or
//! SerpAPI directly. It holds trait objects for each collaborator, so the
//! real clients are injected at startup and tests can swap in doubles.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Pipeline                    │
//! │  ┌────────────┐ ┌──────────────┐ ┌─────────┐ │
//! │  │VisionModel │ │QueryExtractor│ │Product  │ │
//! │  │ (Gemini)   │ │ (bullets)    │ │Search   │ │
//! │  └────────────┘ └──────────────┘ │(SerpAPI)│ │
//! │                                  └─────────┘ │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!             POST /analyze → AnalysisResponse
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ProductResult, SearchQuery};

// ═══════════════════════════════════════════════════════════════════════
// VisionModel Trait
// ═══════════════════════════════════════════════════════════════════════

/// A multimodal language model.
///
/// Implementations return raw model text and report transport or API
/// problems as errors. Interpreting that text (refusal detection, error
/// absorption) is done by [`VisionDescriber`](crate::vision::VisionDescriber).
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use outfit_finder::traits::VisionModel;
///
/// struct Canned;
///
/// #[async_trait]
/// impl VisionModel for Canned {
///     fn model_name(&self) -> &str { "canned" }
///
///     async fn describe_image(&self, _image: &[u8], _mime: &str, _prompt: &str) -> Result<String> {
///         Ok("* black leather boots".to_string())
///     }
///
///     async fn complete(&self, prompt: &str) -> Result<String> {
///         Ok(format!("echo: {}", prompt))
///     }
/// }
/// ```
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier used in logs (e.g. `"gemini-1.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generates text from an instruction prompt plus one image.
    async fn describe_image(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String>;

    /// Generates text from a text-only prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ═══════════════════════════════════════════════════════════════════════
// ProductSearch Trait
// ═══════════════════════════════════════════════════════════════════════

/// A shopping search backend.
///
/// Returns at most `max_results` products in upstream order. An empty `Ok`
/// means the backend answered but found nothing; `Err` means it could not
/// be asked.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<ProductResult>>;
}

// ═══════════════════════════════════════════════════════════════════════
// QueryExtractor Trait
// ═══════════════════════════════════════════════════════════════════════

/// Strategy that turns a free-text outfit description into a search query.
///
/// The default is [`BulletLineExtractor`](crate::query::BulletLineExtractor).
/// A structured extractor that can fail should return `Err`; the pipeline
/// reports it as an internal failure.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use outfit_finder::models::SearchQuery;
/// use outfit_finder::traits::QueryExtractor;
///
/// struct FirstWords;
///
/// impl QueryExtractor for FirstWords {
///     fn extract(&self, description: &str) -> Result<SearchQuery> {
///         let words: Vec<&str> = description.split_whitespace().take(3).collect();
///         SearchQuery::new(&words.join(" "))
///             .ok_or_else(|| anyhow::anyhow!("description is empty"))
///     }
/// }
///
/// let q = FirstWords.extract("navy linen blazer with gold buttons").unwrap();
/// assert_eq!(q.as_str(), "navy linen blazer");
/// ```
pub trait QueryExtractor: Send + Sync {
    fn extract(&self, description: &str) -> Result<SearchQuery>;
}
