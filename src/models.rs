//! Core data models that flow through the analysis pipeline.
//!
//! [`AnalysisRequest`] enters the pipeline, [`AnalysisResponse`] leaves it.
//! Everything in between ([`OutfitDescription`], [`SearchQuery`],
//! [`ProductResult`]) lives only for the duration of one request.

use serde::{Deserialize, Serialize};

/// An uploaded image awaiting analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub bytes: Vec<u8>,
    /// Filename as sent by the client. May be empty.
    pub filename: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
}

impl AnalysisRequest {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// MIME type sent to the vision model.
    ///
    /// Sniffed from the magic bytes first, then the declared `image/*` type,
    /// then `image/jpeg`.
    pub fn mime_type(&self) -> String {
        if infer::is_image(&self.bytes) {
            if let Some(kind) = infer::get(&self.bytes) {
                return kind.mime_type().to_string();
            }
        }
        match &self.content_type {
            Some(ct) if ct.starts_with("image/") => ct.clone(),
            _ => "image/jpeg".to_string(),
        }
    }

    /// File extension for the persisted upload, without the dot.
    pub fn extension(&self) -> String {
        if let Some(kind) = infer::get(&self.bytes) {
            return kind.extension().to_string();
        }
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string())
    }
}

/// How the vision model responded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The model described clothing.
    Described,
    /// The model answered with a known refusal phrase.
    Refused,
    /// The vision service could not be reached or returned an error.
    Unavailable,
}

/// Free-text description of an outfit, plus whether it is usable for search.
#[derive(Debug, Clone)]
pub struct OutfitDescription {
    pub text: String,
    pub verdict: Verdict,
}

impl OutfitDescription {
    pub fn describable(&self) -> bool {
        self.verdict == Verdict::Described
    }
}

/// A single-line, non-empty shopping query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Returns `None` for blank input. Only the first line is kept.
    pub fn new(raw: &str) -> Option<Self> {
        let line = raw.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            None
        } else {
            Some(Self(line.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One shopping result, in the order the search API returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductResult {
    pub title: String,
    pub price: String,
    pub source: String,
    /// Absolute URL, or empty when the listing had none.
    pub link: String,
    pub thumbnail: String,
}

/// Coarse outcome of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Ok,
    Degraded,
    Failed,
}

/// Why an analysis did not produce products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NotAnOutfit,
    VisionUnavailable,
    NoProducts,
    SearchUnavailable,
    MissingImage,
    Internal,
}

/// The JSON body returned by `POST /analyze`.
///
/// `description` and `links` are the compatibility contract; `status` and
/// `reason` let callers tell "nothing found" from "upstream down".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub description: String,
    pub links: Vec<ProductResult>,
    pub status: ResultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl AnalysisResponse {
    pub fn ok(description: String, links: Vec<ProductResult>) -> Self {
        Self {
            description,
            links,
            status: ResultKind::Ok,
            reason: None,
        }
    }

    pub fn degraded(description: String, reason: Reason) -> Self {
        Self {
            description,
            links: Vec::new(),
            status: ResultKind::Degraded,
            reason: Some(reason),
        }
    }

    /// An `ERROR: ...` response with no links.
    pub fn failed(message: impl std::fmt::Display, reason: Reason) -> Self {
        Self {
            description: format!("ERROR: {}", message),
            links: Vec::new(),
            status: ResultKind::Failed,
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_mime_sniffed_from_bytes() {
        let req = AnalysisRequest::new(PNG_HEADER.to_vec(), "photo.jpg")
            .with_content_type("image/jpeg");
        assert_eq!(req.mime_type(), "image/png");
    }

    #[test]
    fn test_mime_falls_back_to_declared_then_jpeg() {
        let req = AnalysisRequest::new(b"not an image".to_vec(), "x").with_content_type("image/webp");
        assert_eq!(req.mime_type(), "image/webp");

        let req = AnalysisRequest::new(b"not an image".to_vec(), "x")
            .with_content_type("application/octet-stream");
        assert_eq!(req.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_extension_from_bytes_then_filename() {
        assert_eq!(AnalysisRequest::new(PNG_HEADER.to_vec(), "a.jpg").extension(), "png");
        assert_eq!(AnalysisRequest::new(b"xx".to_vec(), "look.WEBP").extension(), "webp");
        assert_eq!(AnalysisRequest::new(b"xx".to_vec(), "../../etc/passwd").extension(), "jpg");
        assert_eq!(AnalysisRequest::new(b"xx".to_vec(), "a.j/pg").extension(), "jpg");
        assert_eq!(AnalysisRequest::new(b"xx".to_vec(), "").extension(), "jpg");
    }

    #[test]
    fn test_search_query_rejects_blank() {
        assert!(SearchQuery::new("   ").is_none());
        assert!(SearchQuery::new("").is_none());
    }

    #[test]
    fn test_search_query_keeps_first_line() {
        let q = SearchQuery::new("  red scarf \nsecond").unwrap();
        assert_eq!(q.as_str(), "red scarf");
    }

    #[test]
    fn test_response_serialization_shape() {
        let resp = AnalysisResponse::ok("desc".to_string(), vec![ProductResult::default()]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json.get("reason").is_none());
        assert_eq!(json["links"][0]["link"], "");

        let resp = AnalysisResponse::failed("boom", Reason::Internal);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["description"], "ERROR: boom");
        assert_eq!(json["reason"], "internal");
        assert_eq!(json["links"].as_array().unwrap().len(), 0);
    }
}
