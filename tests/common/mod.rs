//! Shared test doubles and helpers.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use outfit_finder::config::VisionConfig;
use outfit_finder::models::{ProductResult, SearchQuery};
use outfit_finder::pipeline::Pipeline;
use outfit_finder::query::BulletLineExtractor;
use outfit_finder::traits::{ProductSearch, QueryExtractor, VisionModel};
use outfit_finder::vision::VisionDescriber;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ─── Vision doubles ─────────────────────────────────────────────────

/// Replies with fixed text, or fails with a fixed message.
pub struct ScriptedVision {
    reply: Result<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedVision {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn answer(&self) -> Result<String> {
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn describe_image(&self, image: &[u8], _mime_type: &str, prompt: &str) -> Result<String> {
        assert!(!image.is_empty(), "vision model received an empty image");
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer()
    }
}

/// Panics inside the pipeline, to prove cleanup survives unwinding.
pub struct PanickingVision;

#[async_trait]
impl VisionModel for PanickingVision {
    fn model_name(&self) -> &str {
        "panicking"
    }

    async fn describe_image(&self, _: &[u8], _: &str, _: &str) -> Result<String> {
        panic!("vision model exploded");
    }

    async fn complete(&self, _: &str) -> Result<String> {
        panic!("vision model exploded");
    }
}

// ─── Search doubles ─────────────────────────────────────────────────

/// Returns canned products and records every query it receives.
pub struct RecordingSearch {
    products: Result<Vec<ProductResult>, String>,
    pub queries: Mutex<Vec<String>>,
}

impl RecordingSearch {
    pub fn returning(products: Vec<ProductResult>) -> Self {
        Self {
            products: Ok(products),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            products: Err(message.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductSearch for RecordingSearch {
    async fn search(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<ProductResult>> {
        self.queries.lock().unwrap().push(query.as_str().to_string());
        match &self.products {
            Ok(products) => Ok(products.iter().take(max_results).cloned().collect()),
            Err(e) => Err(anyhow::anyhow!(e.clone())),
        }
    }
}

/// Extractor that always fails, standing in for a broken structured parser.
pub struct FailingExtractor;

impl QueryExtractor for FailingExtractor {
    fn extract(&self, _description: &str) -> Result<SearchQuery> {
        anyhow::bail!("extractor crashed")
    }
}

// ─── Builders ───────────────────────────────────────────────────────

pub fn product(title: &str, link: &str) -> ProductResult {
    ProductResult {
        title: title.to_string(),
        price: "$10.00".to_string(),
        source: "Test Shop".to_string(),
        link: link.to_string(),
        thumbnail: String::new(),
    }
}

pub fn pipeline_with(
    vision: Arc<dyn VisionModel>,
    search: Arc<dyn ProductSearch>,
    upload_dir: &Path,
) -> Pipeline {
    Pipeline::new(
        VisionDescriber::new(vision, &VisionConfig::default()),
        Arc::new(BulletLineExtractor::new("white t-shirt").unwrap()),
        search,
        upload_dir,
        5,
    )
}

/// Number of entries in `dir`, or zero if it does not exist.
pub fn file_count(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

/// A minimal valid PNG header, enough for content sniffing.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

/// Serves `app` on an ephemeral local port.
pub async fn spawn_app(app: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}
