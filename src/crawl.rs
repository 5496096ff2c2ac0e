//! Shop-page crawler.
//!
//! Fetches one page, collects its `<img src>` URLs in document order, and for
//! each one: downloads it, posts it to a running `/analyze` endpoint, prints
//! the result, and deletes the download. Images are processed strictly one
//! at a time with a random pause between them.
//!
//! Per-image failures are logged and skipped; only a failure to fetch the
//! start page aborts the crawl.

use anyhow::{bail, Context, Result};
use rand::Rng;
use regex::Regex;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::CrawlerConfig;
use crate::models::AnalysisResponse;
use crate::server::IMAGE_FIELD;

/// Summary of one crawl run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// `<img>` tags found on the page.
    pub found: usize,
    /// Images analyzed successfully.
    pub analyzed: usize,
    /// Images skipped (data URIs, bad URLs, download or analyze failures).
    pub skipped: usize,
}

pub struct Crawler {
    client: reqwest::Client,
    config: CrawlerConfig,
    img_src: Regex,
}

impl Crawler {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build crawler HTTP client")?;

        let img_src = Regex::new(r#"(?is)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .context("Failed to compile <img> pattern")?;

        Ok(Self {
            client,
            config: config.clone(),
            img_src,
        })
    }

    /// Crawls `start_url`, analyzing at most `max_images` images.
    pub async fn run(&self, start_url: &str, max_images: usize) -> Result<CrawlReport> {
        println!("Starting crawl for: {}", start_url);

        let page_url =
            Url::parse(start_url).with_context(|| format!("Invalid start URL: {}", start_url))?;
        let html = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch {}", start_url))?
            .text()
            .await
            .with_context(|| format!("Failed to read {}", start_url))?;

        std::fs::create_dir_all(&self.config.download_dir).with_context(|| {
            format!(
                "Failed to create download directory: {}",
                self.config.download_dir.display()
            )
        })?;

        let sources = self.image_sources(&html);
        let mut report = CrawlReport {
            found: sources.len(),
            ..Default::default()
        };
        info!(count = sources.len(), "found images");

        for src in sources {
            if report.analyzed >= max_images {
                break;
            }

            let Some(image_url) = resolve_image_url(&page_url, &src) else {
                debug!(src = %truncate(&src, 50), "skipping image source");
                report.skipped += 1;
                continue;
            };

            match self.process(&image_url).await {
                Ok(()) => report.analyzed += 1,
                Err(e) => {
                    warn!(url = %image_url, error = %format!("{:#}", e), "image skipped");
                    println!("Skipped {}: {:#}", image_url, e);
                    report.skipped += 1;
                }
            }

            self.pause().await;
        }

        println!(
            "Crawl finished: {} analyzed, {} skipped, {} found",
            report.analyzed, report.skipped, report.found
        );
        Ok(report)
    }

    /// `src` attribute values of all `<img>` tags, in document order.
    pub fn image_sources(&self, html: &str) -> Vec<String> {
        self.img_src
            .captures_iter(html)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().trim().replace("&amp;", "&"))
            .filter(|s| !s.is_empty())
            .collect()
    }

    async fn process(&self, image_url: &Url) -> Result<()> {
        let download = self.download_image(image_url).await?;
        let analysis = self.submit(&download).await?;
        release(download);

        println!("Analysis for {}: {}", image_url, analysis.description);
        if analysis.links.is_empty() {
            println!("  No product links found for this image.");
        } else {
            println!("Product Links:");
            for product in &analysis.links {
                println!(
                    "  - {} | {} | {} | {}",
                    product.title, product.price, product.source, product.link
                );
            }
        }
        Ok(())
    }

    /// Saves the image as `<uuid>.<ext>` in the download directory. The
    /// returned path deletes the file when dropped.
    async fn download_image(&self, url: &Url) -> Result<TempPath> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("Download failed")?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let ext = extension_for_content_type(&content_type);

        let bytes = response.bytes().await.context("Download failed")?;

        let path: PathBuf = self
            .config
            .download_dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), ext));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        println!("Downloaded: {} to {}", url, path.display());
        Ok(TempPath::from_path(path))
    }

    async fn submit(&self, path: &TempPath) -> Result<AnalysisResponse> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.jpg")
            .to_string();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(&self.config.analyze_url)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to send image to {}", self.config.analyze_url))?;

        let analysis: AnalysisResponse = response
            .json()
            .await
            .context("Failed to decode analyze response")?;
        Ok(analysis)
    }

    async fn pause(&self) {
        let (min, max) = (self.config.min_delay_ms, self.config.max_delay_ms);
        if max == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(min.min(max)..=max);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

/// Resolves an `<img src>` against the page URL. Data URIs and unparsable
/// values yield `None`.
pub fn resolve_image_url(page: &Url, src: &str) -> Option<Url> {
    if src.starts_with("data:") {
        return None;
    }
    let url = page.join(src).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

/// Picks a file extension from a `Content-Type` header value.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("jpeg") {
        "jpg"
    } else if ct.contains("png") {
        "png"
    } else if ct.contains("gif") {
        "gif"
    } else {
        "jpg"
    }
}

fn release(download: TempPath) {
    let path = download.to_path_buf();
    match download.close() {
        Ok(()) => println!("Cleaned up {}", path.display()),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove download"),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Validates the crawl arguments before any network traffic.
pub fn check_max_images(max_images: usize) -> Result<usize> {
    if max_images == 0 {
        bail!("max_images must be >= 1");
    }
    Ok(max_images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawler() -> Crawler {
        Crawler::new(&CrawlerConfig::default()).unwrap()
    }

    #[test]
    fn test_image_sources_in_document_order() {
        let html = r#"
            <html><body>
              <img src="/a.jpg" alt="a">
              <IMG class="hero" SRC='https://cdn.example/b.png'>
              <img alt="no src">
              <img data-src="lazy.jpg" src="c.gif?w=1&amp;h=2" />
              <img src="">
            </body></html>
        "#;
        assert_eq!(
            crawler().image_sources(html),
            vec!["/a.jpg", "https://cdn.example/b.png", "c.gif?w=1&h=2"]
        );
    }

    #[test]
    fn test_data_src_is_not_src() {
        assert!(crawler().image_sources(r#"<img data-src="x.jpg">"#).is_empty());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let page = Url::parse("https://shop.example/w/mens-shoes").unwrap();
        assert_eq!(
            resolve_image_url(&page, "/img/1.jpg").unwrap().as_str(),
            "https://shop.example/img/1.jpg"
        );
        assert_eq!(
            resolve_image_url(&page, "thumb.png").unwrap().as_str(),
            "https://shop.example/w/thumb.png"
        );
        assert_eq!(
            resolve_image_url(&page, "//cdn.example/x.jpg").unwrap().as_str(),
            "https://cdn.example/x.jpg"
        );
        assert_eq!(
            resolve_image_url(&page, "http://other.example/y.jpg")
                .unwrap()
                .as_str(),
            "http://other.example/y.jpg"
        );
    }

    #[test]
    fn test_resolve_skips_data_uris_and_other_schemes() {
        let page = Url::parse("https://shop.example/").unwrap();
        assert!(resolve_image_url(&page, "data:image/png;base64,AAAA").is_none());
        assert!(resolve_image_url(&page, "javascript:void(0)").is_none());
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for_content_type("image/jpeg"), "jpg");
        assert_eq!(extension_for_content_type("image/PNG; charset=binary"), "png");
        assert_eq!(extension_for_content_type("image/gif"), "gif");
        assert_eq!(extension_for_content_type("image/webp"), "jpg");
        assert_eq!(extension_for_content_type(""), "jpg");
    }

    #[test]
    fn test_check_max_images() {
        assert!(check_max_images(0).is_err());
        assert_eq!(check_max_images(3).unwrap(), 3);
    }
}
