//! Shopping product search backed by SerpAPI.
//!
//! Sends `GET {base_url}?engine=google&tbm=shop&q=...&api_key=...` and maps
//! each entry of `shopping_results` to a [`ProductResult`].
//!
//! # Payload mapping
//!
//! | Upstream field | `ProductResult` field |
//! |----------------|-----------------------|
//! | `title` | `title` |
//! | `price` (or `extracted_price`) | `price` |
//! | `source` | `source` |
//! | `link`, else `product_link`, else `serpapi_link` | `link` (normalized) |
//! | `thumbnail` | `thumbnail` |
//!
//! Missing or non-string fields become empty strings. The upstream order is
//! kept and the list is truncated to `max_results`; nothing is deduplicated.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::models::{ProductResult, SearchQuery};
use crate::traits::ProductSearch;

/// SerpAPI Google Shopping client.
pub struct SerpApiClient {
    client: reqwest::Client,
    base_url: String,
    engine: String,
    api_key: String,
}

impl SerpApiClient {
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("SerpAPI key must not be empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build SerpAPI HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            engine: config.engine.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ProductSearch for SerpApiClient {
    async fn search(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<ProductResult>> {
        info!(query = %query, "searching products");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("engine", self.engine.as_str()),
                ("q", query.as_str()),
                ("tbm", "shop"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Failed to call SerpAPI")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("SerpAPI error {}: {}", status, body_text);
        }

        let json: Value = response
            .json()
            .await
            .context("Failed to parse SerpAPI response")?;

        // SerpAPI reports some failures (bad key, quota) as 200 + "error".
        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            if json.get("shopping_results").is_none() {
                bail!("SerpAPI error: {}", err);
            }
        }

        let products = parse_shopping_results(&json, max_results);
        info!(count = products.len(), "found products");
        Ok(products)
    }
}

/// Maps `shopping_results` to products, keeping at most `max_results`.
pub fn parse_shopping_results(json: &Value, max_results: usize) -> Vec<ProductResult> {
    let Some(items) = json.get("shopping_results").and_then(|r| r.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .take(max_results)
        .map(|item| {
            let raw_link = ["link", "product_link", "serpapi_link"]
                .iter()
                .map(|key| text_field(item, key))
                .find(|l| !l.is_empty())
                .unwrap_or_default();
            let link = normalize_link(&raw_link);
            debug!(link = %link, "product link");

            let mut price = text_field(item, "price");
            if price.is_empty() {
                if let Some(n) = item.get("extracted_price").and_then(|p| p.as_f64()) {
                    price = n.to_string();
                }
            }

            ProductResult {
                title: text_field(item, "title"),
                price,
                source: text_field(item, "source"),
                link,
                thumbnail: text_field(item, "thumbnail"),
            }
        })
        .collect()
}

/// Makes a product link absolute.
///
/// Empty links and links with an `http://` or `https://` scheme (any case)
/// are returned as-is; anything else loses its leading slashes and gains
/// `https://`.
pub fn normalize_link(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || has_http_scheme(raw) {
        raw.to_string()
    } else {
        format!("https://{}", raw.trim_start_matches('/'))
    }
}

fn has_http_scheme(link: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        link.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

fn text_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_link("shop/item1"), "https://shop/item1");
    }

    #[test]
    fn test_normalize_strips_leading_slashes() {
        assert_eq!(
            normalize_link("//www.example.com/p/1"),
            "https://www.example.com/p/1"
        );
        assert_eq!(normalize_link("/shopping/product/42"), "https://shopping/product/42");
    }

    #[test]
    fn test_normalize_host_starting_with_http() {
        assert_eq!(normalize_link("httpbin.org/item1"), "https://httpbin.org/item1");
        assert_eq!(
            normalize_link("http-shop.example/p"),
            "https://http-shop.example/p"
        );
    }

    #[test]
    fn test_normalize_scheme_is_case_insensitive() {
        assert_eq!(normalize_link("HTTPS://A.com/x"), "HTTPS://A.com/x");
    }

    #[test]
    fn test_normalize_keeps_absolute_and_empty() {
        assert_eq!(normalize_link("http://a.com/x"), "http://a.com/x");
        assert_eq!(normalize_link("https://a.com/x"), "https://a.com/x");
        assert_eq!(normalize_link(""), "");
    }

    #[test]
    fn test_parse_maps_fields_in_order() {
        let json = json!({
            "shopping_results": [
                {
                    "title": "Wool Sweater",
                    "price": "$49.99",
                    "source": "Shop A",
                    "link": "https://a.example/sweater",
                    "thumbnail": "https://img.example/1.jpg"
                },
                {
                    "title": "Knit Sweater",
                    "price": "$30.00",
                    "source": "Shop B",
                    "product_link": "shop/item1"
                }
            ]
        });
        let products = parse_shopping_results(&json, 5);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].title, "Wool Sweater");
        assert_eq!(products[0].thumbnail, "https://img.example/1.jpg");
        assert_eq!(products[1].link, "https://shop/item1");
        assert_eq!(products[1].thumbnail, "");
    }

    #[test]
    fn test_parse_truncates_to_max() {
        let items: Vec<Value> = (0..10).map(|i| json!({ "title": format!("item {}", i) })).collect();
        let json = json!({ "shopping_results": items });
        let products = parse_shopping_results(&json, 5);
        assert_eq!(products.len(), 5);
        assert_eq!(products[4].title, "item 4");
    }

    #[test]
    fn test_parse_missing_fields_are_empty() {
        let json = json!({ "shopping_results": [ { "price": 12 }, {} ] });
        let products = parse_shopping_results(&json, 5);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0], ProductResult::default());
        assert_eq!(products[1], ProductResult::default());
    }

    #[test]
    fn test_parse_link_fallback_order() {
        let json = json!({ "shopping_results": [
            { "link": "", "product_link": "", "serpapi_link": "https://serpapi.com/x" }
        ]});
        let products = parse_shopping_results(&json, 5);
        assert_eq!(products[0].link, "https://serpapi.com/x");
    }

    #[test]
    fn test_parse_extracted_price_fallback() {
        let json = json!({ "shopping_results": [ { "extracted_price": 19.5 } ] });
        assert_eq!(parse_shopping_results(&json, 5)[0].price, "19.5");
    }

    #[test]
    fn test_parse_no_results_key() {
        assert!(parse_shopping_results(&json!({ "search_metadata": {} }), 5).is_empty());
    }

    #[test]
    fn test_links_are_empty_or_http() {
        let json = json!({ "shopping_results": [
            { "link": "a/b" }, { "link": "" }, { "link": "http://x" }, { "serpapi_link": "///y" },
            { "link": "httpbin.org/item1" }, { "product_link": "https-store.example/q" }
        ]});
        for p in parse_shopping_results(&json, 10) {
            assert!(p.link.is_empty() || p.link.starts_with("http://") || p.link.starts_with("https://"), "{}", p.link);
        }
    }

    #[test]
    fn test_client_rejects_blank_key() {
        assert!(SerpApiClient::new(&SearchConfig::default(), "").is_err());
    }
}
