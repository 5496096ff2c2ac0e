//! # Outfit Finder
//!
//! Upload a photo of an outfit, get it described by a multimodal model, and
//! find similar products through a shopping search API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────────┐   ┌──────────┐
//! │  HTTP    │──▶│             Pipeline             │──▶│  JSON    │
//! │ /analyze │   │ Vision → Query → Product search  │   │ response │
//! └──────────┘   └───────┬──────────────────┬───────┘   └──────────┘
//!                        ▼                  ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │  Gemini  │       │ SerpAPI  │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=... SERPAPI_KEY=...
//! outfit serve                                  # start HTTP server
//! outfit analyze ./look.jpg                     # one-off local analysis
//! outfit crawl https://shop.example/w/jackets   # feed a shop page to /analyze
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`models`] | Request, description, product, and response types |
//! | [`traits`] | Vision model, product search, and query extraction seams |
//! | [`vision`] | Gemini client and outfit describer |
//! | [`query`] | Bullet-line search query extraction |
//! | [`search`] | SerpAPI shopping client |
//! | [`pipeline`] | Image-to-product orchestration |
//! | [`chat`] | Text chat passthrough |
//! | [`server`] | HTTP server |
//! | [`crawl`] | Shop-page image crawler |
//! | [`logging`] | Tracing subscriber setup |

pub mod chat;
pub mod config;
pub mod crawl;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod search;
pub mod server;
pub mod traits;
pub mod vision;
