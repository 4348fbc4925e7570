//! PMG Prospector library.
//!
//! Prospect analysis for a wholesale food distributor: company registry
//! lookup, social presence estimation, menu parsing, AI-assisted reports
//! and ranked product recommendations, each client with its own cache,
//! rate limiter and fallback chain.
//!
//! # Modules
//!
//! - `registry`: CNPJ lookup across registry mirrors.
//! - `geocoding`: Address to coordinates, routing and nearby places.
//! - `social`: Instagram/Facebook strategy cascade.
//! - `ai`: Grok/Gemini text generation with template fallback.
//! - `menu`: Local menu extraction and statistics.
//! - `recommendation`: Product suggestion scoring.
//! - `competitors`: Distributor competitors, market position and local competition.
//! - `prospect`: The end-to-end orchestrator.
//! - `history`: Local analysis history with checksum envelope.
//! - `cache`, `rate_limiter`, `circuit_breaker`, `clock`: shared infrastructure.

pub mod ai;
pub mod cache;
pub mod catalog;
pub mod circuit_breaker;
pub mod clock;
pub mod cnpj;
pub mod competitors;
pub mod config;
pub mod errors;
pub mod geocoding;
pub mod history;
pub mod menu;
pub mod models;
pub mod prospect;
pub mod rate_limiter;
pub mod recommendation;
pub mod registry;
pub mod social;
