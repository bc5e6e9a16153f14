//! Online metadata search across several providers.
//!
//! # Architecture
//!
//! This module follows a clean separation between:
//! - **Domain models** (`domain.rs`) - Internal types that represent our business logic
//! - **API DTOs** (`lrclib/dto.rs`, `musicbrainz/dto.rs`, `itunes/dto.rs`) - Exact API response shapes
//! - **Adapters** - Convert DTOs to domain models
//! - **Clients** - HTTP clients implementing [`MetadataProvider`]
//! - **Registry** - The fixed set of providers, built from config
//! - **Service** - Concurrent fan-out, scoring, dedup and caching
//!
//! This decoupling means:
//! 1. API changes don't ripple through our codebase
//! 2. We can test API contracts independently
//! 3. Ranking is tested against mock providers, never the network
//!
//! # Usage
//!
//! ```ignore
//! use tune_ledger::enrichment::{Aggregator, AggregatorConfig, PluginManager, SearchQuery};
//!
//! let plugins = PluginManager::from_config(&config.providers);
//! let aggregator = Aggregator::new(plugins, AggregatorConfig::from(&config.providers));
//!
//! let outcome = aggregator.search(&SearchQuery::new("Hotel California", "Eagles"), None).await?;
//! for candidate in outcome.candidates() {
//!     println!("{:.2} {} - {} ({})", candidate.score, candidate.artist, candidate.title, candidate.source);
//! }
//! ```

pub mod cache;
pub mod domain;
pub mod http;
pub mod itunes;
pub mod lrclib;
pub mod musicbrainz;
pub mod registry;
pub mod service;
pub mod traits;

pub use cache::OnlineCache;
pub use domain::{EmptyReason, OnlineCandidate, PluginInfo, ProviderError, SearchOutcome, SearchQuery};
pub use registry::{PluginManager, ProviderKind};
pub use service::{Aggregator, AggregatorConfig};
pub use traits::MetadataProvider;
