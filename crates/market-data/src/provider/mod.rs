//! Market data provider abstractions and the provider table.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities
//! - The data-driven provider table and the generic HTTP provider that
//!   executes it
//!
//! Providers only fetch and parse. Quotas, failover, validation and
//! fallback data are handled by the orchestrator in [`crate::registry`].

mod capabilities;
mod http;
pub mod parsers;
pub mod table;
mod traits;

// Re-exports
pub use capabilities::ProviderCapabilities;
pub use http::{default_client, default_providers, ProviderOptions, TableProvider};
pub use table::{ProviderSpec, PROVIDER_TABLE};
pub use traits::{MarketDataProvider, PricePoint, DEFAULT_PROVIDER_TIMEOUT};
