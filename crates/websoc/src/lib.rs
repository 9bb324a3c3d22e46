//! Fan-out fetch and merge engine for WebSoc course-schedule queries.
//!
//! A logical query is split (elsewhere) into sub-queries small enough for
//! WebSoc to answer. [`aggregate::Aggregator`] issues them concurrently,
//! retries the failed ones, and assembles the partial trees into a single
//! deduplicated, normalized and sorted [`types::MergedTree`].

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod server;
pub mod sort;
pub mod types;

pub use aggregate::{assemble, Aggregation, AggregationReport, Aggregator, FnFetcher, SubQueryFetcher};
pub use config::{AggregatorConfig, Config, TerminalPolicy};
pub use error::{AggregateError, FetchError};
pub use types::{MergedTree, RawPartialTree, SubQuery};
