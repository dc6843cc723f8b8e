//! Snapshot Fetcher Adapters
//!
//! HTTP implementation of the `SnapshotFetcher` port.

mod google;
pub mod parse;

pub use google::GoogleFinanceFetcher;
