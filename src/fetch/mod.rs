//! Asset downloads that run after the reveal phase

mod fetcher;
mod pool;

pub use fetcher::{build_http_client, FetchError, FetchedAsset, Fetcher, HttpFetcher};
pub use pool::{extension_for, AssetFetchPool, FetchSummary};
