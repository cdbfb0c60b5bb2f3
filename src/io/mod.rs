//! Resource access: locators, fetchers and the chunk cache.

mod chunk_cache;
mod fetch;
mod locator;

pub use chunk_cache::{ChunkCache, DEFAULT_CHUNK_CAPACITY};
pub use fetch::{create_s3_client, DefaultFetcher, Fetcher, Progress};
pub use locator::Locator;
