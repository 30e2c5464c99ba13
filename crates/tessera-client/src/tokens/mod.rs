mod cache;
mod fetcher;

pub use cache::{cache_key, CacheEntry, TokenCache};
pub use fetcher::{GetTokenOptions, TokenFetcher};
