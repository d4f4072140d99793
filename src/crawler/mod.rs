//! Crawl engine
//!
//! # Components
//!
//! - `fetcher`: page fetching with retry and optional disk cache
//! - `pool`: bounded worker pool for crawl tasks
//! - `discovery`: category tree scraping and reconciliation
//! - `threads`: incremental per-subcategory thread-index crawling
//! - `posts`: resumable per-thread post crawling
//! - `coordinator`: wires everything together behind the CLI actions

pub mod coordinator;
pub mod discovery;
pub mod fetcher;
pub mod pool;
pub mod posts;
pub mod threads;

pub use coordinator::{Miner, MiningSummary};
pub use discovery::CategoryDiscoverer;
pub use fetcher::{build_http_client, PageCache, PageFetcher, RetryPolicy};
pub use pool::WorkerPool;
pub use posts::ThreadDetailCrawler;
pub use threads::ThreadIndexCrawler;
