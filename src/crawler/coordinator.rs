//! Miner coordinator - orchestrates the crawl passes
//!
//! Wires together the record store, id allocator, fetcher, parser and worker
//! pool, and exposes the three user-facing operations:
//!
//! - `reload_threads`: category discovery, then one thread-index crawl per
//!   subcategory through the worker pool
//! - `reload_posts`: load every thread index, then one detail crawl per
//!   thread through the worker pool
//! - `summary`: counts only, reads the store, performs no mutation

use crate::config::Config;
use crate::crawler::discovery::CategoryDiscoverer;
use crate::crawler::fetcher::{build_http_client, PageCache, PageFetcher, RetryPolicy};
use crate::crawler::pool::WorkerPool;
use crate::crawler::posts::ThreadDetailCrawler;
use crate::crawler::threads::ThreadIndexCrawler;
use crate::parse::{PageParser, XenForoParser};
use crate::store::{Category, DomainConfig, IdAllocator, RecordStore, ThreadSummary};
use crate::MinerError;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Counts reported by the `summary` action
#[derive(Debug, Clone)]
pub struct MiningSummary {
    pub url: String,
    pub domain: String,
    pub categories: usize,
    pub subcategories: usize,
    pub threads: usize,
}

/// Main miner coordinator
pub struct Miner {
    base_url: Url,
    domain: String,
    store: Arc<RecordStore>,
    ids: Arc<IdAllocator>,
    fetcher: Arc<PageFetcher>,
    parser: Arc<dyn PageParser>,
    pool: WorkerPool,
}

impl Miner {
    /// Opens the store for the configured domain, bootstrapping the domain
    /// config record on first run
    pub fn new(config: &Config) -> crate::Result<Self> {
        let base_url = Url::parse(&config.miner.base_url)?;
        let domain = base_url
            .host_str()
            .ok_or_else(|| {
                MinerError::Config(crate::ConfigError::InvalidUrl(
                    config.miner.base_url.clone(),
                ))
            })?
            .to_string();

        let store = Arc::new(RecordStore::open(
            Path::new(&config.miner.data_dir),
            &domain,
        )?);

        // Unreadable config here is fatal: the id counter is required for
        // any further progress.
        if store.load_domain_config()?.is_none() {
            tracing::info!("First run for {}, creating domain config", domain);
            store.write_domain_config(&DomainConfig {
                domain: domain.clone(),
                url: config.miner.base_url.clone(),
                last_id: 0,
            })?;
        }

        let cache = config
            .miner
            .cache_pages
            .then(|| PageCache::new(store.cache_dir().to_path_buf(), domain.clone()));
        let fetcher = Arc::new(PageFetcher::new(
            build_http_client()?,
            cache,
            RetryPolicy::default(),
        ));

        let parser: Arc<dyn PageParser> = Arc::new(XenForoParser::new()?);
        let ids = Arc::new(IdAllocator::new(Arc::clone(&store)));
        let pool = WorkerPool::new(config.miner.max_workers);

        Ok(Self {
            base_url,
            domain,
            store,
            ids,
            fetcher,
            parser,
            pool,
        })
    }

    /// Scrapes and reconciles the category tree
    pub async fn discover_categories(&self) -> crate::Result<Vec<Category>> {
        let discoverer = CategoryDiscoverer::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.parser),
            Arc::clone(&self.store),
            Arc::clone(&self.ids),
        );
        discoverer.discover(&self.base_url).await
    }

    /// Runs category discovery, then one thread-index crawl per subcategory
    /// through the worker pool
    ///
    /// A failed subcategory is logged and recorded in its own index file;
    /// it never aborts sibling crawls.
    pub async fn reload_threads(&self) -> crate::Result<()> {
        let categories = self.discover_categories().await?;

        let mut tasks = Vec::new();
        for category in &categories {
            for sub in &category.subs {
                let crawler = ThreadIndexCrawler::new(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.parser),
                    Arc::clone(&self.store),
                    Arc::clone(&self.ids),
                    self.base_url.clone(),
                );
                let category_id = category.id;
                let subcategory_id = sub.id;
                let href = sub.href.clone();

                tasks.push(async move {
                    if let Err(e) = crawler.crawl(category_id, subcategory_id, &href).await {
                        tracing::error!(
                            "Thread index crawl failed for subcategory {} ({}): {}",
                            subcategory_id,
                            href,
                            e
                        );
                    }
                });
            }
        }

        tracing::info!("Reloading threads across {} subcategories", tasks.len());
        self.pool.run(tasks).await?;
        tracing::info!("Reloading threads completed");
        Ok(())
    }

    /// Loads every persisted thread summary, in index order
    pub fn load_threads(&self) -> crate::Result<Vec<ThreadSummary>> {
        let mut threads = Vec::new();
        for index in self.store.load_all_indexes()? {
            threads.extend(index.threads);
        }
        tracing::info!("Loaded {} threads from stored indexes", threads.len());
        Ok(threads)
    }

    /// Runs one post crawl per known thread through the worker pool
    pub async fn reload_posts(&self) -> crate::Result<()> {
        let threads = self.load_threads()?;

        let mut tasks = Vec::new();
        for summary in threads {
            let crawler = ThreadDetailCrawler::new(
                Arc::clone(&self.fetcher),
                Arc::clone(&self.parser),
                Arc::clone(&self.store),
                self.base_url.clone(),
            );

            tasks.push(async move {
                let thread_id = summary.id;
                if let Err(e) = crawler.crawl(&summary).await {
                    tracing::error!("Post crawl failed for thread {}: {}", thread_id, e);
                }
            });
        }

        tracing::info!("Reloading posts for {} threads", tasks.len());
        self.pool.run(tasks).await?;
        tracing::info!("Reload posts completed");
        Ok(())
    }

    /// Reports counts from the store without fetching or mutating anything
    pub fn summary(&self) -> crate::Result<MiningSummary> {
        let categories = self.store.load_categories()?.unwrap_or_default();
        let threads = self.load_threads()?;

        Ok(MiningSummary {
            url: self.base_url.to_string(),
            domain: self.domain.clone(),
            categories: categories.len(),
            subcategories: categories.iter().map(|c| c.subs.len()).sum(),
            threads: threads.len(),
        })
    }
}
