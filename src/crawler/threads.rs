//! Incremental thread-index crawling
//!
//! One crawl covers one subcategory's thread listing. The crawl pages
//! forward from the listing start and stops as soon as it sees a non-pinned
//! entry whose last activity is strictly older than the cutoff, the newest
//! `last_post` already stored for this subcategory. Listings order
//! non-pinned threads newest-active-first, so everything past that point is
//! already known.
//!
//! Known limitation: if the site ever interleaves listing order differently,
//! threads past the first stale entry would be skipped silently. The cutoff
//! heuristic depends on the newest-active-first ordering.

use crate::crawler::fetcher::PageFetcher;
use crate::parse::{PageParser, ThreadEntry};
use crate::store::{
    IdAllocator, IndexStatus, RecordStore, StoreResult, SubcategoryIndex, ThreadSummary,
};
use std::sync::Arc;
use url::Url;

pub struct ThreadIndexCrawler {
    fetcher: Arc<PageFetcher>,
    parser: Arc<dyn PageParser>,
    store: Arc<RecordStore>,
    ids: Arc<IdAllocator>,
    base_url: Url,
}

impl ThreadIndexCrawler {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        parser: Arc<dyn PageParser>,
        store: Arc<RecordStore>,
        ids: Arc<IdAllocator>,
        base_url: Url,
    ) -> Self {
        Self {
            fetcher,
            parser,
            store,
            ids,
            base_url,
        }
    }

    /// Crawls one subcategory's listing until no relevant new activity remains
    ///
    /// Idempotent and resumable: the index file is persisted after every
    /// page, and a re-crawl of an up-to-date subcategory stops on the first
    /// listing page.
    pub async fn crawl(
        &self,
        category_id: u64,
        subcategory_id: u64,
        start_url: &str,
    ) -> crate::Result<()> {
        tracing::info!(
            "Crawling thread index for subcategory {} from {}",
            subcategory_id,
            start_url
        );

        let mut index = match self.store.load_index(category_id, subcategory_id)? {
            Some(index) => index,
            None => {
                let index =
                    SubcategoryIndex::new(start_url.to_string(), category_id, subcategory_id);
                self.store.write_index(&index)?;
                index
            }
        };

        let cutoff = index.activity_cutoff();
        tracing::debug!("Activity cutoff for subcategory {}: {}", subcategory_id, cutoff);

        let mut url = start_url.to_string();
        let mut new_threads = 0u64;

        loop {
            let page = self
                .fetcher
                .fetch_parsed(&url, |body| {
                    self.parser.parse_thread_listing(body, &self.base_url)
                })
                .await?;

            index.total_pages = page.total_pages;

            let mut reached_known = false;
            for entry in page.entries {
                // Pinned threads render first regardless of recency, so they
                // never trigger the stop rule.
                if !entry.is_fixed && entry.last_post < cutoff {
                    reached_known = true;
                    break;
                }

                if upsert(&mut index, entry, category_id, subcategory_id, &self.ids)? {
                    new_threads += 1;
                }
            }

            // Persist after every page so an interruption loses at most the
            // page in flight.
            self.store.write_index(&index)?;

            if reached_known {
                tracing::debug!(
                    "Reached already-known activity in subcategory {}, stopping",
                    subcategory_id
                );
                break;
            }

            match page.next_page {
                Some(next) => url = next,
                None => break,
            }
        }

        index.status = IndexStatus::Complete;
        self.store.write_index(&index)?;

        tracing::info!(
            "Thread index for subcategory {} complete: {} threads ({} new)",
            subcategory_id,
            index.threads.len(),
            new_threads
        );

        Ok(())
    }
}

/// Merges a listing entry into the index by `href`
///
/// An existing thread keeps its id and has every other field replaced with
/// the freshly scraped values; an unknown href is appended with a new id.
/// Returns whether a new thread was inserted.
fn upsert(
    index: &mut SubcategoryIndex,
    entry: ThreadEntry,
    category_id: u64,
    subcategory_id: u64,
    ids: &IdAllocator,
) -> StoreResult<bool> {
    if let Some(existing) = index.threads.iter_mut().find(|t| t.href == entry.href) {
        let id = existing.id;
        *existing = summary_from_entry(entry, id, category_id, subcategory_id);
        Ok(false)
    } else {
        let summary = summary_from_entry(entry, ids.next_id()?, category_id, subcategory_id);
        tracing::debug!("New thread discovered: {} ({})", summary.title, summary.href);
        index.threads.push(summary);
        index.total_threads += 1;
        Ok(true)
    }
}

fn summary_from_entry(
    entry: ThreadEntry,
    id: u64,
    category_id: u64,
    subcategory_id: u64,
) -> ThreadSummary {
    ThreadSummary {
        id,
        category_id,
        subcategory_id,
        title: entry.title,
        href: entry.href,
        member_href: entry.member_href,
        member_name: entry.member_name,
        date_thread: entry.date_thread,
        tags: entry.tags,
        answers: entry.answers,
        visits: entry.visits,
        last_post: entry.last_post,
        is_fixed: entry.is_fixed,
    }
}
