//! Resumable per-thread post crawling
//!
//! One crawl covers one thread's post listing. A thread with stored messages
//! resumes rather than restarts: the creation time of the last stored
//! message becomes the `ignore_before` bound, and a descending linear search
//! from the last known page count finds the page to continue from. Posts at
//! or before the bound are skipped; strictly newer posts are appended.
//!
//! Failures mid-crawl are captured into the thread record (`status = error`)
//! without losing already-collected messages; the next run redoes the work
//! from the last successfully recorded message.

use crate::crawler::fetcher::PageFetcher;
use crate::parse::{PageParser, PostListingPage};
use crate::store::{
    earliest_timestamp, DetailStatus, Message, RecordStore, ThreadDetail, ThreadSummary,
};
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use url::Url;

pub struct ThreadDetailCrawler {
    fetcher: Arc<PageFetcher>,
    parser: Arc<dyn PageParser>,
    store: Arc<RecordStore>,
    base_url: Url,
}

impl ThreadDetailCrawler {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        parser: Arc<dyn PageParser>,
        store: Arc<RecordStore>,
        base_url: Url,
    ) -> Self {
        Self {
            fetcher,
            parser,
            store,
            base_url,
        }
    }

    /// Crawls one thread's posts, resuming from the last stored message
    pub async fn crawl(&self, summary: &ThreadSummary) -> crate::Result<()> {
        let mut detail = match self.store.load_thread_detail(summary.id)? {
            Some(detail) => detail,
            None => {
                let detail = ThreadDetail::new(summary.id, summary.href.clone());
                self.store.write_thread_detail(&detail)?;
                detail
            }
        };

        tracing::info!(
            "Crawling posts for thread {} ({} stored messages)",
            detail.id,
            detail.messages.len()
        );

        match self.mine(&mut detail).await {
            Ok(()) => {
                detail.error = None;
            }
            Err(e) => {
                tracing::error!("Post crawl failed for thread {}: {}", detail.id, e);
                detail.status = DetailStatus::Error;
                detail.error = Some(e.to_string());
            }
        }

        self.store.write_thread_detail(&detail)?;
        Ok(())
    }

    async fn mine(&self, detail: &mut ThreadDetail) -> crate::Result<()> {
        let (mut page, ignore_before) = match detail.messages.last() {
            None => (1, earliest_timestamp()),
            Some(last) => {
                detail.status = DetailStatus::Reloading;
                let bound = last.creation;
                let resume = self
                    .find_resumption_page(&detail.href, detail.total_pages, bound)
                    .await?;
                (resume, bound)
            }
        };

        let mut url = page_url(&detail.href, page);

        loop {
            let listing = self.fetch_page(&url).await?;

            for post in listing.posts {
                // Already recorded on a previous run.
                if post.creation <= ignore_before {
                    continue;
                }
                detail.messages.push(Message {
                    official_id: post.official_id,
                    user_name: post.user_name,
                    user_href: post.user_href,
                    creation: post.creation,
                    message: post.message,
                });
            }

            detail.total_pages = page;
            detail.total_posts = detail.messages.len() as u64;
            detail.last_update = Utc::now();
            self.store.write_thread_detail(detail)?;

            match listing.next_page {
                Some(next) => {
                    url = next;
                    page += 1;
                }
                None => break,
            }
        }

        detail.status = DetailStatus::Complete;
        Ok(())
    }

    /// Descending linear search for the page to resume from
    ///
    /// Walks backward from the last known page count; the first page
    /// (scanning from the end) holding a post at or before `bound` is the
    /// resumption point. Page 1 if none qualifies.
    async fn find_resumption_page(
        &self,
        href: &str,
        total_pages: u32,
        bound: DateTime<FixedOffset>,
    ) -> crate::Result<u32> {
        let mut guess = total_pages.max(1);

        while guess > 1 {
            let url = page_url(href, guess);
            tracing::debug!("Checking resumption candidate {}", url);

            let listing = self.fetch_page(&url).await?;
            if listing.posts.iter().any(|p| p.creation <= bound) {
                break;
            }
            guess -= 1;
        }

        tracing::debug!("Resuming {} from page {}", href, guess);
        Ok(guess)
    }

    async fn fetch_page(&self, url: &str) -> crate::Result<PostListingPage> {
        self.fetcher
            .fetch_parsed(url, |body| self.parser.parse_post_listing(body, &self.base_url))
            .await
    }
}

/// Builds the URL of a specific page of a thread's post listing
fn page_url(href: &str, page: u32) -> String {
    if page <= 1 {
        return href.to_string();
    }
    if href.ends_with('/') {
        format!("{}page-{}", href, page)
    } else {
        format!("{}/page-{}", href, page)
    }
}
