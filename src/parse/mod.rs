//! Page parsing seam
//!
//! The crawl engine never touches HTML directly; it talks to a [`PageParser`]
//! that turns fetched markup into the structured fields a scrape step needs.
//! The shipped implementation handles the XenForo taxonomy
//! (`categories → subcategories → threads → posts`), but the crawlers only
//! depend on the trait.

mod timestamp;
mod xenforo;

pub use timestamp::parse_site_timestamp;
pub use xenforo::XenForoParser;

use chrono::{DateTime, FixedOffset};
use std::collections::BTreeSet;
use url::Url;

/// A category as listed on the forum front page, before ids are assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedCategory {
    pub title: String,
    pub href: String,
    pub subs: Vec<ScrapedSubCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedSubCategory {
    pub title: String,
    pub href: String,
    pub description: String,
}

/// One row of a subcategory's thread listing page
#[derive(Debug, Clone)]
pub struct ThreadEntry {
    pub title: String,
    pub href: String,
    pub member_href: Option<String>,
    pub member_name: Option<String>,
    pub date_thread: DateTime<FixedOffset>,
    pub tags: BTreeSet<String>,
    pub answers: String,
    pub visits: String,
    pub last_post: DateTime<FixedOffset>,
    pub is_fixed: bool,
}

/// One page of a thread listing, with its pagination metadata
#[derive(Debug, Clone)]
pub struct ThreadListingPage {
    pub total_pages: u32,
    pub entries: Vec<ThreadEntry>,
    pub next_page: Option<String>,
}

/// One post of a thread page
#[derive(Debug, Clone)]
pub struct PostEntry {
    pub official_id: String,
    pub user_name: Option<String>,
    pub user_href: Option<String>,
    pub creation: DateTime<FixedOffset>,
    pub message: String,
}

/// One page of a thread's post listing, with its pagination metadata
#[derive(Debug, Clone)]
pub struct PostListingPage {
    pub posts: Vec<PostEntry>,
    pub next_page: Option<String>,
}

/// Extraction functions the crawl engine needs from fetched markup
///
/// Implementations must be cheap to share across crawl tasks; parsing happens
/// synchronously on the calling task.
pub trait PageParser: Send + Sync {
    /// Extracts the category/subcategory tree from the forum front page
    fn parse_categories(&self, html: &str, base_url: &Url) -> crate::Result<Vec<ScrapedCategory>>;

    /// Extracts one page of a subcategory's thread listing
    fn parse_thread_listing(&self, html: &str, base_url: &Url)
        -> crate::Result<ThreadListingPage>;

    /// Extracts one page of a thread's posts
    fn parse_post_listing(&self, html: &str, base_url: &Url) -> crate::Result<PostListingPage>;
}
