//! Persisted record types
//!
//! Everything the miner keeps on disk is one of these structures, serialized
//! as a whole JSON document. Records are created on first discovery and only
//! ever grow or heal; nothing is deleted when the live site drops content.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The minimum representable timestamp, used as the "process everything"
/// bound and as the fallback for records persisted before `last_post` existed.
pub fn earliest_timestamp() -> DateTime<FixedOffset> {
    DateTime::<Utc>::MIN_UTC.fixed_offset()
}

/// Per-domain config record: one per mined domain, holds the id counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub domain: String,
    pub url: String,
    pub last_id: u64,
}

/// A top-level forum category with its subcategories
///
/// Identity across runs is the pair (title, href); the id is a local
/// invariant assigned once and never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub title: String,
    pub href: String,
    pub subs: Vec<SubCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCategory {
    pub id: u64,
    pub title: String,
    pub href: String,
    pub description: String,
    #[serde(default = "earliest_timestamp")]
    pub last_update: DateTime<FixedOffset>,
    #[serde(default)]
    pub complete: bool,
}

/// One entry of a subcategory's thread listing
///
/// Identity across runs is `href`. `last_post` is the listing's last-activity
/// timestamp and drives the incremental cutoff; `is_fixed` marks pinned
/// threads, which sites render first regardless of recency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: u64,
    pub category_id: u64,
    pub subcategory_id: u64,
    pub title: String,
    pub href: String,
    pub member_href: Option<String>,
    pub member_name: Option<String>,
    pub date_thread: DateTime<FixedOffset>,
    pub tags: BTreeSet<String>,
    pub answers: String,
    pub visits: String,
    #[serde(default = "earliest_timestamp")]
    pub last_post: DateTime<FixedOffset>,
    #[serde(default)]
    pub is_fixed: bool,
}

/// Crawl status of a subcategory index file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Started,
    Complete,
}

/// One file per subcategory: the accumulated thread listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcategoryIndex {
    pub url: String,
    pub category_id: u64,
    pub subcategory_id: u64,
    pub threads: Vec<ThreadSummary>,
    pub status: IndexStatus,
    pub total_pages: u32,
    pub total_threads: u64,
}

impl SubcategoryIndex {
    pub fn new(url: String, category_id: u64, subcategory_id: u64) -> Self {
        Self {
            url,
            category_id,
            subcategory_id,
            threads: Vec::new(),
            status: IndexStatus::Started,
            total_pages: 0,
            total_threads: 0,
        }
    }

    /// Newest `last_post` among stored non-fixed threads, or the earliest
    /// representable timestamp when the index holds none.
    ///
    /// Pinned threads are excluded: they sit at the top of every listing
    /// page no matter how stale they are, so their activity timestamp says
    /// nothing about where the new content ends.
    pub fn activity_cutoff(&self) -> DateTime<FixedOffset> {
        self.threads
            .iter()
            .filter(|t| !t.is_fixed)
            .map(|t| t.last_post)
            .max()
            .unwrap_or_else(earliest_timestamp)
    }
}

/// Crawl status of a thread detail file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailStatus {
    Incomplete,
    Reloading,
    Complete,
    Error,
}

/// One post inside a thread, in site-assigned order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub official_id: String,
    pub user_name: Option<String>,
    pub user_href: Option<String>,
    pub creation: DateTime<FixedOffset>,
    pub message: String,
}

/// One file per thread: the accumulated message log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub id: u64,
    pub href: String,
    pub status: DetailStatus,
    pub started: DateTime<Utc>,
    pub total_pages: u32,
    pub total_posts: u64,
    pub last_update: DateTime<Utc>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ThreadDetail {
    pub fn new(id: u64, href: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            href,
            status: DetailStatus::Incomplete,
            started: now,
            total_pages: 1,
            total_posts: 0,
            last_update: now,
            messages: Vec::new(),
            error: None,
        }
    }
}
