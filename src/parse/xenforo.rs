//! XenForo markup extraction
//!
//! Implements [`PageParser`] for the stock XenForo theme. Selectors target
//! the structural classes XenForo renders (`block--category`, `structItem`,
//! `message--post`, `pageNav`), which are stable across skins.

use crate::parse::{
    parse_site_timestamp, PageParser, PostEntry, PostListingPage, ScrapedCategory,
    ScrapedSubCategory, ThreadEntry, ThreadListingPage,
};
use crate::store::earliest_timestamp;
use crate::MinerError;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Parser for stock XenForo markup
pub struct XenForoParser {
    category_block: Selector,
    category_title: Selector,
    node: Selector,
    node_title: Selector,
    node_description: Selector,
    page_nav_item: Selector,
    next_link: Selector,
    thread_row: Selector,
    thread_title_anchor: Selector,
    thread_author: Selector,
    thread_time: Selector,
    meta_counts: Selector,
    latest_time: Selector,
    post_article: Selector,
    post_author: Selector,
    post_time: Selector,
    post_body: Selector,
}

fn selector(css: &'static str) -> crate::Result<Selector> {
    Selector::parse(css).map_err(|e| MinerError::Selector(format!("{}: {}", css, e)))
}

impl XenForoParser {
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            category_block: selector("div.block--category")?,
            category_title: selector("h2.block-header a")?,
            node: selector("div.node")?,
            node_title: selector("h3.node-title a")?,
            node_description: selector("div.node-description")?,
            page_nav_item: selector("ul.pageNav-main li")?,
            next_link: selector("a.pageNav-jump--next")?,
            thread_row: selector("div.structItem")?,
            thread_title_anchor: selector("div.structItem-title a")?,
            thread_author: selector("div.structItem-minor li a")?,
            thread_time: selector("time[datetime]")?,
            meta_counts: selector("div.structItem-cell--meta dl dd")?,
            latest_time: selector("div.structItem-cell--latest time[datetime]")?,
            post_article: selector("article.message--post")?,
            post_author: selector("div.message-cell--user a.username")?,
            post_time: selector("div.message-cell--main header time[datetime]")?,
            post_body: selector("div.bbWrapper")?,
        })
    }

    fn next_page_href(&self, document: &Html, base_url: &Url) -> Option<String> {
        document
            .select(&self.next_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| absolute(base_url, href))
    }

    /// Page count from the pagination controls; listings short enough to fit
    /// on one page render no controls at all.
    fn total_pages(&self, document: &Html) -> u32 {
        document
            .select(&self.page_nav_item)
            .last()
            .and_then(|li| collect_text(&li).parse().ok())
            .unwrap_or(1)
    }
}

impl PageParser for XenForoParser {
    fn parse_categories(&self, html: &str, base_url: &Url) -> crate::Result<Vec<ScrapedCategory>> {
        let document = Html::parse_document(html);
        let mut categories = Vec::new();

        for block in document.select(&self.category_block) {
            let header = block.select(&self.category_title).next().ok_or_else(|| {
                parse_error(base_url, "category block without a header anchor")
            })?;
            let title = collect_text(&header);
            let href = header
                .value()
                .attr("href")
                .map(|h| absolute(base_url, h))
                .ok_or_else(|| parse_error(base_url, "category header anchor without href"))?;

            let mut subs = Vec::new();
            for node in block.select(&self.node) {
                let Some(anchor) = node.select(&self.node_title).next() else {
                    continue;
                };
                let sub_href = match anchor.value().attr("href") {
                    Some(h) => absolute(base_url, h),
                    None => continue,
                };
                let description = node
                    .select(&self.node_description)
                    .next()
                    .map(|d| collect_text(&d))
                    .unwrap_or_default();

                subs.push(ScrapedSubCategory {
                    title: collect_text(&anchor),
                    href: sub_href,
                    description,
                });
            }

            categories.push(ScrapedCategory { title, href, subs });
        }

        if categories.is_empty() {
            return Err(parse_error(base_url, "no category blocks found"));
        }

        Ok(categories)
    }

    fn parse_thread_listing(
        &self,
        html: &str,
        base_url: &Url,
    ) -> crate::Result<ThreadListingPage> {
        let document = Html::parse_document(html);
        let mut entries = Vec::new();

        for row in document.select(&self.thread_row) {
            let anchors: Vec<ElementRef> = row.select(&self.thread_title_anchor).collect();
            // Rows without a title anchor are decoration, not threads.
            let Some(title_anchor) = anchors.last() else {
                continue;
            };
            let href = match title_anchor.value().attr("href") {
                Some(h) => absolute(base_url, h),
                None => continue,
            };
            let title = collect_text(title_anchor);

            // All anchors before the title are tag chips.
            let tags: BTreeSet<String> = anchors[..anchors.len() - 1]
                .iter()
                .map(collect_text)
                .collect();

            let author = row.select(&self.thread_author).next();
            let member_name = author.map(|a| collect_text(&a));
            let member_href = author
                .and_then(|a| a.value().attr("href"))
                .map(|h| absolute(base_url, h));

            let date_thread = row
                .select(&self.thread_time)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .and_then(|raw| parse_site_timestamp(raw).ok())
                .unwrap_or_else(earliest_timestamp);

            let counts: Vec<String> = row
                .select(&self.meta_counts)
                .map(|dd| collect_text(&dd))
                .collect();
            let answers = counts.first().cloned().unwrap_or_else(|| "0".to_string());
            let visits = counts.get(1).cloned().unwrap_or_else(|| "0".to_string());

            // Pinned threads carry no reliable activity timestamp; fall back
            // to the earliest bound like a missing latest cell.
            let last_post = row
                .select(&self.latest_time)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .and_then(|raw| parse_site_timestamp(raw).ok())
                .unwrap_or_else(earliest_timestamp);

            entries.push(ThreadEntry {
                title,
                href,
                member_href,
                member_name,
                date_thread,
                tags,
                answers,
                visits,
                last_post,
                is_fixed: has_sticky_ancestor(&row),
            });
        }

        Ok(ThreadListingPage {
            total_pages: self.total_pages(&document),
            entries,
            next_page: self.next_page_href(&document, base_url),
        })
    }

    fn parse_post_listing(&self, html: &str, base_url: &Url) -> crate::Result<PostListingPage> {
        let document = Html::parse_document(html);
        let mut posts = Vec::new();

        for article in document.select(&self.post_article) {
            let official_id = article
                .value()
                .attr("data-content")
                .ok_or_else(|| parse_error(base_url, "post article without data-content id"))?
                .to_string();

            let author = article.select(&self.post_author).next();
            let user_name = author.map(|a| collect_text(&a));
            let user_href = author
                .and_then(|a| a.value().attr("href"))
                .map(|h| absolute(base_url, h));

            let raw_creation = article
                .select(&self.post_time)
                .next()
                .and_then(|t| t.value().attr("datetime"))
                .ok_or_else(|| parse_error(base_url, "post article without creation time"))?;
            let creation = parse_site_timestamp(raw_creation)?;

            let message = article
                .select(&self.post_body)
                .next()
                .map(|body| body.inner_html())
                .ok_or_else(|| parse_error(base_url, "post article without message body"))?;

            posts.push(PostEntry {
                official_id,
                user_name,
                user_href,
                creation,
                message,
            });
        }

        Ok(PostListingPage {
            posts,
            next_page: self.next_page_href(&document, base_url),
        })
    }
}

fn parse_error(url: &Url, message: &str) -> MinerError {
    MinerError::Parse {
        url: url.to_string(),
        message: message.to_string(),
    }
}

fn collect_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn absolute(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// XenForo groups pinned threads under a container div carrying the sticky
/// modifier class; individual rows are unmarked.
fn has_sticky_ancestor(row: &ElementRef) -> bool {
    row.ancestors().filter_map(ElementRef::wrap).any(|el| {
        el.value()
            .classes()
            .any(|class| class == "structItemContainer-group--sticky")
    })
}
