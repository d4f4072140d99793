//! Category tree discovery and reconciliation
//!
//! The live category/subcategory tree is scraped on every startup and
//! reconciled against the stored tree. Matching is by (title, href): site
//! content is the stable identity, positions are not. Matched entries keep
//! their ids; new entries get fresh ids; entries that vanished from the live
//! site are appended back unchanged, so no historical id or record is ever
//! lost. Disappearance from the live page is not deletion.

use crate::crawler::fetcher::PageFetcher;
use crate::parse::{PageParser, ScrapedCategory, ScrapedSubCategory};
use crate::store::{
    earliest_timestamp, Category, IdAllocator, RecordStore, StoreResult, SubCategory,
};
use std::sync::Arc;
use url::Url;

pub struct CategoryDiscoverer {
    fetcher: Arc<PageFetcher>,
    parser: Arc<dyn PageParser>,
    store: Arc<RecordStore>,
    ids: Arc<IdAllocator>,
}

impl CategoryDiscoverer {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        parser: Arc<dyn PageParser>,
        store: Arc<RecordStore>,
        ids: Arc<IdAllocator>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            store,
            ids,
        }
    }

    /// Scrapes the live tree and returns the reconciled category tree,
    /// persisting it when anything changed
    pub async fn discover(&self, base_url: &Url) -> crate::Result<Vec<Category>> {
        tracing::info!("Discovering categories from {}", base_url);

        let live = self
            .fetcher
            .fetch_parsed(base_url.as_str(), |body| {
                self.parser.parse_categories(body, base_url)
            })
            .await?;

        let categories = match self.store.load_categories()? {
            None => {
                // First run: everything is new, no reconciliation needed.
                let mut categories = Vec::with_capacity(live.len());
                for scraped in live {
                    categories.push(fresh_category(scraped, &self.ids)?);
                }
                self.store.write_categories(&categories)?;
                tracing::info!("Stored initial category tree ({} categories)", categories.len());
                categories
            }
            Some(stored) => {
                let (categories, changed) = reconcile(live, stored, &self.ids)?;
                if changed {
                    self.store.write_categories(&categories)?;
                    tracing::info!("Category tree changed, persisted reconciled tree");
                }
                categories
            }
        };

        let sub_count: usize = categories.iter().map(|c| c.subs.len()).sum();
        tracing::info!(
            "Category discovery complete: {} categories, {} subcategories",
            categories.len(),
            sub_count
        );

        Ok(categories)
    }
}

fn fresh_sub(scraped: ScrapedSubCategory, ids: &IdAllocator) -> StoreResult<SubCategory> {
    Ok(SubCategory {
        id: ids.next_id()?,
        title: scraped.title,
        href: scraped.href,
        description: scraped.description,
        last_update: earliest_timestamp(),
        complete: false,
    })
}

fn fresh_category(scraped: ScrapedCategory, ids: &IdAllocator) -> StoreResult<Category> {
    let id = ids.next_id()?;
    let mut subs = Vec::with_capacity(scraped.subs.len());
    for sub in scraped.subs {
        subs.push(fresh_sub(sub, ids)?);
    }
    Ok(Category {
        id,
        title: scraped.title,
        href: scraped.href,
        subs,
    })
}

/// Reconciles the live tree against the stored one
///
/// Returns the merged tree and whether anything changed (new entries
/// allocated, or vanished stored entries reinserted). Matched flags live in
/// transient side-vectors indexed like `stored`, never on the records.
pub fn reconcile(
    live: Vec<ScrapedCategory>,
    stored: Vec<Category>,
    ids: &IdAllocator,
) -> StoreResult<(Vec<Category>, bool)> {
    let mut changed = false;
    let mut cat_matched = vec![false; stored.len()];
    let mut sub_matched: Vec<Vec<bool>> = stored.iter().map(|c| vec![false; c.subs.len()]).collect();

    let mut result = Vec::with_capacity(live.len());

    for live_cat in live {
        let found = stored
            .iter()
            .position(|s| s.title == live_cat.title && s.href == live_cat.href);

        match found {
            Some(ci) => {
                cat_matched[ci] = true;
                let stored_cat = &stored[ci];

                let mut subs = Vec::with_capacity(live_cat.subs.len());
                for live_sub in live_cat.subs {
                    let sub_found = stored_cat
                        .subs
                        .iter()
                        .position(|s| s.title == live_sub.title && s.href == live_sub.href);

                    match sub_found {
                        Some(si) => {
                            sub_matched[ci][si] = true;
                            let stored_sub = &stored_cat.subs[si];
                            subs.push(SubCategory {
                                id: stored_sub.id,
                                title: live_sub.title,
                                href: live_sub.href,
                                description: live_sub.description,
                                last_update: stored_sub.last_update,
                                complete: stored_sub.complete,
                            });
                        }
                        None => {
                            tracing::info!(
                                "New subcategory discovered: {} ({})",
                                live_sub.title,
                                live_sub.href
                            );
                            changed = true;
                            subs.push(fresh_sub(live_sub, ids)?);
                        }
                    }
                }

                result.push(Category {
                    id: stored_cat.id,
                    title: stored_cat.title.clone(),
                    href: stored_cat.href.clone(),
                    subs,
                });
            }
            None => {
                tracing::info!(
                    "New category discovered: {} ({})",
                    live_cat.title,
                    live_cat.href
                );
                changed = true;
                result.push(fresh_category(live_cat, ids)?);
            }
        }
    }

    // Reinsert everything stored that the live site no longer shows.
    for (ci, stored_cat) in stored.iter().enumerate() {
        if !cat_matched[ci] {
            tracing::warn!(
                "Category vanished from live site, keeping stored record: {}",
                stored_cat.title
            );
            changed = true;
            result.push(stored_cat.clone());
            continue;
        }

        for (si, stored_sub) in stored_cat.subs.iter().enumerate() {
            if !sub_matched[ci][si] {
                tracing::warn!(
                    "Subcategory vanished from live site, keeping stored record: {}",
                    stored_sub.title
                );
                changed = true;
                if let Some(result_cat) = result.iter_mut().find(|c| c.id == stored_cat.id) {
                    result_cat.subs.push(stored_sub.clone());
                }
            }
        }
    }

    Ok((result, changed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DomainConfig;
    use tempfile::TempDir;

    fn allocator(dir: &TempDir) -> Arc<IdAllocator> {
        let store = Arc::new(RecordStore::open(dir.path(), "forum.example.com").unwrap());
        store
            .write_domain_config(&DomainConfig {
                domain: "forum.example.com".to_string(),
                url: "https://forum.example.com".to_string(),
                last_id: 0,
            })
            .unwrap();
        Arc::new(IdAllocator::new(store))
    }

    fn scraped(title: &str, href: &str, subs: Vec<(&str, &str)>) -> ScrapedCategory {
        ScrapedCategory {
            title: title.to_string(),
            href: href.to_string(),
            subs: subs
                .into_iter()
                .map(|(t, h)| ScrapedSubCategory {
                    title: t.to_string(),
                    href: h.to_string(),
                    description: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_first_allocation_then_stable_ids() {
        let dir = TempDir::new().unwrap();
        let ids = allocator(&dir);

        let live = vec![scraped("A", "/forum/a", vec![("General", "/forum/general")])];
        let first = fresh_category(live[0].clone(), &ids).unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.subs[0].id, 1);

        // Re-discovering the unchanged tree keeps every id and reports no change.
        let (tree, changed) = reconcile(live, vec![first.clone()], &ids).unwrap();
        assert!(!changed);
        assert_eq!(tree[0].id, 0);
        assert_eq!(tree[0].subs[0].id, 1);
    }

    #[test]
    fn test_new_subcategory_gets_new_id() {
        let dir = TempDir::new().unwrap();
        let ids = allocator(&dir);

        let stored = vec![
            fresh_category(
                scraped("A", "/forum/a", vec![("General", "/forum/general")]),
                &ids,
            )
            .unwrap(),
        ];

        let live = vec![scraped(
            "A",
            "/forum/a",
            vec![("General", "/forum/general"), ("News", "/forum/news")],
        )];

        let (tree, changed) = reconcile(live, stored, &ids).unwrap();
        assert!(changed);
        assert_eq!(tree[0].subs[0].title, "General");
        assert_eq!(tree[0].subs[0].id, 1);
        assert_eq!(tree[0].subs[1].title, "News");
        assert_eq!(tree[0].subs[1].id, 2);
    }

    #[test]
    fn test_vanished_category_is_reinserted() {
        let dir = TempDir::new().unwrap();
        let ids = allocator(&dir);

        let stored = vec![
            fresh_category(scraped("A", "/forum/a", vec![("G", "/forum/g")]), &ids).unwrap(),
            fresh_category(scraped("B", "/forum/b", vec![("H", "/forum/h")]), &ids).unwrap(),
        ];

        // B disappeared from the live page.
        let live = vec![scraped("A", "/forum/a", vec![("G", "/forum/g")])];

        let (tree, changed) = reconcile(live, stored, &ids).unwrap();
        assert!(changed);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1].title, "B");
        assert_eq!(tree[1].subs[0].title, "H");
    }

    #[test]
    fn test_vanished_subcategory_is_reinserted() {
        let dir = TempDir::new().unwrap();
        let ids = allocator(&dir);

        let stored = vec![fresh_category(
            scraped("A", "/forum/a", vec![("G", "/forum/g"), ("H", "/forum/h")]),
            &ids,
        )
        .unwrap()];
        let h_id = stored[0].subs[1].id;

        let live = vec![scraped("A", "/forum/a", vec![("G", "/forum/g")])];

        let (tree, changed) = reconcile(live, stored, &ids).unwrap();
        assert!(changed);
        assert_eq!(tree[0].subs.len(), 2);
        assert_eq!(tree[0].subs[1].id, h_id);
    }

    #[test]
    fn test_renamed_subcategory_is_both_new_and_kept() {
        let dir = TempDir::new().unwrap();
        let ids = allocator(&dir);

        let stored = vec![fresh_category(
            scraped("A", "/forum/a", vec![("Old Name", "/forum/g")]),
            &ids,
        )
        .unwrap()];

        // A rename breaks the (title, href) identity: the new title gets a
        // fresh id and the old record is preserved alongside it.
        let live = vec![scraped("A", "/forum/a", vec![("New Name", "/forum/g")])];

        let (tree, changed) = reconcile(live, stored, &ids).unwrap();
        assert!(changed);
        assert_eq!(tree[0].subs.len(), 2);
        assert_eq!(tree[0].subs[0].title, "New Name");
        assert_eq!(tree[0].subs[1].title, "Old Name");
        assert_ne!(tree[0].subs[0].id, tree[0].subs[1].id);
    }
}
