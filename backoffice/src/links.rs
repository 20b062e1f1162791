//! Resolution of Drive file ids to public thumbnail URLs.
//!
//! A request first sweeps the Drive image listing page by page, then rescues
//! the requested ids the sweep did not surface with individual metadata
//! lookups. Both phases are bounded and neither ever fails the request.

use crate::metrics_defs::{
    LINKS_RESOLVED, RESCUE_FAILED, RESCUE_LOOKUPS, RESCUE_SKIPPED, SWEEP_FAILED, SWEEP_PAGES,
};
use google::FileCatalog;
use indexmap::IndexSet;
use shared::settle::{partition, settle_all};
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;

/// Drive query matching every image that is not in the trash.
pub const IMAGE_QUERY: &str = "mimeType contains 'image/' and trashed = false";
/// Files requested per listing page.
pub const SWEEP_PAGE_SIZE: u32 = 1000;
/// Listing pages read before the sweep gives up.
pub const SWEEP_PAGE_CAP: usize = 10;
/// Rescue only runs for fewer missing ids than this.
pub const RESCUE_CEILING: usize = 20;
/// Size parameter appended to every thumbnail URL.
pub const THUMBNAIL_SIZE: &str = "=s1600";

const HTTP_PREFIX: &str = "http://";

/// Rewrites a Drive thumbnail link to its canonical large, https form.
///
/// Any trailing `=s<size>` parameter is replaced, so the function is
/// idempotent.
pub fn normalize_thumbnail(link: &str) -> String {
    let link = link.trim();
    let secure = match link.get(..HTTP_PREFIX.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(HTTP_PREFIX) => {
            format!("https://{}", &link[HTTP_PREFIX.len()..])
        }
        _ => link.to_string(),
    };

    let base = match size_suffix_start(&secure) {
        Some(start) => &secure[..start],
        None => secure.as_str(),
    };
    format!("{base}{THUMBNAIL_SIZE}")
}

// Start of the last "=s<digits>" parameter, which runs to the end of the link.
fn size_suffix_start(link: &str) -> Option<usize> {
    let start = link.rfind("=s")?;
    let after = &link[start + 2..];
    after
        .starts_with(|c: char| c.is_ascii_digit())
        .then_some(start)
}

/// File id to thumbnail URL, built fresh for every request.
///
/// The first URL stored for an id is kept; later inserts for the same id
/// are ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkMap(HashMap<String, String>);

impl LinkMap {
    pub fn new() -> Self {
        LinkMap(HashMap::new())
    }

    /// Stores the URL unless the id already has one. Returns whether it was stored.
    pub fn insert(&mut self, id: impl Into<String>, url: impl Into<String>) -> bool {
        match self.0.entry(id.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(url.into());
                true
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct LinkResolver {
    catalog: Arc<dyn FileCatalog>,
}

impl LinkResolver {
    pub fn new(catalog: Arc<dyn FileCatalog>) -> Self {
        LinkResolver { catalog }
    }

    /// Builds the link map for a request that references `wanted` file ids.
    pub async fn resolve(&self, wanted: &IndexSet<String>) -> LinkMap {
        let mut links = LinkMap::new();
        self.sweep(&mut links).await;
        self.rescue(wanted, &mut links).await;

        histogram!(LINKS_RESOLVED).record(links.len() as f64);
        links
    }

    /// Lists every image in Drive, following page tokens up to the page cap.
    /// A failing page ends the sweep with whatever was collected so far.
    async fn sweep(&self, links: &mut LinkMap) {
        let mut page_token: Option<String> = None;
        let mut pages = 0;

        while pages < SWEEP_PAGE_CAP {
            let page = match self
                .catalog
                .list_files(IMAGE_QUERY, page_token.as_deref(), SWEEP_PAGE_SIZE)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(error = %e, pages, "Drive sweep failed, continuing with partial links");
                    counter!(SWEEP_FAILED).increment(1);
                    break;
                }
            };
            pages += 1;

            for file in page.files {
                if let Some(link) = file.thumbnail_link {
                    links.insert(file.id, normalize_thumbnail(&link));
                }
            }

            page_token = page.next_page_token.filter(|token| !token.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        if page_token.is_some() && pages == SWEEP_PAGE_CAP {
            tracing::info!(pages, "Drive sweep stopped at page cap");
        }

        histogram!(SWEEP_PAGES).record(pages as f64);
        tracing::debug!(pages, links = links.len(), "Drive sweep finished");
    }

    /// Looks up the wanted ids the sweep missed, one request per id, when
    /// there are fewer than `RESCUE_CEILING` of them.
    async fn rescue(&self, wanted: &IndexSet<String>, links: &mut LinkMap) {
        let missing: Vec<String> = wanted
            .iter()
            .filter(|id| !links.contains(id))
            .cloned()
            .collect();

        if missing.is_empty() {
            return;
        }
        if missing.len() >= RESCUE_CEILING {
            tracing::warn!(
                missing = missing.len(),
                "Too many unresolved images, skipping rescue"
            );
            counter!(RESCUE_SKIPPED).increment(1);
            return;
        }

        counter!(RESCUE_LOOKUPS).increment(missing.len() as u64);

        let settled = settle_all(missing, |id| {
            let catalog = self.catalog.clone();
            async move { catalog.file_metadata(&id).await }
        })
        .await;

        let (found, failed) = partition(settled);

        for (id, error) in failed {
            tracing::warn!(file_id = %id, error = %error, "Could not rescue image link");
            counter!(RESCUE_FAILED).increment(1);
        }

        for (id, file) in found {
            match file.thumbnail_link {
                Some(link) => {
                    links.insert(id, normalize_thumbnail(&link));
                }
                None => tracing::debug!(file_id = %id, "Rescued file has no thumbnail"),
            }
        }
    }
}
