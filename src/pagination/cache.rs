use super::{Page, PageQuery};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Memoises fetched pages until a mutation invalidates them.
pub struct PageCache<T> {
    pages: RwLock<HashMap<PageQuery, Page<T>>>,
}

impl<T: Clone> PageCache<T> {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, query: PageQuery) -> Option<Page<T>> {
        self.pages.read().await.get(&query).cloned()
    }

    pub async fn insert(&self, query: PageQuery, page: Page<T>) {
        self.pages.write().await.insert(query, page);
    }

    /// Drop every cached page; totals and page boundaries may all have shifted
    pub async fn invalidate_all(&self) {
        let mut pages = self.pages.write().await;
        if !pages.is_empty() {
            tracing::debug!("Invalidating {} cached pages", pages.len());
        }
        pages.clear();
    }

    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pages.read().await.is_empty()
    }
}

impl<T: Clone> Default for PageCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
