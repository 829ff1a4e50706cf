use crate::pagination::{Page, PageCache, PageQuery};
use crate::types::{Result, StreamError};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Paginated CRUD access to one backend resource, with a page cache that every
/// successful mutation invalidates.
pub struct ResourceClient<T> {
    base_endpoint: String,
    resource: String,
    http: reqwest::Client,
    cache: PageCache<T>,
}

impl<T> ResourceClient<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(base_endpoint: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            base_endpoint: base_endpoint.into(),
            resource: resource.into(),
            http: reqwest::Client::new(),
            cache: PageCache::new(),
        }
    }

    pub fn collection_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_endpoint.trim_end_matches('/'),
            self.resource.trim_matches('/')
        )
    }

    pub fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    /// Fetch a page, serving it from the cache when possible
    pub async fn list(&self, query: PageQuery) -> Result<Page<T>> {
        if let Some(page) = self.cache.get(query).await {
            tracing::debug!(
                "Serving {} page {} (limit {}) from cache",
                self.resource,
                query.page,
                query.limit
            );
            return Ok(page);
        }

        let response = self
            .http
            .get(self.collection_url())
            .query(&[("page", query.page), ("limit", query.limit)])
            .send()
            .await?;
        let response = self.check_status(response, "list").await?;
        let page: Page<T> = response.json().await?;

        self.cache.insert(query, page.clone()).await;
        Ok(page)
    }

    pub async fn create(&self, item: &T) -> Result<T> {
        let response = self
            .http
            .post(self.collection_url())
            .json(item)
            .send()
            .await?;
        let created = self.check_status(response, "create").await?.json().await?;
        self.cache.invalidate_all().await;
        Ok(created)
    }

    pub async fn update(&self, id: &str, item: &T) -> Result<T> {
        let response = self.http.put(self.item_url(id)).json(item).send().await?;
        let updated = self.check_status(response, "update").await?.json().await?;
        self.cache.invalidate_all().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self.http.delete(self.item_url(id)).send().await?;
        self.check_status(response, "delete").await?;
        self.cache.invalidate_all().await;
        Ok(())
    }

    /// Forget every cached page
    pub async fn invalidate(&self) {
        self.cache.invalidate_all().await;
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        Err(StreamError::Connection(format!(
            "{} on resource '{}' failed with status: {}",
            operation,
            self.resource,
            response.status()
        )))
    }
}

/// Converts WebSocket endpoint to HTTP endpoint
pub fn ws_to_http_endpoint(ws_endpoint: &str) -> String {
    ws_endpoint
        .replace("ws://", "http://")
        .replace("wss://", "https://")
        .split('?')
        .next()
        .unwrap_or(ws_endpoint)
        .to_string()
}
