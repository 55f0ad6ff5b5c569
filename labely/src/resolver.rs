//! Looking up the display names of item ids.
use std::{collections::HashMap, path::Path, sync::Arc};

use async_trait::async_trait;
use label_api_types::{ItemType, ResolvedItem};
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request to the item store failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("item store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid item store url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Catalog(#[from] toml::de::Error),
}

/// Something that knows the names of products and materials.
///
/// Implementations must not have side effects, since lookups for the ids of
/// a single sheet run concurrently.
#[async_trait]
pub trait ItemResolver: Send + Sync {
    /// Returns `None` when there is no item with this id.
    async fn resolve(&self, id: &str, item_type: ItemType) -> Result<Option<ResolvedItem>, ResolveError>;
}

#[async_trait]
impl<R: ItemResolver + ?Sized> ItemResolver for Arc<R> {
    async fn resolve(&self, id: &str, item_type: ItemType) -> Result<Option<ResolvedItem>, ResolveError> {
        (**self).resolve(id, item_type).await
    }
}

/// A fixed, in-memory catalog of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogResolver {
    #[serde(default)]
    products: HashMap<String, String>,
    #[serde(default)]
    materials: HashMap<String, String>,
}

impl CatalogResolver {
    pub fn new() -> Self {
        Default::default()
    }

    /// Parse a catalog from TOML with a `[products]` and a `[materials]` table,
    /// each mapping ids to names.
    pub fn from_toml(contents: &str) -> Result<Self, ResolveError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ResolveError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn with_item<I, N>(mut self, item_type: ItemType, id: I, name: N) -> Self
    where
        I: ToString,
        N: ToString,
    {
        self.collection_mut(item_type).insert(id.to_string(), name.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.products.len() + self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collection(&self, item_type: ItemType) -> &HashMap<String, String> {
        match item_type {
            ItemType::Product => &self.products,
            ItemType::Material => &self.materials,
        }
    }

    fn collection_mut(&mut self, item_type: ItemType) -> &mut HashMap<String, String> {
        match item_type {
            ItemType::Product => &mut self.products,
            ItemType::Material => &mut self.materials,
        }
    }
}

#[async_trait]
impl ItemResolver for CatalogResolver {
    async fn resolve(&self, id: &str, item_type: ItemType) -> Result<Option<ResolvedItem>, ResolveError> {
        Ok(self.collection(item_type).get(id).map(|name| ResolvedItem {
            id: id.to_string(),
            name: name.to_string(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    name: Option<String>,
}

/// Looks items up in a document store over HTTP.
///
/// An item of type `product` with id `P001` is fetched from
/// `{base}/products/P001`, which is expected to answer with a JSON document
/// carrying a `name`.
pub struct StoreResolver {
    base: Url,
    token: Option<String>,

    client: Arc<Client>,
}

impl StoreResolver {
    pub fn new<U>(base: U, token: Option<String>) -> Result<Self, ResolveError>
    where
        U: AsRef<str>,
    {
        // Url::join drops the last path segment unless the base ends in a slash.
        let mut base = base.as_ref().trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            base: Url::parse(&base)?,
            token: token.filter(|t| !t.trim().is_empty()),
            client: Arc::new(Client::builder().build()?),
        })
    }

    fn url(&self, id: &str, item_type: ItemType) -> Result<Url, ResolveError> {
        Ok(self
            .base
            .join(&format!("{}/{}", item_type.collection(), urlencoding::encode(id)))?)
    }
}

#[async_trait]
impl ItemResolver for StoreResolver {
    async fn resolve(&self, id: &str, item_type: ItemType) -> Result<Option<ResolvedItem>, ResolveError> {
        // `.` and `..` are path segments that the URL join collapses, so they
        // would name the collection or the store root instead of a document.
        if id.trim_matches('.').is_empty() {
            return Ok(None);
        }

        let mut rb = self
            .client
            .get(self.url(id, item_type)?)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }

        let resp = rb.send().await?;
        match resp.status() {
            StatusCode::OK => (),
            StatusCode::NOT_FOUND => return Ok(None),
            s => {
                return Err(ResolveError::Status {
                    status: s,
                    body: resp.text().await?,
                })
            }
        };

        let document: StoreDocument = resp.json().await?;
        Ok(document.name.map(|name| ResolvedItem {
            id: id.to_string(),
            name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const CATALOG: &str = r#"
[products]
P001 = "Red rose bouquet"
P002 = "Sunflower basket"

[materials]
M001 = "Kraft wrapping paper"
"#;

    #[tokio::test]
    async fn test_catalog_from_toml() {
        let catalog = CatalogResolver::from_toml(CATALOG).unwrap();
        assert_eq!(catalog.len(), 3);

        let rose = catalog.resolve("P001", ItemType::Product).await.unwrap();
        assert_eq!(
            rose,
            Some(ResolvedItem {
                id: "P001".to_string(),
                name: "Red rose bouquet".to_string(),
            })
        );

        // Ids only resolve within their own collection.
        assert_eq!(catalog.resolve("M001", ItemType::Product).await.unwrap(), None);
        assert!(catalog.resolve("M001", ItemType::Material).await.unwrap().is_some());
    }

    #[test]
    fn test_catalog_missing_tables() {
        let catalog = CatalogResolver::from_toml("[materials]\nM9 = \"Ribbon\"\n").unwrap();
        assert_eq!(catalog, CatalogResolver::new().with_item(ItemType::Material, "M9", "Ribbon"));

        assert!(CatalogResolver::from_toml("").unwrap().is_empty());
        assert!(CatalogResolver::from_toml("products = 4").is_err());
    }

    #[test]
    fn test_catalog_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, CATALOG).unwrap();

        assert_eq!(CatalogResolver::from_file(&path).unwrap().len(), 3);
        assert!(matches!(
            CatalogResolver::from_file(dir.path().join("missing.toml")),
            Err(ResolveError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_store_resolves_found_item() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/v1/products/P-001")
                .header("authorization", "Bearer token123");
            then.status(200).json_body(json!({ "name": "Tulip vase", "price": 12 }));
        });

        let resolver = StoreResolver::new(server.url("/v1"), Some("token123".to_string())).unwrap();
        let result = resolver.resolve("P-001", ItemType::Product).await.unwrap();

        mock.assert();
        assert_eq!(
            result,
            Some(ResolvedItem {
                id: "P-001".to_string(),
                name: "Tulip vase".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_store_not_found_is_none() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/materials/M404");
            then.status(404);
        });

        let resolver = StoreResolver::new(server.base_url(), None).unwrap();
        let result = resolver.resolve("M404", ItemType::Material).await.unwrap();

        mock.assert();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_store_dot_ids_are_not_looked_up() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET");
            then.status(200).json_body(json!({ "name": "Store root" }));
        });

        let resolver = StoreResolver::new(format!("{}/v1", server.base_url()), None).unwrap();
        for id in [".", "..", "..."] {
            assert_eq!(resolver.resolve(id, ItemType::Product).await.unwrap(), None, "id {:?}", id);
        }

        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_store_document_without_name_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/products/P003");
            then.status(200).json_body(json!({ "sku": "P003" }));
        });

        let resolver = StoreResolver::new(server.base_url(), None).unwrap();
        assert_eq!(resolver.resolve("P003", ItemType::Product).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_server_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/products/P001");
            then.status(500).body("boom");
        });

        let resolver = StoreResolver::new(server.base_url(), None).unwrap();
        match resolver.resolve("P001", ItemType::Product).await {
            Err(ResolveError::Status { status, body }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("expected a status error, got {:?}", other),
        }
    }
}
