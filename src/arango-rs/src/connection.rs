use arango_core::{
    CollectionInfo, ConnectionConfig, CursorRequest, Error, HttpTransport, Request, Response,
    Result, Resultset, Transport,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::collection::Collection;
use crate::cursor::Cursor;

const COLLECTIONS_PATH: &str = "/_api/collection";

/// Connection to a remote store
///
/// Cheap to clone; every clone shares the same transport.
#[derive(Clone)]
pub struct Connection {
    transport: Arc<dyn Transport>,
    url: String,
}

impl Connection {
    /// Connect over HTTP(S) using the given options
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        tracing::info!(url = %config.url(), "Connection created");
        Ok(Self {
            transport: Arc::new(transport),
            url: config.url(),
        })
    }

    /// Use a custom transport, e.g. a proxy or an in-memory store
    pub fn with_transport(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Typed handle for the collection called `name`; no request is issued
    pub fn collection(&self, name: &str) -> Result<Collection> {
        if !is_valid_collection_name(name) {
            return Err(Error::InvalidCollectionName(name.to_string()));
        }
        Ok(Collection::new(self.clone(), name.to_string()))
    }

    /// Handle for a name the server reported, e.g. a system collection
    /// such as `_graphs` that user code cannot name directly
    pub(crate) fn collection_unchecked(&self, name: &str) -> Collection {
        Collection::new(self.clone(), name.to_string())
    }

    /// Collections that exist on the server
    #[tracing::instrument(skip(self))]
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let response = self
            .send(Request::get(COLLECTIONS_PATH))
            .await?
            .error_for_status()?;

        // legacy servers answer with `collections`, newer ones with `result`
        let list = response
            .get("collections")
            .or_else(|| response.get("result"))
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));

        Ok(serde_json::from_value(list)?)
    }

    /// Names of the collections that exist on the server
    pub async fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self
            .list_collections()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Run a query through the cursor API; the query string is passed through as-is
    pub fn query(&self, request: CursorRequest) -> Resultset<Cursor> {
        Resultset::new(Cursor::new(self.clone(), request))
    }

    pub(crate) async fn send(&self, request: Request) -> Result<Response> {
        self.transport.send(request).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("url", &self.url).finish()
    }
}

/// Collection names start with a letter, followed by letters, digits, `_` or `-`
pub(crate) fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
