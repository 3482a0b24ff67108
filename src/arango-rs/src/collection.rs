use arango_core::{CollectionInfo, CollectionType, Error, Request, Response, Result};
use serde_json::{json, Value};

use crate::connection::{is_valid_collection_name, Connection};
use crate::document::Documents;
use crate::edge::Edges;
use crate::index::Indexes;

const COLLECTION_PATH: &str = "/_api/collection";

/// One named collection on the server
#[derive(Debug, Clone)]
pub struct Collection {
    conn: Connection,
    name: String,
}

impl Collection {
    pub(crate) fn new(conn: Connection, name: String) -> Self {
        Self { conn, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Documents proxy for this collection
    pub fn documents(&self) -> Documents {
        Documents::new(self.clone())
    }

    /// Edges proxy for this collection
    pub fn edges(&self) -> Edges {
        Edges::new(self.clone())
    }

    pub fn indexes(&self) -> Indexes {
        Indexes::new(self.clone())
    }

    fn path(&self, resource: &str) -> String {
        if resource.is_empty() {
            format!("{}/{}", COLLECTION_PATH, self.name)
        } else {
            format!("{}/{}/{}", COLLECTION_PATH, self.name, resource)
        }
    }

    pub(crate) async fn send(&self, request: Request) -> Result<Response> {
        self.conn.send(request).await
    }

    /// Create a document collection
    pub async fn create(&self) -> Result<CollectionInfo> {
        self.create_with(CollectionType::Document, false).await
    }

    /// Create an edge collection
    pub async fn create_edges(&self) -> Result<CollectionInfo> {
        self.create_with(CollectionType::Edge, false).await
    }

    #[tracing::instrument(skip(self), fields(collection = %self.name))]
    pub async fn create_with(
        &self,
        kind: CollectionType,
        wait_for_sync: bool,
    ) -> Result<CollectionInfo> {
        let request = Request::post(COLLECTION_PATH).json(json!({
            "name": self.name,
            "type": kind.code(),
            "waitForSync": wait_for_sync,
        }));

        let response = self.send(request).await?;
        if response.status == 409 {
            return Err(Error::AlreadyExists(format!("collection {}", self.name)));
        }

        let info = serde_json::from_value(response.error_for_status()?.body)?;
        tracing::info!("Collection created");
        Ok(info)
    }

    /// Drop the collection and everything in it
    pub async fn delete(&self) -> Result<()> {
        let response = self.send(Request::delete(self.path(""))).await?;
        self.check_found(response)?;
        tracing::info!(collection = %self.name, "Collection deleted");
        Ok(())
    }

    /// Remove all documents, keep the collection
    pub async fn truncate(&self) -> Result<()> {
        let response = self.send(Request::put(self.path("truncate"))).await?;
        self.check_found(response)?;
        Ok(())
    }

    /// Load the collection into server memory
    pub async fn load(&self) -> Result<CollectionInfo> {
        let response = self.send(Request::put(self.path("load"))).await?;
        Ok(serde_json::from_value(self.check_found(response)?.body)?)
    }

    /// Unload the collection from server memory
    pub async fn unload(&self) -> Result<CollectionInfo> {
        let response = self.send(Request::put(self.path("unload"))).await?;
        Ok(serde_json::from_value(self.check_found(response)?.body)?)
    }

    /// Number of documents (or edges) in the collection
    pub async fn count(&self) -> Result<u64> {
        let response = self.send(Request::get(self.path("count"))).await?;
        let response = self.check_found(response)?;
        response
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::InvalidResponse("count missing from reply".to_string()))
    }

    pub async fn info(&self) -> Result<CollectionInfo> {
        let response = self.send(Request::get(self.path(""))).await?;
        Ok(serde_json::from_value(self.check_found(response)?.body)?)
    }

    /// Raw storage figures as reported by the server
    pub async fn figures(&self) -> Result<Value> {
        let response = self.send(Request::get(self.path("figures"))).await?;
        let response = self.check_found(response)?;
        Ok(response.get("figures").cloned().unwrap_or(Value::Null))
    }

    pub async fn properties(&self) -> Result<CollectionInfo> {
        let response = self.send(Request::get(self.path("properties"))).await?;
        Ok(serde_json::from_value(self.check_found(response)?.body)?)
    }

    pub async fn set_properties(&self, wait_for_sync: bool) -> Result<CollectionInfo> {
        let request =
            Request::put(self.path("properties")).json(json!({ "waitForSync": wait_for_sync }));
        let response = self.send(request).await?;
        Ok(serde_json::from_value(self.check_found(response)?.body)?)
    }

    /// Rename the collection; this handle follows the new name
    #[tracing::instrument(skip(self), fields(collection = %self.name))]
    pub async fn rename(&mut self, new_name: &str) -> Result<()> {
        if !is_valid_collection_name(new_name) {
            return Err(Error::InvalidCollectionName(new_name.to_string()));
        }

        let request = Request::put(self.path("rename")).json(json!({ "name": new_name }));
        let response = self.send(request).await?;
        if response.status == 409 {
            return Err(Error::AlreadyExists(format!("collection {}", new_name)));
        }
        self.check_found(response)?;

        tracing::info!(new_name, "Collection renamed");
        self.name = new_name.to_string();
        Ok(())
    }

    fn check_found(&self, response: Response) -> Result<Response> {
        if response.status == 404 {
            return Err(Error::NotFound(format!("collection {}", self.name)));
        }
        response.error_for_status()
    }
}
