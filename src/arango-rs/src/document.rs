use arango_core::{
    models::{split_meta, user_body},
    Body, CreateOptions, DocumentHandle, DocumentRecord, Error, Request, Response, Result,
    ResultSource, Resultset,
};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::collection::Collection;
use crate::connection::Connection;
use crate::entity::{expect_found, require_persisted, require_transient, AsHandle, EntityState};

const DOCUMENT_PATH: &str = "/_api/document";

pub(crate) fn document_path(handle: &DocumentHandle) -> String {
    format!("{}/{}", DOCUMENT_PATH, handle.to_path())
}

/// Fetch one document by handle; 404 becomes `NotFound`
pub(crate) async fn fetch_document(conn: &Connection, handle: &DocumentHandle) -> Result<Document> {
    let collection = conn.collection_unchecked(handle.collection());
    let response = conn.send(Request::get(document_path(handle))).await?;
    let response = expect_found(response, handle)?;
    let record = DocumentRecord::from_value(response.body.clone())?;
    Ok(Document::from_record(collection, record, Some(response)))
}

/// Whether a document exists, checked with a HEAD request
pub(crate) async fn document_exists(conn: &Connection, handle: &DocumentHandle) -> Result<bool> {
    let response = conn.send(Request::head(document_path(handle))).await?;
    if response.status == 404 {
        return Ok(false);
    }
    response.error_for_status()?;
    Ok(true)
}

/// Documents proxy between `Collection` and `Document`
#[derive(Debug, Clone)]
pub struct Documents {
    collection: Collection,
}

impl Documents {
    pub(crate) fn new(collection: Collection) -> Self {
        Self { collection }
    }

    /// Create a new document holding `body`
    pub async fn create(&self, body: Body) -> Result<Document> {
        self.create_with(body, CreateOptions::default()).await
    }

    pub async fn create_with(&self, body: Body, options: CreateOptions) -> Result<Document> {
        let mut doc = Document::new(self.collection.clone());
        doc.body = user_body(body);
        doc.create_with(options).await?;
        Ok(doc)
    }

    /// Fetch a document by handle
    pub async fn get(&self, handle: impl AsHandle) -> Result<Document> {
        fetch_document(self.collection.connection(), &handle.to_handle()?).await
    }

    pub async fn exists(&self, handle: impl AsHandle) -> Result<bool> {
        document_exists(self.collection.connection(), &handle.to_handle()?).await
    }

    /// Every document in the collection, fetched one by one while iterating
    pub fn all(&self) -> Resultset<DocumentListing> {
        Resultset::new(DocumentListing {
            collection: self.collection.clone(),
            fetched: false,
        })
    }

    /// Merge `patch` into the stored document and save it
    pub async fn update(&self, handle: impl AsHandle, patch: Body) -> Result<Document> {
        let mut doc = self.get(handle).await?;
        doc.update(patch).await?;
        Ok(doc)
    }

    /// Delete a document by handle
    pub async fn delete(&self, handle: impl AsHandle) -> Result<()> {
        let handle = handle.to_handle()?;
        let response = self
            .collection
            .send(Request::delete(document_path(&handle)))
            .await?;
        expect_found(response, &handle)?;
        tracing::debug!(id = %handle, "Document deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        self.collection.count().await
    }
}

/// Source of `Documents::all`: one listing request, then a GET per handle
pub struct DocumentListing {
    collection: Collection,
    fetched: bool,
}

#[async_trait::async_trait]
impl ResultSource for DocumentListing {
    type Raw = DocumentHandle;
    type Item = Document;

    async fn next_batch(&mut self) -> Result<Option<Vec<DocumentHandle>>> {
        if self.fetched {
            return Ok(None);
        }
        self.fetched = true;

        let request = Request::get(DOCUMENT_PATH).query("collection", self.collection.name());
        let response = self.collection.send(request).await?;
        if response.status == 404 {
            return Err(Error::NotFound(format!("collection {}", self.collection.name())));
        }
        let response = response.error_for_status()?;

        let paths = response
            .get("documents")
            .or_else(|| response.get("result"))
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidResponse("document listing without documents".to_string()))?;

        let handles = paths
            .iter()
            .map(|p| match p.as_str() {
                Some(path) => DocumentHandle::from_path(path),
                None => Err(Error::InvalidHandle(p.to_string())),
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(collection = %self.collection.name(), count = handles.len(), "Listed documents");
        Ok(Some(handles))
    }

    async fn hydrate(&mut self, handle: DocumentHandle) -> Result<Document> {
        fetch_document(self.collection.connection(), &handle).await
    }
}

/// Document instance
#[derive(Debug, Clone)]
pub struct Document {
    collection: Collection,
    id: Option<DocumentHandle>,
    rev: Option<String>,
    body: Body,
    state: EntityState,
    dirty: bool,
    response: Option<Response>,
}

impl Document {
    /// Transient document bound to `collection`
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            id: None,
            rev: None,
            body: Body::new(),
            state: EntityState::Transient,
            dirty: false,
            response: None,
        }
    }

    pub(crate) fn from_record(
        collection: Collection,
        record: DocumentRecord,
        response: Option<Response>,
    ) -> Self {
        Self {
            collection,
            id: Some(record.id),
            rev: record.rev,
            body: record.body,
            state: EntityState::Persisted,
            dirty: false,
            response,
        }
    }

    pub fn id(&self) -> Option<&DocumentHandle> {
        self.id.as_ref()
    }

    pub fn rev(&self) -> Option<&str> {
        self.rev.as_deref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Transport metadata of the latest round trip
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.body
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Value stored under `key`, or an explicit fallback
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.body.get(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.body.insert(key.into(), value.into());
        self.dirty = true;
    }

    /// Merge `patch` into the in-memory body without saving
    pub fn merge(&mut self, patch: Body) {
        if patch.is_empty() {
            return;
        }
        self.body.extend(user_body(patch));
        self.dirty = true;
    }

    /// Persist the in-memory body as a new document
    pub async fn create(&mut self) -> Result<()> {
        self.create_with(CreateOptions::default()).await
    }

    #[tracing::instrument(skip(self), fields(collection = %self.collection.name()))]
    pub async fn create_with(&mut self, options: CreateOptions) -> Result<()> {
        require_transient(self.state, self.id.as_ref())?;

        let request = Request::post(DOCUMENT_PATH)
            .query("collection", self.collection.name())
            .query_pairs(options.query_params())
            .json(Value::Object(self.body.clone()));

        let response = self.collection.send(request).await?.error_for_status()?;
        let (meta, _) = split_meta(response.body.clone())?;

        self.id = Some(
            meta.id
                .ok_or_else(|| Error::InvalidResponse("create reply without _id".to_string()))?,
        );
        self.rev = meta.rev;
        self.state = EntityState::Persisted;
        self.dirty = false;
        self.response = Some(response);

        tracing::debug!(id = ?self.id, "Document created");
        Ok(())
    }

    /// Replace the local body with the stored one
    pub async fn reload(&mut self) -> Result<()> {
        let id = require_persisted(self.state, self.id.as_ref())?;
        let response = self.collection.send(Request::get(document_path(&id))).await?;
        let response = self.found(response, &id)?;

        let (meta, body) = split_meta(response.body.clone())?;
        self.rev = meta.rev;
        self.body = body;
        self.dirty = false;
        self.response = Some(response);
        Ok(())
    }

    /// Write local changes; a no-op when nothing changed since the last save
    pub async fn save(&mut self) -> Result<()> {
        let id = require_persisted(self.state, self.id.as_ref())?;
        if !self.dirty {
            return Ok(());
        }

        let request = Request::put(document_path(&id)).json(Value::Object(self.body.clone()));
        let response = self.collection.send(request).await?;
        let response = self.found(response, &id)?;

        let (meta, _) = split_meta(response.body.clone())?;
        self.rev = meta.rev.or(self.rev.take());
        self.dirty = false;
        self.response = Some(response);

        tracing::debug!(id = %id, rev = ?self.rev, "Document saved");
        Ok(())
    }

    /// Merge `patch` and save
    pub async fn update(&mut self, patch: Body) -> Result<()> {
        require_persisted(self.state, self.id.as_ref())?;
        self.merge(patch);
        self.save().await
    }

    pub async fn delete(&mut self) -> Result<()> {
        let id = require_persisted(self.state, self.id.as_ref())?;
        let response = self.collection.send(Request::delete(document_path(&id))).await?;
        let response = self.found(response, &id)?;

        self.state = EntityState::Deleted;
        self.rev = None;
        self.body.clear();
        self.dirty = false;
        self.response = Some(response);

        tracing::debug!(id = %id, "Document deleted");
        Ok(())
    }

    /// A 404 means the record is gone; the entity follows the store
    fn found(&mut self, response: Response, id: &DocumentHandle) -> Result<Response> {
        if response.status == 404 {
            self.state = EntityState::Deleted;
            self.response = Some(response);
            return Err(Error::NotFound(id.to_string()));
        }
        expect_found(response, id)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.rev == other.rev && self.body == other.body
    }
}

impl AsHandle for Document {
    fn to_handle(&self) -> Result<DocumentHandle> {
        self.id
            .clone()
            .ok_or_else(|| Error::InvalidReference("document has not been created".to_string()))
    }
}

/// Deferred reference to a document: the handle now, the record on demand
#[derive(Debug, Clone)]
pub struct LazyDocument {
    handle: DocumentHandle,
    conn: Connection,
    resolved: OnceCell<Document>,
}

impl LazyDocument {
    pub(crate) fn new(conn: Connection, handle: DocumentHandle) -> Self {
        Self {
            handle,
            conn,
            resolved: OnceCell::new(),
        }
    }

    pub fn handle(&self) -> &DocumentHandle {
        &self.handle
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    /// Fetch the document on first call, reuse it afterwards
    pub async fn resolve(&self) -> Result<&Document> {
        self.resolved
            .get_or_try_init(|| fetch_document(&self.conn, &self.handle))
            .await
    }
}

impl PartialEq for LazyDocument {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl PartialEq<Document> for LazyDocument {
    fn eq(&self, other: &Document) -> bool {
        other.id() == Some(&self.handle)
    }
}

impl PartialEq<DocumentHandle> for LazyDocument {
    fn eq(&self, other: &DocumentHandle) -> bool {
        &self.handle == other
    }
}

impl AsHandle for LazyDocument {
    fn to_handle(&self) -> Result<DocumentHandle> {
        Ok(self.handle.clone())
    }
}
