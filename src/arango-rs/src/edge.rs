use arango_core::{
    models::{split_meta, user_body},
    Body, CollectionType, CreateOptions, CursorRequest, Direction, DocumentHandle, EdgeGraph, EdgeRecord, Error, Request,
    Response, Result, ResultSource, Resultset,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::collection::Collection;
use crate::document::{document_exists, LazyDocument};
use crate::entity::{expect_found, require_persisted, require_transient, AsHandle, EntityState};

const EDGE_PATH: &str = "/_api/edge";
const EDGES_PATH: &str = "/_api/edges";
const COUNT_EDGES_QUERY: &str =
    "FOR e IN @@collection FILTER e._from != null COLLECT WITH COUNT INTO n RETURN n";

fn edge_path(handle: &DocumentHandle) -> String {
    format!("{}/{}", EDGE_PATH, handle.to_path())
}

/// Edges proxy between `Collection` and `Edge`
#[derive(Debug, Clone)]
pub struct Edges {
    collection: Collection,
}

impl Edges {
    pub(crate) fn new(collection: Collection) -> Self {
        Self { collection }
    }

    /// Create an edge `from -> to`; both documents must already exist
    pub async fn create(&self, from: impl AsHandle, to: impl AsHandle, body: Body) -> Result<Edge> {
        self.create_with(from, to, body, CreateOptions::default()).await
    }

    pub async fn create_with(
        &self,
        from: impl AsHandle,
        to: impl AsHandle,
        body: Body,
        options: CreateOptions,
    ) -> Result<Edge> {
        let mut edge = Edge::new(self.collection.clone());
        edge.body = user_body(body);
        edge.create_with(from, to, options).await?;
        Ok(edge)
    }

    /// Edges of `vertex` in `direction`; nothing is fetched until iteration
    pub fn of(&self, vertex: impl AsHandle, direction: Direction) -> Result<Resultset<EdgeLookup>> {
        Ok(Resultset::new(EdgeLookup {
            collection: self.collection.clone(),
            vertex: vertex.to_handle()?,
            direction,
            fetched: false,
            response: None,
        }))
    }

    /// Like `of`, with the direction given as `in`, `out` or `any`
    pub fn of_named(&self, vertex: impl AsHandle, direction: &str) -> Result<Resultset<EdgeLookup>> {
        let direction = direction.parse::<Direction>()?;
        self.of(vertex, direction)
    }

    pub async fn get(&self, handle: impl AsHandle) -> Result<Edge> {
        let handle = handle.to_handle()?;
        let response = self.collection.send(Request::get(edge_path(&handle))).await?;
        let response = expect_found(response, &handle)?;
        let record = EdgeRecord::from_value(response.body.clone())?;
        Ok(Edge::from_record(self.collection.clone(), record).with_response(response))
    }

    /// Merge `patch` into a stored edge and save it
    pub async fn update(&self, handle: impl AsHandle, patch: Body) -> Result<Edge> {
        let mut edge = self.get(handle).await?;
        edge.update(patch).await?;
        Ok(edge)
    }

    /// Delete an edge by handle
    pub async fn delete(&self, handle: impl AsHandle) -> Result<()> {
        let handle = handle.to_handle()?;
        let response = self.collection.send(Request::delete(edge_path(&handle))).await?;
        expect_found(response, &handle)?;
        tracing::debug!(id = %handle, "Edge deleted");
        Ok(())
    }

    /// Number of edges in the whole collection
    ///
    /// Plain documents sharing the collection are not counted. Never filtered
    /// by an earlier lookup; count a lookup with
    /// `edges.of(vertex, direction)?.count()` instead.
    pub async fn count(&self) -> Result<u64> {
        let info = self.collection.info().await?;
        if info.collection_type() == Some(CollectionType::Edge) {
            return self.collection.count().await;
        }

        let query =
            CursorRequest::new(COUNT_EDGES_QUERY).bind("@collection", self.collection.name());
        let row = self.collection.connection().query(query).first().await?;
        row.as_u64()
            .ok_or_else(|| Error::InvalidResponse(format!("edge count is not a number: {}", row)))
    }

    /// Breadth-first walk from `start`, one lookup per visited vertex
    #[tracing::instrument(skip(self, start), fields(collection = %self.collection.name()))]
    pub async fn traverse(
        &self,
        start: impl AsHandle,
        direction: Direction,
        max_depth: usize,
    ) -> Result<Traversal> {
        let start = start.to_handle()?;

        let mut vertices = vec![start.clone()];
        let mut depths = HashMap::from([(start.clone(), 0)]);
        let mut edges = Vec::new();
        let mut seen_edges = HashSet::new();
        let mut frontier = vec![start.clone()];
        let mut depth = 0;

        while depth < max_depth && !frontier.is_empty() {
            let mut next = Vec::new();

            for vertex in &frontier {
                for record in lookup_edges(&self.collection, vertex, direction).await?.0 {
                    let neighbor = if &record.from == vertex {
                        record.to.clone()
                    } else {
                        record.from.clone()
                    };

                    if !depths.contains_key(&neighbor) {
                        depths.insert(neighbor.clone(), depth + 1);
                        vertices.push(neighbor.clone());
                        next.push(neighbor);
                    }

                    if seen_edges.insert(record.id.clone()) {
                        edges.push(record);
                    }
                }
            }

            frontier = next;
            depth += 1;
        }

        tracing::debug!(vertices = vertices.len(), edges = edges.len(), "Traversal finished");
        Ok(Traversal {
            start,
            vertices,
            depths,
            edges,
        })
    }
}

/// One directional lookup: `GET /_api/edges/{collection}?vertex=..&direction=..`
async fn lookup_edges(
    collection: &Collection,
    vertex: &DocumentHandle,
    direction: Direction,
) -> Result<(Vec<EdgeRecord>, Response)> {
    let request = Request::get(format!("{}/{}", EDGES_PATH, collection.name()))
        .query("vertex", vertex.to_string())
        .query("direction", direction.as_str());

    let response = collection.send(request).await?;
    if response.status == 404 {
        return Err(Error::NotFound(format!("collection {}", collection.name())));
    }
    let response = response.error_for_status()?;

    let raw = response
        .get("edges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(raw.len());
    for value in raw {
        let record = EdgeRecord::from_value(value)?;
        // `any` may report a self loop once per side
        if direction.matches(vertex, &record.from, &record.to) && seen.insert(record.id.clone()) {
            records.push(record);
        }
    }

    Ok((records, response))
}

/// Source of an edge lookup resultset
pub struct EdgeLookup {
    collection: Collection,
    vertex: DocumentHandle,
    direction: Direction,
    fetched: bool,
    response: Option<Response>,
}

impl EdgeLookup {
    pub fn vertex(&self) -> &DocumentHandle {
        &self.vertex
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Transport metadata once the lookup ran
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }
}

#[async_trait::async_trait]
impl ResultSource for EdgeLookup {
    type Raw = EdgeRecord;
    type Item = Edge;

    async fn next_batch(&mut self) -> Result<Option<Vec<EdgeRecord>>> {
        if self.fetched {
            return Ok(None);
        }
        self.fetched = true;

        let (records, response) = lookup_edges(&self.collection, &self.vertex, self.direction).await?;
        tracing::debug!(
            vertex = %self.vertex,
            direction = %self.direction,
            count = records.len(),
            "Edge lookup"
        );
        self.response = Some(response);
        Ok(Some(records))
    }

    async fn hydrate(&mut self, record: EdgeRecord) -> Result<Edge> {
        Ok(Edge::from_record(self.collection.clone(), record))
    }
}

/// Result of `Edges::traverse`
#[derive(Debug, Clone)]
pub struct Traversal {
    pub start: DocumentHandle,
    /// Visited vertices in breadth-first order, `start` first
    pub vertices: Vec<DocumentHandle>,
    pub depths: HashMap<DocumentHandle, usize>,
    /// Distinct edges seen during the walk
    pub edges: Vec<EdgeRecord>,
}

impl Traversal {
    pub fn depth_of(&self, vertex: &DocumentHandle) -> Option<usize> {
        self.depths.get(vertex).copied()
    }

    pub fn graph(&self) -> EdgeGraph {
        EdgeGraph::new(self.edges.clone())
    }
}

/// Edge instance
#[derive(Debug, Clone)]
pub struct Edge {
    collection: Collection,
    id: Option<DocumentHandle>,
    rev: Option<String>,
    from: Option<LazyDocument>,
    to: Option<LazyDocument>,
    body: Body,
    state: EntityState,
    dirty: bool,
    response: Option<Response>,
}

impl Edge {
    /// Transient edge bound to `collection`
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            id: None,
            rev: None,
            from: None,
            to: None,
            body: Body::new(),
            state: EntityState::Transient,
            dirty: false,
            response: None,
        }
    }

    pub(crate) fn from_record(collection: Collection, record: EdgeRecord) -> Self {
        let conn = collection.connection().clone();
        Self {
            id: Some(record.id),
            rev: record.rev,
            from: Some(LazyDocument::new(conn.clone(), record.from)),
            to: Some(LazyDocument::new(conn, record.to)),
            body: record.body,
            state: EntityState::Persisted,
            dirty: false,
            response: None,
            collection,
        }
    }

    fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
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

    /// Source vertex; resolve it to fetch the full document
    pub fn from_document(&self) -> Option<&LazyDocument> {
        self.from.as_ref()
    }

    /// Target vertex; resolve it to fetch the full document
    pub fn to_document(&self) -> Option<&LazyDocument> {
        self.to.as_ref()
    }

    pub fn get(&self, key: &str) -> Result<&Value> {
        self.body
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.body.get(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.body.insert(key.into(), value.into());
        self.dirty = true;
    }

    pub fn merge(&mut self, patch: Body) {
        if patch.is_empty() {
            return;
        }
        self.body.extend(user_body(patch));
        self.dirty = true;
    }

    /// Point the edge at new endpoints; written on the next `save`
    pub fn relink(&mut self, from: impl AsHandle, to: impl AsHandle) -> Result<()> {
        let conn = self.collection.connection().clone();
        let from = from.to_handle()?;
        let to = to.to_handle()?;

        if self.from.as_ref().map(LazyDocument::handle) != Some(&from) {
            self.from = Some(LazyDocument::new(conn.clone(), from));
            self.dirty = true;
        }
        if self.to.as_ref().map(LazyDocument::handle) != Some(&to) {
            self.to = Some(LazyDocument::new(conn, to));
            self.dirty = true;
        }
        Ok(())
    }

    pub async fn create(&mut self, from: impl AsHandle, to: impl AsHandle) -> Result<()> {
        self.create_with(from, to, CreateOptions::default()).await
    }

    #[tracing::instrument(skip_all, fields(collection = %self.collection.name()))]
    pub async fn create_with(
        &mut self,
        from: impl AsHandle,
        to: impl AsHandle,
        options: CreateOptions,
    ) -> Result<()> {
        require_transient(self.state, self.id.as_ref())?;

        let from = from.to_handle()?;
        let to = to.to_handle()?;

        let conn = self.collection.connection().clone();
        for endpoint in [&from, &to] {
            if !document_exists(&conn, endpoint).await? {
                return Err(Error::InvalidReference(endpoint.to_string()));
            }
        }

        let request = Request::post(EDGE_PATH)
            .query("collection", self.collection.name())
            .query("from", from.to_string())
            .query("to", to.to_string())
            .query_pairs(options.query_params())
            .json(Value::Object(self.body.clone()));

        let response = self.collection.send(request).await?;
        if response.status == 404 {
            return Err(Error::InvalidReference(format!("{} -> {}", from, to)));
        }
        let response = response.error_for_status()?;
        let (meta, _) = split_meta(response.body.clone())?;

        self.id = Some(
            meta.id
                .ok_or_else(|| Error::InvalidResponse("create reply without _id".to_string()))?,
        );
        self.rev = meta.rev;
        self.from = Some(LazyDocument::new(conn.clone(), from));
        self.to = Some(LazyDocument::new(conn, to));
        self.state = EntityState::Persisted;
        self.dirty = false;
        self.response = Some(response);

        tracing::debug!(id = ?self.id, "Edge created");
        Ok(())
    }

    /// Replace local state with the stored edge
    pub async fn reload(&mut self) -> Result<()> {
        let id = require_persisted(self.state, self.id.as_ref())?;
        let response = self.collection.send(Request::get(edge_path(&id))).await?;
        let response = self.found(response, &id)?;

        let record = EdgeRecord::from_value(response.body.clone())?;
        let conn = self.collection.connection().clone();
        self.rev = record.rev;
        self.from = Some(LazyDocument::new(conn.clone(), record.from));
        self.to = Some(LazyDocument::new(conn, record.to));
        self.body = record.body;
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

        let mut data = self.body.clone();
        if let (Some(from), Some(to)) = (&self.from, &self.to) {
            data.insert("_from".to_string(), Value::String(from.handle().to_string()));
            data.insert("_to".to_string(), Value::String(to.handle().to_string()));
        }

        let request = Request::put(edge_path(&id)).json(Value::Object(data));
        let response = self.collection.send(request).await?;
        let response = self.found(response, &id)?;

        let (meta, _) = split_meta(response.body.clone())?;
        self.rev = meta.rev.or(self.rev.take());
        self.dirty = false;
        self.response = Some(response);

        tracing::debug!(id = %id, rev = ?self.rev, "Edge saved");
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
        let response = self.collection.send(Request::delete(edge_path(&id))).await?;
        let response = self.found(response, &id)?;

        self.state = EntityState::Deleted;
        self.rev = None;
        self.body.clear();
        self.dirty = false;
        self.response = Some(response);

        tracing::debug!(id = %id, "Edge deleted");
        Ok(())
    }

    fn found(&mut self, response: Response, id: &DocumentHandle) -> Result<Response> {
        if response.status == 404 {
            self.state = EntityState::Deleted;
            self.response = Some(response);
            return Err(Error::NotFound(id.to_string()));
        }
        expect_found(response, id)
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.rev == other.rev
            && self.body == other.body
            && self.from == other.from
            && self.to == other.to
    }
}

impl AsHandle for Edge {
    fn to_handle(&self) -> Result<DocumentHandle> {
        self.id
            .clone()
            .ok_or_else(|| Error::InvalidReference("edge has not been created".to_string()))
    }
}
