//! arango Client Library
//!
//! Async client for the collection, document, edge, index and cursor
//! endpoints of an ArangoDB style REST API.
//!
//! ```no_run
//! # async fn demo() -> arango_rs::Result<()> {
//! use arango_rs::{ConnectionConfig, Direction};
//! use serde_json::{json, Map};
//!
//! let conn = arango_rs::create(&ConnectionConfig::default())?;
//! let test = conn.collection("test")?;
//! test.create().await?;
//!
//! let mut from = Map::new();
//! from.insert("sample_key".into(), json!("sample_value"));
//! let from_doc = test.documents().create(from).await?;
//! let to_doc = test.documents().create(Map::new()).await?;
//!
//! test.edges().create(&from_doc, &to_doc, Map::new()).await?;
//! let edge = test.edges().of(&from_doc, Direction::Out)?.first().await?;
//! assert!(*edge.to_document().unwrap() == to_doc);
//! # Ok(())
//! # }
//! ```

mod collection;
mod connection;
mod cursor;
mod document;
mod edge;
mod entity;
mod index;

#[cfg(test)]
mod testing;

pub use collection::Collection;
pub use connection::Connection;
pub use cursor::Cursor;
pub use document::{Document, DocumentListing, Documents, LazyDocument};
pub use edge::{Edge, EdgeLookup, Edges, Traversal};
pub use entity::{AsHandle, EntityState};
pub use index::Indexes;

pub use arango_core::{
    Body, CollectionInfo, CollectionType, ConnectionConfig, CreateOptions, CursorRequest,
    Direction, DocumentHandle, EdgeGraph, EdgeRecord, Error, GraphStatistics, IndexInfo, IndexKind,
    IndexSpec, Request, Response, Result, ResultSource, Resultset, ShortestPath, Transport,
};

/// Open a connection over HTTP(S)
pub fn create(config: &ConnectionConfig) -> Result<Connection> {
    Connection::new(config)
}
