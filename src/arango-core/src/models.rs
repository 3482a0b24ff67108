use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Document/edge content without system attributes
pub type Body = Map<String, Value>;

/// Attributes owned by the store; never part of a `Body`
pub const SYSTEM_KEYS: [&str; 5] = ["_id", "_rev", "_key", "_from", "_to"];

/// DocumentHandle identifies a document as `<collection>/<key>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentHandle {
    collection: String,
    key: String,
}

impl DocumentHandle {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Parse `<collection>/<key>`; keys are limited to the characters the
    /// store accepts
    pub fn parse(handle: &str) -> Result<Self> {
        match handle.split_once('/') {
            Some((collection, key))
                if !collection.is_empty()
                    && collection.chars().all(is_collection_char)
                    && is_valid_key(key) =>
            {
                Ok(Self::new(collection, key))
            }
            _ => Err(Error::InvalidHandle(handle.to_string())),
        }
    }

    /// URL path form, `%` escaped so the key stays one segment
    pub fn to_path(&self) -> String {
        format!("{}/{}", self.collection, self.key.replace('%', "%25"))
    }

    /// Parse the resource path form returned by document listings,
    /// e.g. `/_api/document/test/123`
    pub fn from_path(path: &str) -> Result<Self> {
        let rest = path
            .strip_prefix("/_api/document/")
            .or_else(|| path.strip_prefix("/_api/edge/"))
            .unwrap_or(path);
        Self::parse(rest).map_err(|_| Error::InvalidHandle(path.to_string()))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

fn is_collection_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 254
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-:.@()+,=;$!*'%".contains(c))
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

impl FromStr for DocumentHandle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentHandle {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DocumentHandle> for String {
    fn from(handle: DocumentHandle) -> Self {
        handle.to_string()
    }
}

/// Direction filter for edge lookups relative to a vertex
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Edges whose `_to` is the vertex
    In,
    /// Edges whose `_from` is the vertex
    Out,
    /// Union of `In` and `Out`
    #[default]
    Any,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Any => "any",
        }
    }

    /// Whether an edge `from -> to` is selected for `vertex` in this direction
    pub fn matches(&self, vertex: &DocumentHandle, from: &DocumentHandle, to: &DocumentHandle) -> bool {
        match self {
            Direction::In => to == vertex,
            Direction::Out => from == vertex,
            Direction::Any => to == vertex || from == vertex,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            "any" => Ok(Direction::Any),
            other => Err(Error::InvalidDirection(other.to_string())),
        }
    }
}

/// Store-owned identity of a hydrated entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub id: Option<DocumentHandle>,
    pub rev: Option<String>,
    pub from: Option<DocumentHandle>,
    pub to: Option<DocumentHandle>,
}

impl Meta {
    /// Read system attributes out of a store reply
    pub fn read(value: &Value) -> Result<Self> {
        Ok(Self {
            id: opt_handle(value.get("_id"))?,
            rev: value.get("_rev").and_then(scalar_to_string),
            from: opt_handle(value.get("_from"))?,
            to: opt_handle(value.get("_to"))?,
        })
    }
}

/// Split a store reply into system attributes and user body
pub fn split_meta(value: Value) -> Result<(Meta, Body)> {
    let meta = Meta::read(&value)?;
    let body = match value {
        Value::Object(mut map) => {
            for key in SYSTEM_KEYS {
                map.remove(key);
            }
            map
        }
        Value::Null => Body::new(),
        other => {
            return Err(Error::InvalidResponse(format!(
                "expected a JSON object, got {}",
                other
            )))
        }
    };
    Ok((meta, body))
}

/// Strip system attributes from a caller supplied body
pub fn user_body(mut body: Body) -> Body {
    for key in SYSTEM_KEYS {
        body.remove(key);
    }
    body
}

fn opt_handle(value: Option<&Value>) -> Result<Option<DocumentHandle>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => DocumentHandle::parse(s).map(Some),
        Some(other) => Err(Error::InvalidHandle(other.to_string())),
    }
}

/// Legacy servers send revisions and ids as numbers
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_opt_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

/// DocumentRecord is a fully hydrated document as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: DocumentHandle,
    pub rev: Option<String>,
    pub body: Body,
}

impl DocumentRecord {
    pub fn from_value(value: Value) -> Result<Self> {
        let (meta, body) = split_meta(value)?;
        let id = meta
            .id
            .ok_or_else(|| Error::InvalidResponse("document without _id".to_string()))?;
        Ok(Self {
            id,
            rev: meta.rev,
            body,
        })
    }
}

/// EdgeRecord is a fully hydrated edge as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub id: DocumentHandle,
    pub rev: Option<String>,
    pub from: DocumentHandle,
    pub to: DocumentHandle,
    pub body: Body,
}

impl EdgeRecord {
    pub fn from_value(value: Value) -> Result<Self> {
        let (meta, body) = split_meta(value)?;
        match (meta.id, meta.from, meta.to) {
            (Some(id), Some(from), Some(to)) => Ok(Self {
                id,
                rev: meta.rev,
                from,
                to,
                body,
            }),
            _ => Err(Error::InvalidResponse(
                "edge without _id, _from or _to".to_string(),
            )),
        }
    }
}

/// CollectionType as numbered by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    Document,
    Edge,
}

impl CollectionType {
    pub fn code(&self) -> u8 {
        match self {
            CollectionType::Document => 2,
            CollectionType::Edge => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(CollectionType::Document),
            3 => Some(CollectionType::Edge),
            _ => None,
        }
    }
}

/// CollectionInfo describes one collection on the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    #[serde(default, deserialize_with = "de_opt_scalar")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub status: Option<u8>,
    #[serde(rename = "type", default)]
    pub type_code: Option<u8>,
    #[serde(default)]
    pub wait_for_sync: Option<bool>,
    #[serde(default)]
    pub count: Option<u64>,
}

impl CollectionInfo {
    pub fn collection_type(&self) -> Option<CollectionType> {
        self.type_code.and_then(CollectionType::from_code)
    }
}

/// CreateOptions controls document and edge creation
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Create the collection on the fly when missing
    pub create_collection: bool,
    pub wait_for_sync: bool,
}

impl CreateOptions {
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if self.create_collection {
            params.push(("createCollection".to_string(), "true".to_string()));
        }
        if self.wait_for_sync {
            params.push(("waitForSync".to_string(), "true".to_string()));
        }
        params
    }
}

/// IndexKind defines the index types the store accepts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Hash,
    Skiplist,
    Fulltext,
    Geo,
    Persistent,
}

/// IndexSpec is the request body for index creation
#[derive(Debug, Clone, Serialize)]
pub struct IndexSpec {
    #[serde(rename = "type")]
    pub kind: IndexKind,
    pub fields: Vec<String>,
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse: Option<bool>,
}

impl IndexSpec {
    pub fn new<I, S>(kind: IndexKind, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
            sparse: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = Some(sparse);
        self
    }
}

/// IndexInfo describes an existing index
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IndexInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// CursorRequest carries an opaque query string to the cursor API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub bind_vars: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    pub count: bool,
}

impl CursorRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            bind_vars: Map::new(),
            batch_size: None,
            count: false,
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind_vars.insert(name.into(), value.into());
        self
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// CursorBatch is one page of cursor results
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorBatch {
    #[serde(default)]
    pub result: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, deserialize_with = "de_opt_scalar")]
    pub id: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}
