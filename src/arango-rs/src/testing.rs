//! In-memory stand-in for the remote store, speaking the same routes as the
//! HTTP API so the client can be exercised without a server.

use arango_core::{Body, Method, Request, Response, Result, Transport};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::connection::Connection;

const ERROR_ARANGO_DOCUMENT_NOT_FOUND: u32 = 1202;
const ERROR_ARANGO_COLLECTION_NOT_FOUND: u32 = 1203;
const ERROR_ARANGO_DUPLICATE_NAME: u32 = 1207;
const ERROR_ARANGO_INDEX_NOT_FOUND: u32 = 1212;
const ERROR_QUERY_PARSE: u32 = 1501;
const ERROR_CURSOR_NOT_FOUND: u32 = 1600;
const ERROR_HTTP_BAD_PARAMETER: u32 = 400;

/// Turn a `json!` object into a `Body`
pub(crate) fn body(value: Value) -> Body {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

struct StoredCollection {
    id: u64,
    kind: u8,
    wait_for_sync: bool,
    loaded: bool,
    docs: Vec<Map<String, Value>>,
    indexes: Vec<Value>,
}

impl StoredCollection {
    fn info(&self, name: &str) -> Map<String, Value> {
        let mut info = Map::new();
        info.insert("id".to_string(), json!(self.id.to_string()));
        info.insert("name".to_string(), json!(name));
        info.insert("type".to_string(), json!(self.kind));
        info.insert("status".to_string(), json!(if self.loaded { 3 } else { 2 }));
        info.insert("waitForSync".to_string(), json!(self.wait_for_sync));
        info
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.docs.iter().position(|d| d.get("_key") == Some(&json!(key)))
    }
}

struct OpenCursor {
    rows: VecDeque<Value>,
    batch_size: usize,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, StoredCollection>,
    cursors: HashMap<String, OpenCursor>,
    requests: Vec<Request>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared in-memory store; clones see the same data
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// A connection backed by a fresh store, plus the store for inspection
    pub(crate) fn connect() -> (Connection, MemoryStore) {
        let store = MemoryStore::default();
        let conn = Connection::with_transport(Arc::new(store.clone()), "memory://");
        (conn, store)
    }

    /// Every request received so far, oldest first
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl Transport for MemoryStore {
    async fn send(&self, request: Request) -> Result<Response> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        let (status, body) = route(&mut state, &request);
        let body = if request.method == Method::HEAD {
            Value::Null
        } else {
            body
        };

        Ok(Response {
            status,
            url: format!("memory://{}", request.path),
            body,
        })
    }
}

fn error(status: u16, error_num: u32, message: &str) -> (u16, Value) {
    (
        status,
        json!({
            "error": true,
            "code": status,
            "errorNum": error_num,
            "errorMessage": message,
        }),
    )
}

fn ok(status: u16, mut body: Map<String, Value>) -> (u16, Value) {
    body.insert("error".to_string(), json!(false));
    body.insert("code".to_string(), json!(status));
    (status, Value::Object(body))
}

fn no_collection() -> (u16, Value) {
    error(404, ERROR_ARANGO_COLLECTION_NOT_FOUND, "collection not found")
}

fn no_document() -> (u16, Value) {
    error(404, ERROR_ARANGO_DOCUMENT_NOT_FOUND, "document not found")
}

fn route(state: &mut State, request: &Request) -> (u16, Value) {
    let path = request.path.trim_start_matches("/_api/");
    let segments: Vec<&str> = path.split('/').collect();
    let method = request.method.clone();

    match (method, segments.as_slice()) {
        (Method::GET, ["collection"]) => list_collections(state),
        (Method::POST, ["collection"]) => create_collection(state, request),
        (method, ["collection", name]) => collection_root(state, method, name),
        (method, ["collection", name, resource]) => {
            collection_resource(state, method, name, resource, request)
        }

        (Method::GET, ["document"]) => list_documents(state, request),
        (Method::POST, ["document"]) => create_document(state, request, None),
        (Method::POST, ["edge"]) => create_edge(state, request),
        (method, ["document" | "edge", collection, key]) => {
            document(state, method, collection, key, request)
        }

        (Method::GET, ["edges", collection]) => lookup_edges(state, collection, request),

        (Method::GET, ["index"]) => list_indexes(state, request),
        (Method::POST, ["index"]) => create_index(state, request),
        (Method::DELETE, ["index", collection, id]) => delete_index(state, collection, id),

        (Method::POST, ["cursor"]) => create_cursor(state, request),
        (Method::PUT, ["cursor", id]) => next_cursor_batch(state, id),

        _ => error(404, 404, "unknown path"),
    }
}

fn list_collections(state: &State) -> (u16, Value) {
    let collections: Vec<Value> = state
        .collections
        .iter()
        .map(|(name, c)| Value::Object(c.info(name)))
        .collect();

    let mut body = Map::new();
    body.insert("collections".to_string(), Value::Array(collections));
    ok(200, body)
}

fn create_collection(state: &mut State, request: &Request) -> (u16, Value) {
    let data = request.body.clone().unwrap_or(Value::Null);
    let Some(name) = data.get("name").and_then(Value::as_str) else {
        return error(400, ERROR_HTTP_BAD_PARAMETER, "name missing");
    };
    if state.collections.contains_key(name) {
        return error(409, ERROR_ARANGO_DUPLICATE_NAME, "duplicate name");
    }

    let id = state.next_id();
    let collection = StoredCollection {
        id,
        kind: data.get("type").and_then(Value::as_u64).unwrap_or(2) as u8,
        wait_for_sync: data
            .get("waitForSync")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        loaded: true,
        docs: Vec::new(),
        indexes: vec![json!({
            "id": format!("{}/0", name),
            "type": "primary",
            "fields": ["_id"],
            "unique": true,
        })],
    };
    let info = collection.info(name);
    state.collections.insert(name.to_string(), collection);
    ok(200, info)
}

fn collection_root(state: &mut State, method: Method, name: &str) -> (u16, Value) {
    match method {
        Method::GET => match state.collections.get(name) {
            Some(c) => ok(200, c.info(name)),
            None => no_collection(),
        },
        Method::DELETE => match state.collections.remove(name) {
            Some(c) => {
                let mut body = Map::new();
                body.insert("id".to_string(), json!(c.id.to_string()));
                ok(200, body)
            }
            None => no_collection(),
        },
        _ => error(405, 405, "method not supported"),
    }
}

fn collection_resource(
    state: &mut State,
    method: Method,
    name: &str,
    resource: &str,
    request: &Request,
) -> (u16, Value) {
    if method == Method::PUT && resource == "rename" {
        return rename_collection(state, name, request);
    }

    let Some(collection) = state.collections.get_mut(name) else {
        return no_collection();
    };

    match (method, resource) {
        (Method::GET, "count") => {
            let mut info = collection.info(name);
            info.insert("count".to_string(), json!(collection.docs.len()));
            ok(200, info)
        }
        (Method::GET, "figures") => {
            let mut info = collection.info(name);
            info.insert(
                "figures".to_string(),
                json!({"alive": {"count": collection.docs.len()}, "dead": {"count": 0}}),
            );
            ok(200, info)
        }
        (Method::GET, "properties") => ok(200, collection.info(name)),
        (Method::PUT, "properties") => {
            if let Some(flag) = request
                .body
                .as_ref()
                .and_then(|b| b.get("waitForSync"))
                .and_then(Value::as_bool)
            {
                collection.wait_for_sync = flag;
            }
            ok(200, collection.info(name))
        }
        (Method::PUT, "load") => {
            collection.loaded = true;
            ok(200, collection.info(name))
        }
        (Method::PUT, "unload") => {
            collection.loaded = false;
            ok(200, collection.info(name))
        }
        (Method::PUT, "truncate") => {
            collection.docs.clear();
            ok(200, collection.info(name))
        }
        _ => error(404, 404, "unknown path"),
    }
}

fn rename_collection(state: &mut State, name: &str, request: &Request) -> (u16, Value) {
    let Some(new_name) = request
        .body
        .as_ref()
        .and_then(|b| b.get("name"))
        .and_then(Value::as_str)
    else {
        return error(400, ERROR_HTTP_BAD_PARAMETER, "name missing");
    };
    if state.collections.contains_key(new_name) {
        return error(409, ERROR_ARANGO_DUPLICATE_NAME, "duplicate name");
    }
    let Some(mut collection) = state.collections.remove(name) else {
        return no_collection();
    };

    for doc in &mut collection.docs {
        if let Some(key) = doc.get("_key").and_then(Value::as_str).map(str::to_string) {
            doc.insert("_id".to_string(), json!(format!("{}/{}", new_name, key)));
        }
    }
    let info = collection.info(new_name);
    state.collections.insert(new_name.to_string(), collection);
    ok(200, info)
}

fn list_documents(state: &State, request: &Request) -> (u16, Value) {
    let name = request.param("collection").unwrap_or_default();
    let Some(collection) = state.collections.get(name) else {
        return no_collection();
    };

    let paths: Vec<Value> = collection
        .docs
        .iter()
        .filter_map(|d| d.get("_id").and_then(Value::as_str))
        .map(|id| json!(format!("/_api/document/{}", id)))
        .collect();

    let mut body = Map::new();
    body.insert("documents".to_string(), Value::Array(paths));
    ok(200, body)
}

fn write_status(collection: &StoredCollection, request: &Request) -> u16 {
    if collection.wait_for_sync || request.param("waitForSync") == Some("true") {
        201
    } else {
        202
    }
}

fn receipt(doc: &Map<String, Value>) -> Map<String, Value> {
    ["_id", "_rev", "_key"]
        .iter()
        .filter_map(|k| doc.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect()
}

fn create_document(
    state: &mut State,
    request: &Request,
    endpoints: Option<(&str, &str)>,
) -> (u16, Value) {
    let name = request.param("collection").unwrap_or_default().to_string();

    if !state.collections.contains_key(&name) {
        if request.param("createCollection") != Some("true") {
            return no_collection();
        }
        let create = Request::post("/_api/collection").json(json!({ "name": name }));
        create_collection(state, &create);
    }

    let key = state.next_id().to_string();
    let rev = state.next_id().to_string();

    let mut doc = match request.body.clone() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for system in ["_id", "_rev", "_key", "_from", "_to"] {
        doc.remove(system);
    }
    doc.insert("_id".to_string(), json!(format!("{}/{}", name, key)));
    doc.insert("_rev".to_string(), json!(rev));
    doc.insert("_key".to_string(), json!(key));
    if let Some((from, to)) = endpoints {
        doc.insert("_from".to_string(), json!(from));
        doc.insert("_to".to_string(), json!(to));
    }

    let Some(collection) = state.collections.get_mut(&name) else {
        return no_collection();
    };
    let status = write_status(collection, request);
    let reply = receipt(&doc);
    collection.docs.push(doc);
    ok(status, reply)
}

fn document_exists(state: &State, handle: &str) -> bool {
    match handle.split_once('/') {
        Some((collection, key)) => state
            .collections
            .get(collection)
            .and_then(|c| c.position(key))
            .is_some(),
        None => false,
    }
}

fn create_edge(state: &mut State, request: &Request) -> (u16, Value) {
    let name = request.param("collection").unwrap_or_default();
    if !state.collections.contains_key(name) && request.param("createCollection") != Some("true") {
        return no_collection();
    }

    let (Some(from), Some(to)) = (request.param("from"), request.param("to")) else {
        return error(400, ERROR_HTTP_BAD_PARAMETER, "from and to are required");
    };
    if !document_exists(state, from) || !document_exists(state, to) {
        return no_document();
    }

    create_document(state, request, Some((from, to)))
}

fn document(
    state: &mut State,
    method: Method,
    name: &str,
    key: &str,
    request: &Request,
) -> (u16, Value) {
    let Some(collection) = state.collections.get(name) else {
        return no_document();
    };
    let Some(pos) = collection.position(key) else {
        return no_document();
    };

    let rev = state.next_id().to_string();
    let Some(collection) = state.collections.get_mut(name) else {
        return no_collection();
    };

    match method {
        Method::GET | Method::HEAD => ok(200, collection.docs[pos].clone()),
        Method::PUT => {
            let status = write_status(collection, request);
            let stored = &mut collection.docs[pos];

            let mut replacement = match request.body.clone() {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            for system in ["_id", "_rev", "_key"] {
                replacement.remove(system);
            }
            for endpoint in ["_from", "_to"] {
                if !replacement.contains_key(endpoint) {
                    if let Some(value) = stored.get(endpoint) {
                        replacement.insert(endpoint.to_string(), value.clone());
                    }
                }
            }
            for system in ["_id", "_key"] {
                if let Some(value) = stored.get(system) {
                    replacement.insert(system.to_string(), value.clone());
                }
            }
            replacement.insert("_rev".to_string(), json!(rev));

            *stored = replacement;
            ok(status, receipt(stored))
        }
        Method::DELETE => {
            let status = write_status(collection, request);
            let removed = collection.docs.remove(pos);
            ok(status, receipt(&removed))
        }
        _ => error(405, 405, "method not supported"),
    }
}

fn lookup_edges(state: &State, name: &str, request: &Request) -> (u16, Value) {
    let Some(collection) = state.collections.get(name) else {
        return no_collection();
    };
    let vertex = json!(request.param("vertex").unwrap_or_default());

    let side = |attribute: &str| -> Vec<Value> {
        collection
            .docs
            .iter()
            .filter(|d| d.get(attribute) == Some(&vertex))
            .map(|d| Value::Object(d.clone()))
            .collect()
    };

    let edges = match request.param("direction").unwrap_or("any") {
        "in" => side("_to"),
        "out" => side("_from"),
        // self loops appear on both sides
        "any" => {
            let mut all = side("_from");
            all.extend(side("_to"));
            all
        }
        _ => return error(400, ERROR_HTTP_BAD_PARAMETER, "invalid direction"),
    };

    let mut body = Map::new();
    body.insert("edges".to_string(), Value::Array(edges));
    ok(200, body)
}

fn list_indexes(state: &State, request: &Request) -> (u16, Value) {
    let name = request.param("collection").unwrap_or_default();
    let Some(collection) = state.collections.get(name) else {
        return no_collection();
    };

    let mut body = Map::new();
    body.insert("indexes".to_string(), Value::Array(collection.indexes.clone()));
    ok(200, body)
}

fn create_index(state: &mut State, request: &Request) -> (u16, Value) {
    let name = request.param("collection").unwrap_or_default().to_string();
    if !state.collections.contains_key(&name) {
        return no_collection();
    }
    let id = state.next_id();
    let Some(collection) = state.collections.get_mut(&name) else {
        return no_collection();
    };

    let spec = request.body.clone().unwrap_or(Value::Null);
    let index = json!({
        "id": format!("{}/{}", name, id),
        "type": spec.get("type").cloned().unwrap_or(json!("hash")),
        "fields": spec.get("fields").cloned().unwrap_or(json!([])),
        "unique": spec.get("unique").cloned().unwrap_or(json!(false)),
    });
    collection.indexes.push(index.clone());

    let mut body = match index {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    body.insert("isNewlyCreated".to_string(), json!(true));
    ok(201, body)
}

fn delete_index(state: &mut State, name: &str, id: &str) -> (u16, Value) {
    let full_id = json!(format!("{}/{}", name, id));
    let Some(collection) = state.collections.get_mut(name) else {
        return no_collection();
    };
    let Some(pos) = collection
        .indexes
        .iter()
        .position(|i| i.get("id") == Some(&full_id))
    else {
        return error(404, ERROR_ARANGO_INDEX_NOT_FOUND, "index not found");
    };

    collection.indexes.remove(pos);
    let mut body = Map::new();
    body.insert("id".to_string(), full_id);
    ok(200, body)
}

/// Query shapes understood by the store
struct ParsedQuery<'a> {
    collection: &'a str,
    /// `FILTER <var>.<attribute> != null`
    filter: Option<&'a str>,
    /// `COLLECT WITH COUNT INTO <n> RETURN <n>`
    count_only: bool,
}

/// `FOR <var> IN <collection|@@bind> [FILTER <var>.<attr> != null]`
/// followed by `RETURN <var>` or `COLLECT WITH COUNT INTO <n> RETURN <n>`
fn parse_query<'a>(query: &'a str, bind_vars: &'a Value) -> Option<ParsedQuery<'a>> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let ["FOR", var, "IN", source, rest @ ..] = tokens.as_slice() else {
        return None;
    };
    let (var, source): (&'a str, &'a str) = (*var, *source);

    let collection = match source.strip_prefix("@@") {
        Some(name) => bind_vars.get(format!("@{}", name))?.as_str()?,
        None => source,
    };

    let (filter, rest) = match rest {
        ["FILTER", attribute, "!=", "null", rest @ ..] => {
            let (owner, attribute) = (*attribute).split_once('.')?;
            if owner != var {
                return None;
            }
            (Some(attribute), rest)
        }
        rest => (None, rest),
    };

    let count_only = match rest {
        ["RETURN", ret] if *ret == var => false,
        ["COLLECT", "WITH", "COUNT", "INTO", n, "RETURN", ret] if n == ret => true,
        _ => return None,
    };

    Some(ParsedQuery {
        collection,
        filter,
        count_only,
    })
}

fn create_cursor(state: &mut State, request: &Request) -> (u16, Value) {
    let spec = request.body.clone().unwrap_or(Value::Null);
    let query = spec.get("query").and_then(Value::as_str).unwrap_or_default();
    let bind_vars = spec.get("bindVars").cloned().unwrap_or(Value::Null);

    let Some(parsed) = parse_query(query, &bind_vars) else {
        return error(400, ERROR_QUERY_PARSE, "syntax error");
    };
    let Some(collection) = state.collections.get(parsed.collection) else {
        return no_collection();
    };

    let matching = collection
        .docs
        .iter()
        .filter(|d| match parsed.filter {
            Some(attribute) => d.get(attribute).is_some_and(|v| !v.is_null()),
            None => true,
        })
        .map(|d| Value::Object(d.clone()));

    let rows: VecDeque<Value> = if parsed.count_only {
        VecDeque::from([json!(matching.count())])
    } else {
        matching.collect()
    };
    let total = rows.len();
    let batch_size = spec
        .get("batchSize")
        .and_then(Value::as_u64)
        .map_or(1000, |n| n.max(1) as usize);

    let id = state.next_id().to_string();
    let mut cursor = OpenCursor { rows, batch_size };
    let mut body = cursor_batch(&mut cursor);

    if body.get("hasMore") == Some(&json!(true)) {
        body.insert("id".to_string(), json!(id));
        state.cursors.insert(id, cursor);
    }
    if spec.get("count") == Some(&json!(true)) {
        body.insert("count".to_string(), json!(total));
    }
    ok(201, body)
}

fn next_cursor_batch(state: &mut State, id: &str) -> (u16, Value) {
    let Some(cursor) = state.cursors.get_mut(id) else {
        return error(404, ERROR_CURSOR_NOT_FOUND, "cursor not found");
    };

    let mut body = cursor_batch(cursor);
    if body.get("hasMore") == Some(&json!(true)) {
        body.insert("id".to_string(), json!(id));
    } else {
        state.cursors.remove(id);
    }
    ok(200, body)
}

fn cursor_batch(cursor: &mut OpenCursor) -> Map<String, Value> {
    let take = cursor.batch_size.min(cursor.rows.len());
    let result: Vec<Value> = cursor.rows.drain(..take).collect();

    let mut body = Map::new();
    body.insert("result".to_string(), Value::Array(result));
    body.insert("hasMore".to_string(), json!(!cursor.rows.is_empty()));
    body
}
