use arango_core::{CursorBatch, CursorRequest, Error, Request, Result, ResultSource};
use serde_json::Value;

use crate::connection::Connection;

const CURSOR_PATH: &str = "/_api/cursor";

/// Server-side cursor; the first page comes from `POST /_api/cursor`,
/// later pages from `PUT /_api/cursor/{id}` while `hasMore` holds
pub struct Cursor {
    conn: Connection,
    request: Option<CursorRequest>,
    id: Option<String>,
    has_more: bool,
    count: Option<u64>,
}

impl Cursor {
    pub(crate) fn new(conn: Connection, request: CursorRequest) -> Self {
        Self {
            conn,
            request: Some(request),
            id: None,
            has_more: false,
            count: None,
        }
    }

    /// Cursor id while more pages remain on the server
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Total reported by the server when the query asked for a count
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    async fn fetch(&mut self, request: Request) -> Result<Vec<Value>> {
        let response = self.conn.send(request).await?;
        if response.status == 404 {
            return Err(Error::NotFound(format!(
                "cursor {}",
                self.id.as_deref().unwrap_or("")
            )));
        }
        let batch: CursorBatch = serde_json::from_value(response.error_for_status()?.body)?;

        self.has_more = batch.has_more;
        self.id = if batch.has_more { batch.id } else { None };
        if batch.count.is_some() {
            self.count = batch.count;
        }

        tracing::debug!(
            rows = batch.result.len(),
            has_more = self.has_more,
            "Cursor batch"
        );
        Ok(batch.result)
    }
}

#[async_trait::async_trait]
impl ResultSource for Cursor {
    type Raw = Value;
    type Item = Value;

    async fn next_batch(&mut self) -> Result<Option<Vec<Value>>> {
        if let Some(query) = self.request.take() {
            let request = Request::post(CURSOR_PATH).json(serde_json::to_value(&query)?);
            return self.fetch(request).await.map(Some);
        }

        match (self.has_more, self.id.clone()) {
            (true, Some(id)) => {
                let request = Request::put(format!("{}/{}", CURSOR_PATH, id));
                self.fetch(request).await.map(Some)
            }
            (true, None) => Err(Error::InvalidResponse(
                "cursor has more results but no id".to_string(),
            )),
            _ => Ok(None),
        }
    }

    async fn hydrate(&mut self, raw: Value) -> Result<Value> {
        Ok(raw)
    }
}
