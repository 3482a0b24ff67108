use arango_core::{Error, IndexInfo, IndexSpec, Request, Result};
use serde_json::Value;

use crate::collection::Collection;

const INDEX_PATH: &str = "/_api/index";

/// Index management for one collection
#[derive(Debug, Clone)]
pub struct Indexes {
    collection: Collection,
}

impl Indexes {
    pub(crate) fn new(collection: Collection) -> Self {
        Self { collection }
    }

    pub async fn list(&self) -> Result<Vec<IndexInfo>> {
        let request = Request::get(INDEX_PATH).query("collection", self.collection.name());
        let response = self.collection.send(request).await?;
        if response.status == 404 {
            return Err(Error::NotFound(format!("collection {}", self.collection.name())));
        }
        let response = response.error_for_status()?;

        let indexes = response
            .get("indexes")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        Ok(serde_json::from_value(indexes)?)
    }

    #[tracing::instrument(skip(self), fields(collection = %self.collection.name()))]
    pub async fn create(&self, spec: IndexSpec) -> Result<IndexInfo> {
        let request = Request::post(INDEX_PATH)
            .query("collection", self.collection.name())
            .json(serde_json::to_value(&spec)?);

        let response = self.collection.send(request).await?;
        if response.status == 404 {
            return Err(Error::NotFound(format!("collection {}", self.collection.name())));
        }
        let info: IndexInfo = serde_json::from_value(response.error_for_status()?.body)?;

        tracing::info!(index = %info.id, kind = %info.kind, "Index created");
        Ok(info)
    }

    /// Drop an index by its full id, e.g. `test/12345`
    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .collection
            .send(Request::delete(format!("{}/{}", INDEX_PATH, id)))
            .await?;
        if response.status == 404 {
            return Err(Error::NotFound(format!("index {}", id)));
        }
        response.error_for_status()?;
        tracing::info!(index = id, "Index deleted");
        Ok(())
    }
}
