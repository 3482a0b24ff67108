use arango_core::{DocumentHandle, Error, Response, Result};

/// Lifecycle of a document or edge entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Constructed locally, no id yet
    Transient,
    /// Bound to a record in the store
    Persisted,
    /// Deleted; every further operation fails with `NotFound`
    Deleted,
}

/// Anything that can name a document in the store
pub trait AsHandle {
    fn to_handle(&self) -> Result<DocumentHandle>;
}

impl AsHandle for DocumentHandle {
    fn to_handle(&self) -> Result<DocumentHandle> {
        Ok(self.clone())
    }
}

impl AsHandle for str {
    fn to_handle(&self) -> Result<DocumentHandle> {
        DocumentHandle::parse(self)
    }
}

impl AsHandle for String {
    fn to_handle(&self) -> Result<DocumentHandle> {
        DocumentHandle::parse(self)
    }
}

impl<T: AsHandle + ?Sized> AsHandle for &T {
    fn to_handle(&self) -> Result<DocumentHandle> {
        (**self).to_handle()
    }
}

/// Guard for operations that need a live record
pub(crate) fn require_persisted(
    state: EntityState,
    id: Option<&DocumentHandle>,
) -> Result<DocumentHandle> {
    match (state, id) {
        (EntityState::Persisted, Some(id)) => Ok(id.clone()),
        (EntityState::Deleted, Some(id)) => Err(Error::NotFound(format!("{} was deleted", id))),
        _ => Err(Error::NotFound("entity has not been created".to_string())),
    }
}

/// Guard for `create` on an entity
pub(crate) fn require_transient(state: EntityState, id: Option<&DocumentHandle>) -> Result<()> {
    match (state, id) {
        (EntityState::Transient, None) => Ok(()),
        (EntityState::Deleted, Some(id)) => Err(Error::NotFound(format!("{} was deleted", id))),
        (_, Some(id)) => Err(Error::AlreadyExists(format!("already created with id {}", id))),
        (_, None) => Err(Error::AlreadyExists("entity is already bound".to_string())),
    }
}

/// Map a 404 for a specific record to `NotFound`, other failures to `RemoteStore`
pub(crate) fn expect_found(response: Response, handle: &DocumentHandle) -> Result<Response> {
    if response.status == 404 {
        return Err(Error::NotFound(handle.to_string()));
    }
    response.error_for_status()
}
