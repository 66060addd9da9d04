use crate::framework::{ActorEntity, FrameworkError, ResourceClient};
use async_trait::async_trait;
use std::error::Error;

/// Trait for resource-specific clients to inherit standard CRUD operations.
///
/// This trait reduces boilerplate by providing default implementations for
/// common operations like `get`, `list` and `delete`.
#[async_trait]
pub trait ActorClient<T: ActorEntity>: Send + Sync {
    /// The resource-specific error type.
    type Error: Send + Sync;

    /// Access the inner generic ResourceClient.
    fn inner(&self) -> &ResourceClient<T>;

    /// Map framework errors to the specific resource error type.
    fn map_error(e: FrameworkError) -> Self::Error;

    /// Fetch an entity by ID.
    #[tracing::instrument(skip(self))]
    async fn get(&self, id: T::Id) -> Result<Option<T>, Self::Error> {
        tracing::debug!("Sending request");
        self.inner().get(id).await.map_err(Self::map_error)
    }

    /// Fetch every entity held by the actor.
    #[tracing::instrument(skip(self))]
    async fn list(&self) -> Result<Vec<T>, Self::Error> {
        tracing::debug!("Sending request");
        self.inner().list().await.map_err(Self::map_error)
    }

    /// Delete an entity by ID.
    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: T::Id) -> Result<(), Self::Error> {
        tracing::debug!("Sending request");
        self.inner().delete(id).await.map_err(Self::map_error)
    }
}

/// Shared body for `map_error`: typed entity errors pass through, framework
/// `NotFound`/`AlreadyExists` go to the given constructors, and anything else is a
/// transport failure.
pub(crate) fn recover_entity_error<E: Error + 'static>(
    e: FrameworkError,
    not_found: impl FnOnce(String) -> E,
    already_exists: impl FnOnce(String) -> E,
    unavailable: impl FnOnce(String) -> E,
) -> E {
    match e.into_entity_error::<E>() {
        Ok(typed) => typed,
        Err(FrameworkError::NotFound(id)) => not_found(id),
        Err(FrameworkError::AlreadyExists(id)) => already_exists(id),
        Err(other) => unavailable(other.to_string()),
    }
}
