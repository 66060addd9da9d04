use crate::clients::actor_client::{recover_entity_error, ActorClient};
use crate::clients::collaborators::{CollaboratorError, IdentityProvider};
use crate::framework::{FrameworkError, ResourceClient};
use crate::model::{User, UserCreate, UserUpdate};
use crate::user_actor::UserError;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Client for interacting with the User actor.
#[derive(Clone)]
pub struct UserClient {
    inner: ResourceClient<User>,
}

impl UserClient {
    pub fn new(inner: ResourceClient<User>) -> Self {
        Self { inner }
    }

    #[instrument(skip(self))]
    pub async fn create_user(&self, user: UserCreate) -> Result<User, UserError> {
        debug!("Sending request");
        self.inner.create(user).await.map_err(Self::map_error)
    }

    #[instrument(skip(self))]
    pub async fn update_user(&self, id: String, update: UserUpdate) -> Result<User, UserError> {
        debug!("Sending request");
        self.inner.update(id, update).await.map_err(Self::map_error)
    }
}

#[async_trait]
impl ActorClient<User> for UserClient {
    type Error = UserError;

    fn inner(&self) -> &ResourceClient<User> {
        &self.inner
    }

    fn map_error(e: FrameworkError) -> Self::Error {
        recover_entity_error(
            e,
            UserError::NotFound,
            UserError::ValidationError,
            UserError::ActorCommunicationError,
        )
    }
}

#[async_trait]
impl IdentityProvider for UserClient {
    async fn user_exists(&self, user_id: &str) -> Result<bool, CollaboratorError> {
        self.get(user_id.to_string())
            .await
            .map(|user| user.is_some())
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))
    }
}
