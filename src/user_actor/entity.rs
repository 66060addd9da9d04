//! [`ActorEntity`] implementation for [`User`].

use async_trait::async_trait;

use super::error::UserError;
use crate::framework::ActorEntity;
use crate::model::{User, UserCreate, UserId, UserUpdate};

fn validate_email(email: &str) -> Result<(), UserError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(UserError::ValidationError(format!("invalid email: {email}"))),
    }
}

#[async_trait]
impl ActorEntity for User {
    type Id = UserId;
    type Create = UserCreate;
    type Update = UserUpdate;
    type Action = ();
    type ActionResult = ();
    type Error = UserError;

    fn from_create_params(id: UserId, params: UserCreate) -> Result<Self, UserError> {
        if params.name.trim().is_empty() {
            return Err(UserError::ValidationError("name is required".into()));
        }
        validate_email(&params.email)?;
        Ok(Self::new(id, params.name, params.email))
    }

    /// Handles updates to the User entity.
    ///
    /// # Fields Updated
    /// - `name`: User's display name
    /// - `email`: User's email address (validated)
    async fn on_update(&mut self, update: UserUpdate) -> Result<(), UserError> {
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        Ok(())
    }

    async fn handle_action(&mut self, _action: ()) -> Result<(), UserError> {
        Ok(())
    }
}
