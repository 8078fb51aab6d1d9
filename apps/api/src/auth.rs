//! Request identity. An upstream gateway authenticates the caller and forwards
//! their id in `X-User-Id`; this module only resolves it to a stored user.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::image::ImageRecord;
use crate::models::user::User;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct Actor(pub User);

impl Actor {
    pub fn user(&self) -> &User {
        &self.0
    }

    /// Owner filter for listings: `None` for admins (everything visible).
    pub fn visible_owner(&self) -> Option<Uuid> {
        if self.0.role.is_admin() {
            None
        } else {
            Some(self.0.id)
        }
    }

    pub fn can_access(&self, image: &ImageRecord) -> bool {
        self.0.role.is_admin() || image.user_id == self.0.id
    }

    pub fn ensure_can_access(&self, image: &ImageRecord) -> Result<(), AppError> {
        if self.can_access(image) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or(AppError::Unauthorized)?;

        let user = state
            .repo
            .get_user(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(Actor(user))
    }
}
