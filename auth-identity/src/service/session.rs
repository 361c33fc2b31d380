use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{CacheError, IdentityError, Result};
use crate::models::Session;
use crate::session::SessionStore;

/// Cookie session use cases. Sessions are created after a successful
/// register or login and are independent of the bearer token.
#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, user_id: Uuid) -> Result<String> {
        let id = self.sessions.create(user_id).await?;
        debug!("session created");
        Ok(id)
    }

    /// A missing or expired session is `Unauthorized`.
    #[instrument(skip_all)]
    pub async fn resolve(&self, session_id: &str) -> Result<Session> {
        match self.sessions.get_by_id(session_id).await {
            Ok(session) => Ok(session),
            Err(CacheError::Miss) => Err(IdentityError::Unauthorized),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip_all)]
    pub async fn revoke(&self, session_id: &str) -> Result<()> {
        self.sessions.delete_by_id(session_id).await?;
        Ok(())
    }
}
