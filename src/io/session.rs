use serde::{Deserialize, Serialize};

use crate::io::adapter::PersistenceError;
use crate::model::collection::Scope;
use crate::model::config::Config;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Error type for the current-user check
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not signed in: {0}")]
    Unauthenticated(String),
    #[error("could not check session: {0}")]
    Backend(#[from] PersistenceError),
}

/// Something that can say who the current user is.
pub trait SessionProvider {
    fn current_user(&self) -> Result<User, SessionError>;
}

/// Local mode has no server; the owner comes from `[local] owner`.
pub struct LocalSession {
    owner: Option<String>,
}

impl LocalSession {
    pub fn new(owner: Option<String>) -> Self {
        LocalSession { owner }
    }

    pub fn from_config(config: &Config) -> Self {
        LocalSession::new(config.local.owner.clone())
    }
}

impl SessionProvider for LocalSession {
    fn current_user(&self) -> Result<User, SessionError> {
        match self.owner.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(User {
                name: name.to_string(),
                email: String::new(),
            }),
            _ => Err(SessionError::Unauthenticated(
                "no owner set; run `nk init --owner NAME` or set [local] owner".into(),
            )),
        }
    }
}

/// Precondition for every collection command. Returns the owner scope for
/// backends that partition by user.
pub fn require_user(provider: &dyn SessionProvider) -> Result<(User, Scope), SessionError> {
    let user = provider.current_user()?;
    tracing::debug!(user = %user.name, "session ok");
    let scope = Scope::Owner(user.name.clone());
    Ok((user, scope))
}
