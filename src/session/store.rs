//! The session store contract.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{FinalResponse, Turn};

/// Opaque, collision-resistant session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier (uuid v4 rendered as text).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Durable, keyed-by-session-id append log of conversation turns.
///
/// Every `append` is persisted before the call returns, so a crash between
/// turns can be recovered by `load` returning exactly the turns written so
/// far. Implementations serialize concurrent writes per session id while
/// letting unrelated sessions proceed unimpeded.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new, empty session.
    async fn create(&self) -> Result<SessionId>;

    /// Append one turn to a session's log.
    async fn append(&self, id: &SessionId, turn: Turn) -> Result<()>;

    /// Load a session's full turn log, in append order.
    ///
    /// Fails with [`CmdsageError::SessionNotFound`](crate::error::CmdsageError::SessionNotFound)
    /// for unknown ids.
    async fn load(&self, id: &SessionId) -> Result<Vec<Turn>>;

    /// Record the session's terminal result.
    ///
    /// Idempotent when called again with an identical value; fails with
    /// [`CmdsageError::AlreadyFinalized`](crate::error::CmdsageError::AlreadyFinalized)
    /// when called with a different one.
    async fn record_final(&self, id: &SessionId, response: FinalResponse) -> Result<()>;

    /// The recorded terminal result, if the session has reached one.
    async fn final_response(&self, id: &SessionId) -> Result<Option<FinalResponse>>;
}
