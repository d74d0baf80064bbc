//! In-memory session store, mainly for tests and embedding.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::store::{SessionId, SessionStore};
use crate::error::{CmdsageError, Result};
use crate::types::{FinalResponse, Turn};

#[derive(Debug, Default)]
struct Record {
    turns: Vec<Turn>,
    final_response: Option<FinalResponse>,
    /// Turn count at the moment the final response was recorded; used to
    /// tell a conflicting overwrite from a legitimately reopened session.
    finalized_turn_count: usize,
}

/// Session store backed by process memory.
///
/// Each session owns its own lock, so appends to one session never block
/// another.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Record>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, id: &SessionId) -> Result<Arc<Mutex<Record>>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CmdsageError::SessionNotFound(id.to_string()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self) -> Result<SessionId> {
        let id = SessionId::generate();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(Record::default())));
        Ok(id)
    }

    async fn append(&self, id: &SessionId, turn: Turn) -> Result<()> {
        let record = self.record(id).await?;
        record.lock().await.turns.push(turn);
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Vec<Turn>> {
        let record = self.record(id).await?;
        let record = record.lock().await;
        Ok(record.turns.clone())
    }

    async fn record_final(&self, id: &SessionId, response: FinalResponse) -> Result<()> {
        let record = self.record(id).await?;
        let mut record = record.lock().await;
        let reopened = record.turns.len() > record.finalized_turn_count;
        match &record.final_response {
            Some(existing) if *existing == response => Ok(()),
            Some(_) if !reopened => Err(CmdsageError::AlreadyFinalized {
                session_id: id.to_string(),
            }),
            // First finalize, or a reopened session reaching a new terminal
            // answer: the new value supersedes.
            _ => {
                record.finalized_turn_count = record.turns.len();
                record.final_response = Some(response);
                Ok(())
            }
        }
    }

    async fn final_response(&self, id: &SessionId) -> Result<Option<FinalResponse>> {
        let record = self.record(id).await?;
        let record = record.lock().await;
        Ok(record.final_response.clone())
    }
}
