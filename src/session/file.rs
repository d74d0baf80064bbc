//! File-backed session store: one JSONL file per session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::store::{SessionId, SessionStore};
use crate::error::{CmdsageError, Result};
use crate::types::{FinalResponse, Turn};

/// One line in a session file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum StoreRecord {
    Turn { turn: Turn },
    Final { response: FinalResponse },
}

#[derive(Debug, Default)]
struct Records {
    turns: Vec<Turn>,
    final_response: Option<FinalResponse>,
    /// Turns appended after the last final record; non-zero means the
    /// session was reopened with fresh input.
    turns_since_final: usize,
}

/// Durable session store writing newline-delimited JSON under a directory.
///
/// Appends are flushed with `sync_data` before the call returns; a crash
/// between turns leaves a prefix of whole lines, which `load` reads back as
/// valid, resumable state. A per-session async mutex enforces the
/// single-writer-per-session discipline while unrelated sessions write
/// concurrently.
pub struct FileSessionStore {
    dir: PathBuf,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl FileSessionStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &SessionId) -> PathBuf {
        // Ids are generator-assigned uuids; they are safe as file names.
        self.dir.join(format!("{id}.jsonl"))
    }

    async fn lock_for(&self, id: &SessionId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    async fn read_records(&self, id: &SessionId) -> Result<Records> {
        let raw = match tokio::fs::read_to_string(self.path(id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CmdsageError::SessionNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Records::default();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<StoreRecord>(line)? {
                StoreRecord::Turn { turn } => {
                    records.turns.push(turn);
                    records.turns_since_final += 1;
                }
                StoreRecord::Final { response } => {
                    records.final_response = Some(response);
                    records.turns_since_final = 0;
                }
            }
        }
        Ok(records)
    }

    async fn append_record(&self, id: &SessionId, record: &StoreRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = match tokio::fs::OpenOptions::new()
            .append(true)
            .open(self.path(id))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CmdsageError::SessionNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self) -> Result<SessionId> {
        let id = SessionId::generate();
        let file = tokio::fs::File::create(self.path(&id)).await?;
        file.sync_all().await?;
        debug!(session = %id, "created session file");
        Ok(id)
    }

    async fn append(&self, id: &SessionId, turn: Turn) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;
        self.append_record(id, &StoreRecord::Turn { turn }).await
    }

    async fn load(&self, id: &SessionId) -> Result<Vec<Turn>> {
        Ok(self.read_records(id).await?.turns)
    }

    async fn record_final(&self, id: &SessionId, response: FinalResponse) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let records = self.read_records(id).await?;
        match &records.final_response {
            Some(existing) if *existing == response => Ok(()),
            Some(_) if records.turns_since_final == 0 => Err(CmdsageError::AlreadyFinalized {
                session_id: id.to_string(),
            }),
            // First finalize, or a reopened session reaching a new terminal
            // answer. The log keeps every final record; the latest wins.
            _ => {
                self.append_record(id, &StoreRecord::Final { response })
                    .await
            }
        }
    }

    async fn final_response(&self, id: &SessionId) -> Result<Option<FinalResponse>> {
        Ok(self.read_records(id).await?.final_response)
    }
}
