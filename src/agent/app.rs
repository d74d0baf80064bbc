//! The `App` façade: start and resume conversations.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::agent_loop::{LoopRunner, RunInput};
use crate::config::CmdsageConfig;
use crate::error::Result;
use crate::gateway::{GeminiGateway, ModelGateway};
use crate::session::{FileSessionStore, SessionId, SessionStore};
use crate::tools::db::Database;
use crate::tools::{builtin, ToolRegistry};
use crate::types::{FinalResponse, Turn};

/// Lazy, single-pass, forward-only sequence of intermediate turns.
///
/// Ends when the session reaches its final response (or a gateway error,
/// which is yielded as the last item). After consuming it, fetch the
/// terminal result with [`App::final_response`].
pub type TurnStream = ReceiverStream<Result<Turn>>;

/// Public entry points for driving conversations.
pub struct App {
    runner: Arc<LoopRunner>,
    store: Arc<dyn SessionStore>,
    system_prompt: String,
}

impl App {
    /// Wire up the default collaborators from configuration: the Gemini
    /// gateway, the builtin tool catalog, and a file-backed session store.
    pub fn new(config: &CmdsageConfig) -> Result<Self> {
        let api_key = config.require_api_key()?;
        let mut gateway = GeminiGateway::new(&config.model, api_key);
        if let Some(base_url) = &config.base_url {
            gateway = gateway.with_base_url(base_url);
        }

        let db = match &config.connection_string {
            Some(url) => Some(Arc::new(Database::connect_lazy(url)?)),
            None => None,
        };
        let mut registry = ToolRegistry::new();
        for tool in builtin::all_tools(db) {
            registry.register(tool);
        }

        let store = Arc::new(FileSessionStore::new(config.session_dir()?)?);
        Ok(Self::with_parts(
            Arc::new(gateway),
            Arc::new(registry),
            store,
        ))
    }

    /// Assemble a façade from explicit collaborators.
    pub fn with_parts(
        gateway: Arc<dyn ModelGateway>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            runner: Arc::new(LoopRunner::new(gateway, registry, store.clone())),
            store,
            system_prompt: crate::prompt::SYS_PROMPT.to_string(),
        }
    }

    /// Replace the default system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Start a new conversation and block until the final response.
    pub async fn start(&self, user_input: &str) -> Result<(SessionId, FinalResponse)> {
        let id = self.store.create().await?;
        let input = RunInput::opening(user_input, &self.system_prompt);
        let response = self.runner.run(&id, input, None).await?;
        Ok((id, response))
    }

    /// Resume an existing conversation with new input and block until the
    /// final response. A completed session reopens transparently.
    pub async fn resume(&self, id: &SessionId, user_input: &str) -> Result<FinalResponse> {
        self.runner
            .run(id, RunInput::follow_up(user_input), None)
            .await
    }

    /// Start a new conversation, streaming intermediate turns.
    pub async fn start_stream(&self, user_input: &str) -> Result<(SessionId, TurnStream)> {
        let id = self.store.create().await?;
        let input = RunInput::opening(user_input, &self.system_prompt);
        let stream = self.spawn_stream(id.clone(), input);
        Ok((id, stream))
    }

    /// Resume an existing conversation, streaming intermediate turns.
    pub async fn resume_stream(&self, id: &SessionId, user_input: &str) -> Result<TurnStream> {
        // Surface an unknown id to the caller now, not inside the task.
        self.store.load(id).await?;
        Ok(self.spawn_stream(id.clone(), RunInput::follow_up(user_input)))
    }

    /// The terminal result recorded for a session, if any.
    pub async fn final_response(&self, id: &SessionId) -> Result<Option<FinalResponse>> {
        self.store.final_response(id).await
    }

    fn spawn_stream(&self, id: SessionId, input: RunInput) -> TurnStream {
        let (tx, rx) = mpsc::channel(16);
        let runner = self.runner.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run(&id, input, Some(&tx)).await {
                // The receiver may already be gone; the store is consistent
                // either way.
                let _ = tx.send(Err(e)).await;
            }
        });
        ReceiverStream::new(rx)
    }
}
