//! Drives the state machine against the gateway, registry, and store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::machine::{self, LoopEvent, Phase};
use crate::error::{CmdsageError, Result};
use crate::gateway::{ModelGateway, ModelReply, ToolDefinition};
use crate::session::{SessionId, SessionStore};
use crate::tools::{Tool, ToolRegistry};
use crate::types::{FinalResponse, ToolCallRequest, Turn};

/// Upper bound on model round-trips per run; a loop that never stops asking
/// for tools is treated as a backend failure.
const MAX_WAVES: usize = 20;

/// Sink for streaming intermediate turns out of a run.
pub type TurnSink = mpsc::Sender<Result<Turn>>;

/// Input for one run of the loop.
#[derive(Debug, Clone)]
pub struct RunInput {
    pub user_text: String,
    /// Prepended once, when the history is still empty.
    pub system_prompt: Option<String>,
}

impl RunInput {
    /// Input for a fresh session: system prompt plus the opening request.
    pub fn opening(user_text: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            system_prompt: Some(system_prompt.into()),
        }
    }

    /// Input for a resumed session: the new user turn only.
    pub fn follow_up(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            system_prompt: None,
        }
    }
}

/// Executes runs: loads durable history, iterates the state machine, and
/// appends every produced turn before the next suspension point.
pub struct LoopRunner {
    gateway: Arc<dyn ModelGateway>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn SessionStore>,
}

impl LoopRunner {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            gateway,
            registry,
            store,
        }
    }

    /// Drive a session to its final response.
    ///
    /// Turns are appended to the store (and emitted to `sink`, when given)
    /// as they are produced. A gateway failure propagates to the caller with
    /// everything appended so far left durable, so the session can be
    /// resumed from its last turn.
    pub async fn run(
        &self,
        session_id: &SessionId,
        input: RunInput,
        sink: Option<&TurnSink>,
    ) -> Result<FinalResponse> {
        let mut history = self.store.load(session_id).await?;
        info!(session = %session_id, turns = history.len(), "run start");

        // A previous run may have been cut off mid-wave; settle the
        // unanswered calls before accepting new input. Answered calls are
        // never re-executed.
        let pending = machine::pending_wave(&history);
        if !pending.is_empty() {
            debug!(session = %session_id, pending = pending.len(), "settling interrupted wave");
            self.execute_wave(session_id, &mut history, &pending, sink)
                .await?;
        }

        if history.is_empty() {
            if let Some(prompt) = &input.system_prompt {
                let turn = Turn::system(0, prompt);
                self.apply(session_id, &mut history, vec![turn], sink).await?;
            }
        }
        let user_turn = Turn::user(machine::next_sequence(&history), &input.user_text);
        self.apply(session_id, &mut history, vec![user_turn], sink)
            .await?;

        let catalog = self.catalog();
        let mut phase = Phase::AwaitingModel;
        let mut waves = 0usize;

        loop {
            match phase {
                Phase::AwaitingModel => {
                    waves += 1;
                    if waves > MAX_WAVES {
                        return Err(CmdsageError::backend(
                            "tool loop exceeded maximum iterations",
                        ));
                    }
                    let reply = self.gateway.converse(&history, &catalog, false).await?;
                    let transition = machine::advance(
                        phase,
                        machine::next_sequence(&history),
                        LoopEvent::ModelReplied(reply),
                    )?;
                    self.apply(session_id, &mut history, transition.appended, sink)
                        .await?;
                    phase = transition.next;
                }
                Phase::ExecutingTools => {
                    let wave = machine::pending_wave(&history);
                    self.execute_wave(session_id, &mut history, &wave, sink)
                        .await?;
                    phase = Phase::AwaitingModel;
                }
                Phase::Finalizing => {
                    let reply = self.gateway.converse(&history, &[], true).await?;
                    let ModelReply::StructuredAnswer(response) = reply else {
                        return Err(CmdsageError::backend(
                            "finalize call did not produce a structured answer",
                        ));
                    };
                    let transition = machine::advance(
                        phase,
                        machine::next_sequence(&history),
                        LoopEvent::Finalized(response.clone()),
                    )?;
                    self.apply(session_id, &mut history, transition.appended, sink)
                        .await?;
                    self.store.record_final(session_id, response.clone()).await?;
                    info!(session = %session_id, waves, "run finished");
                    return Ok(response);
                }
                Phase::Done => {
                    // Finalizing returns; the loop never observes Done.
                    unreachable!("loop exited before reaching Done");
                }
            }
        }
    }

    fn catalog(&self) -> Vec<ToolDefinition> {
        self.registry
            .tools()
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters().schema.clone(),
            })
            .collect()
    }

    /// Execute one wave. Calls run concurrently; results are appended in
    /// request order, each carrying its originating call id.
    async fn execute_wave(
        &self,
        session_id: &SessionId,
        history: &mut Vec<Turn>,
        wave: &[ToolCallRequest],
        sink: Option<&TurnSink>,
    ) -> Result<()> {
        debug!(session = %session_id, wave_size = wave.len(), "executing tool wave");
        let results = futures::future::try_join_all(
            wave.iter().map(|call| self.registry.execute(call)),
        )
        .await?;

        let transition = machine::advance(
            Phase::ExecutingTools,
            machine::next_sequence(history),
            LoopEvent::ToolsCompleted(results),
        )?;
        self.apply(session_id, history, transition.appended, sink)
            .await
    }

    /// Durably append turns, then mirror them into the in-memory history
    /// and the streaming sink. A dropped sink (caller went away) does not
    /// stop the run; the store stays consistent regardless.
    async fn apply(
        &self,
        session_id: &SessionId,
        history: &mut Vec<Turn>,
        appended: Vec<Turn>,
        sink: Option<&TurnSink>,
    ) -> Result<()> {
        for turn in appended {
            self.store.append(session_id, turn.clone()).await?;
            if let Some(sink) = sink {
                let _ = sink.send(Ok(turn.clone())).await;
            }
            history.push(turn);
        }
        Ok(())
    }
}
