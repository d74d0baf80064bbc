//! Pure state machine for the turn loop.
//!
//! The transition function is side-effect free: it consumes a phase and an
//! event and yields the next phase plus the turns to append. All I/O (the
//! gateway, the tool registry, the session store) lives in the runner, which
//! keeps these transitions deterministic and unit-testable without a live
//! backend.

use std::collections::HashSet;

use crate::error::{CmdsageError, Result};
use crate::gateway::ModelReply;
use crate::types::{FinalResponse, ToolCallRequest, ToolResult, Turn};

/// Loop phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingModel,
    ExecutingTools,
    Finalizing,
    Done,
}

/// Events fed into the transition function by the runner.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// The gateway replied during `AwaitingModel`.
    ModelReplied(ModelReply),
    /// All calls of the current wave finished, in request order.
    ToolsCompleted(Vec<ToolResult>),
    /// The structured finalize call produced the terminal answer.
    Finalized(FinalResponse),
}

/// Outcome of one transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub next: Phase,
    pub appended: Vec<Turn>,
}

/// Advance the state machine by one event.
///
/// `next_seq` is the sequence number the first appended turn receives;
/// subsequent turns in the same transition number consecutively.
pub fn advance(phase: Phase, next_seq: u64, event: LoopEvent) -> Result<Transition> {
    match (phase, event) {
        (Phase::AwaitingModel, LoopEvent::ModelReplied(reply)) => match reply {
            // The only branch point, evaluated structurally: a non-empty
            // batch routes to tools, anything else finalizes.
            ModelReply::ToolCallBatch(calls) if !calls.is_empty() => Ok(Transition {
                next: Phase::ExecutingTools,
                appended: vec![Turn::agent_tool_calls(next_seq, calls)],
            }),
            ModelReply::ToolCallBatch(_) | ModelReply::Answer(_) => Ok(Transition {
                // The interim free text exists only to signal "no more
                // tools"; it is discarded, not appended.
                next: Phase::Finalizing,
                appended: Vec::new(),
            }),
            ModelReply::StructuredAnswer(_) => Err(CmdsageError::backend(
                "unexpected structured answer outside finalize",
            )),
        },
        (Phase::ExecutingTools, LoopEvent::ToolsCompleted(results)) => {
            let appended = results
                .into_iter()
                .enumerate()
                .map(|(i, result)| Turn::tool_result(next_seq + i as u64, result))
                .collect();
            Ok(Transition {
                next: Phase::AwaitingModel,
                appended,
            })
        }
        (Phase::Finalizing, LoopEvent::Finalized(response)) => {
            let summary = serde_json::to_string(&response)?;
            Ok(Transition {
                next: Phase::Done,
                appended: vec![Turn::agent_text(next_seq, summary)],
            })
        }
        (phase, event) => Err(CmdsageError::InvalidState(format!(
            "event {event:?} is not valid in phase {phase:?}"
        ))),
    }
}

/// The next sequence number for a history.
pub fn next_sequence(history: &[Turn]) -> u64 {
    history
        .last()
        .map(|turn| turn.sequence_number + 1)
        .unwrap_or(0)
}

/// Calls from the most recent wave that have no matching result yet.
///
/// Walks back over trailing `tool_result` turns to the wave that opened
/// them. Returns an empty vec when the history does not end inside a wave.
pub fn pending_wave(history: &[Turn]) -> Vec<ToolCallRequest> {
    let mut answered: HashSet<&str> = HashSet::new();
    for turn in history.iter().rev() {
        if let Some(result) = turn.as_tool_result() {
            answered.insert(&result.call_id);
            continue;
        }
        let calls = turn.tool_calls();
        if !calls.is_empty() {
            return calls
                .iter()
                .filter(|call| !answered.contains(call.call_id.as_str()))
                .cloned()
                .collect();
        }
        break;
    }
    Vec::new()
}
