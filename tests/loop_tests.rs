//! End-to-end tests of the turn loop against a scripted gateway.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_stream::StreamExt;

use cmdsage::agent::App;
use cmdsage::agent_loop::{LoopRunner, RunInput};
use cmdsage::error::CmdsageError;
use cmdsage::gateway::ModelReply;
use cmdsage::session::{MemorySessionStore, SessionId, SessionStore};
use cmdsage::tools::ToolRegistry;
use cmdsage::types::{Role, Turn};

use common::{call, counting_tool, failing_tool, final_response, ScriptedGateway};

fn app_with(
    gateway: Arc<ScriptedGateway>,
    registry: ToolRegistry,
    store: Arc<MemorySessionStore>,
) -> App {
    App::with_parts(gateway, Arc::new(registry), store)
}

#[tokio::test]
async fn no_tool_run_reaches_done_with_structured_answer() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.queue(ModelReply::Answer("no tools needed".into()));
    gateway.queue(ModelReply::StructuredAnswer(final_response(
        Some("ls -l"),
        0.92,
    )));
    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway.clone(), ToolRegistry::new(), store.clone());

    let (id, response) = app
        .start("list all files in the current directory")
        .await
        .unwrap();

    assert_eq!(response.command.as_deref(), Some("ls -l"));
    assert!(!response.explanation.is_empty());
    assert!((0.0..=1.0).contains(&response.confidence));

    // The interim free-text answer is discarded: system, user, final summary.
    let turns = store.load(&id).await.unwrap();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].role, Role::System);
    assert_eq!(turns[1].role, Role::User);
    assert_eq!(turns[2].role, Role::Agent);
    assert!(turns[2].text().unwrap().contains("ls -l"));

    // Two gateway calls: the routing call, then the structured finalize.
    let calls = gateway.calls();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].structured);
    assert!(calls[1].structured);

    assert_eq!(store.final_response(&id).await.unwrap(), Some(response));
}

#[tokio::test]
async fn tool_wave_executes_and_correlates_results() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.queue(ModelReply::ToolCallBatch(vec![
        call("c1", "is_installed"),
        call("c2", "get_table_schema"),
    ]));
    gateway.queue(ModelReply::Answer("done".into()));
    gateway.queue(ModelReply::StructuredAnswer(final_response(
        Some("curl ..."),
        0.7,
    )));

    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(counting_tool("is_installed", counter.clone()));
    registry.register(counting_tool("get_table_schema", counter.clone()));

    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway.clone(), registry, store.clone());

    let (id, _response) = app
        .start("is curl installed, and show the schema of table users")
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2);

    let turns = store.load(&id).await.unwrap();
    // system, user, wave, two results, final summary
    assert_eq!(turns.len(), 6);
    assert_eq!(turns[2].tool_calls().len(), 2);

    // Every result correlates with exactly one call of the preceding wave.
    let wave_ids: Vec<&str> = turns[2].tool_calls().iter().map(|c| c.call_id.as_str()).collect();
    let result_ids: Vec<&str> = [&turns[3], &turns[4]]
        .iter()
        .map(|t| t.as_tool_result().unwrap().call_id.as_str())
        .collect();
    assert_eq!(wave_ids, result_ids);

    // Sequence numbers are monotonic with no gaps.
    for (i, turn) in turns.iter().enumerate() {
        assert_eq!(turn.sequence_number, i as u64);
    }

    // The model saw the tool catalog on the routing calls only.
    let calls = gateway.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0].catalog_names,
        vec!["get_table_schema", "is_installed"]
    );
    assert!(calls[2].structured);
    assert!(calls[2].catalog_names.is_empty());
}

#[tokio::test]
async fn tool_failure_becomes_conversation_data() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.queue(ModelReply::ToolCallBatch(vec![call("c1", "flaky")]));
    gateway.queue(ModelReply::Answer("saw the error".into()));
    gateway.queue(ModelReply::StructuredAnswer(final_response(None, 0.3)));

    let mut registry = ToolRegistry::new();
    registry.register(failing_tool("flaky"));

    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway.clone(), registry, store.clone());

    let (id, response) = app.start("try the flaky tool").await.unwrap();
    assert!(response.command.is_none());

    let turns = store.load(&id).await.unwrap();
    let result = turns[3].as_tool_result().unwrap();
    assert!(result.is_error());
    assert!(result.error.as_ref().unwrap().contains("deliberate failure"));

    // The error was shown to the model on the next routing call.
    let second_call = &gateway.calls()[1];
    assert!(second_call
        .history
        .iter()
        .any(|t| t.as_tool_result().map(|r| r.is_error()).unwrap_or(false)));
}

#[tokio::test]
async fn unknown_tool_escalates_to_caller() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.queue(ModelReply::ToolCallBatch(vec![call("c1", "not_registered")]));

    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway, ToolRegistry::new(), store);

    let err = app.start("use a ghost tool").await.unwrap_err();
    assert!(matches!(err, CmdsageError::UnknownTool(name) if name == "not_registered"));
}

#[tokio::test]
async fn backend_failure_leaves_session_resumable_without_duplicates() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.queue_error("connect timeout");

    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway.clone(), ToolRegistry::new(), store.clone());

    // Streaming start so the session id survives the failure.
    let (id, mut stream) = app.start_stream("list files").await.unwrap();
    let mut yielded = Vec::new();
    while let Some(item) = stream.next().await {
        yielded.push(item);
    }
    assert!(matches!(
        yielded.last().unwrap(),
        Err(CmdsageError::BackendUnavailable { .. })
    ));

    // Everything appended before the failing call is durable.
    let turns = store.load(&id).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::System);
    assert_eq!(turns[1].role, Role::User);
    assert!(store.final_response(&id).await.unwrap().is_none());

    // A later resume picks up cleanly: one new user turn, no duplicates.
    gateway.queue(ModelReply::Answer("ready now".into()));
    gateway.queue(ModelReply::StructuredAnswer(final_response(
        Some("ls"),
        0.8,
    )));
    let response = app.resume(&id, "try again").await.unwrap();
    assert_eq!(response.command.as_deref(), Some("ls"));

    let turns = store.load(&id).await.unwrap();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[2].text(), Some("try again"));
    for (i, turn) in turns.iter().enumerate() {
        assert_eq!(turn.sequence_number, i as u64);
    }
}

#[tokio::test]
async fn resume_settles_interrupted_wave_without_reexecuting() {
    let store = Arc::new(MemorySessionStore::new());
    let id = store.create().await.unwrap();

    // History persisted through EXECUTING_TOOLS: the wave asked for two
    // calls but only the first result landed before the crash.
    store.append(&id, Turn::user(0, "check tools")).await.unwrap();
    store
        .append(
            &id,
            Turn::agent_tool_calls(1, vec![call("c1", "probe"), call("c2", "probe")]),
        )
        .await
        .unwrap();
    store
        .append(
            &id,
            Turn::tool_result(2, cmdsage::types::ToolResult::ok("c1", serde_json::json!({}))),
        )
        .await
        .unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(counting_tool("probe", counter.clone()));

    let gateway = Arc::new(ScriptedGateway::new());
    gateway.queue(ModelReply::Answer("all settled".into()));
    gateway.queue(ModelReply::StructuredAnswer(final_response(None, 0.5)));

    let runner = LoopRunner::new(gateway.clone(), Arc::new(registry), store.clone());
    runner
        .run(&id, RunInput::follow_up("continue"), None)
        .await
        .unwrap();

    // Only the unanswered call ran.
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let turns = store.load(&id).await.unwrap();
    // ... + c2 result, new user turn, final summary
    assert_eq!(turns.len(), 6);
    assert_eq!(turns[3].as_tool_result().unwrap().call_id, "c2");
    assert_eq!(turns[4].text(), Some("continue"));
}

#[tokio::test]
async fn completed_session_reopens_with_fresh_input() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.queue(ModelReply::Answer("first".into()));
    gateway.queue(ModelReply::StructuredAnswer(final_response(
        Some("ls"),
        0.9,
    )));
    gateway.queue(ModelReply::Answer("second".into()));
    gateway.queue(ModelReply::StructuredAnswer(final_response(
        Some("ls -a"),
        0.6,
    )));

    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway, ToolRegistry::new(), store.clone());

    let (id, first) = app.start("list files").await.unwrap();
    assert_eq!(first.command.as_deref(), Some("ls"));

    let second = app.resume(&id, "include hidden files").await.unwrap();
    assert_eq!(second.command.as_deref(), Some("ls -a"));
    assert_eq!(store.final_response(&id).await.unwrap(), Some(second));
}

#[tokio::test]
async fn resume_of_unknown_session_is_not_found() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway, ToolRegistry::new(), store);

    let err = app
        .resume(&SessionId::from("missing"), "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, CmdsageError::SessionNotFound(_)));

    // Streaming resume surfaces the same error before spawning anything.
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway, ToolRegistry::new(), store);
    let err = app
        .resume_stream(&SessionId::from("missing"), "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, CmdsageError::SessionNotFound(_)));
}

#[tokio::test]
async fn stream_yields_turns_in_append_order_then_ends() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.queue(ModelReply::ToolCallBatch(vec![call("c1", "probe")]));
    gateway.queue(ModelReply::Answer("done".into()));
    gateway.queue(ModelReply::StructuredAnswer(final_response(
        Some("df -h"),
        0.85,
    )));

    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(counting_tool("probe", counter));

    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(gateway, registry, store.clone());

    let (id, mut stream) = app.start_stream("how much disk space").await.unwrap();
    let mut roles = Vec::new();
    while let Some(item) = stream.next().await {
        roles.push(item.unwrap().role);
    }
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Agent,
            Role::ToolResult,
            Role::Agent
        ]
    );

    // After full consumption the terminal result is retrievable.
    let response = app.final_response(&id).await.unwrap().unwrap();
    assert_eq!(response.command.as_deref(), Some("df -h"));
}
