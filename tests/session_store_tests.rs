//! Durability and contract tests for the file-backed session store.

mod common;

use pretty_assertions::{assert_eq, assert_ne};

use cmdsage::error::CmdsageError;
use cmdsage::session::{FileSessionStore, SessionId, SessionStore};
use cmdsage::types::{ToolResult, Turn};

use common::final_response;

#[tokio::test]
async fn appends_survive_a_store_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let store = FileSessionStore::new(dir.path()).unwrap();
        let id = store.create().await.unwrap();
        store.append(&id, Turn::system(0, "prompt")).await.unwrap();
        store.append(&id, Turn::user(1, "list files")).await.unwrap();
        store
            .append(
                &id,
                Turn::tool_result(2, ToolResult::ok("c1", serde_json::json!({"installed": true}))),
            )
            .await
            .unwrap();
        id
    };

    // A fresh store over the same directory sees exactly the appended turns,
    // in append order.
    let store = FileSessionStore::new(dir.path()).unwrap();
    let turns = store.load(&id).await.unwrap();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].text(), Some("prompt"));
    assert_eq!(turns[1].text(), Some("list files"));
    assert_eq!(turns[2].as_tool_result().unwrap().call_id, "c1");
}

#[tokio::test]
async fn fresh_session_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path()).unwrap();
    let id = store.create().await.unwrap();
    assert!(store.load(&id).await.unwrap().is_empty());
    assert!(store.final_response(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path()).unwrap();
    let id = SessionId::from("does-not-exist");

    assert!(matches!(
        store.load(&id).await.unwrap_err(),
        CmdsageError::SessionNotFound(_)
    ));
    assert!(matches!(
        store.append(&id, Turn::user(0, "x")).await.unwrap_err(),
        CmdsageError::SessionNotFound(_)
    ));
    assert!(matches!(
        store
            .record_final(&id, final_response(None, 0.1))
            .await
            .unwrap_err(),
        CmdsageError::SessionNotFound(_)
    ));
}

#[tokio::test]
async fn record_final_is_idempotent_and_guards_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path()).unwrap();
    let id = store.create().await.unwrap();
    store.append(&id, Turn::user(0, "q")).await.unwrap();

    let response = final_response(Some("ls"), 0.9);
    store.record_final(&id, response.clone()).await.unwrap();

    // Identical value: no-op.
    store.record_final(&id, response.clone()).await.unwrap();
    assert_eq!(store.final_response(&id).await.unwrap(), Some(response));

    // Different value with no intervening turns: a bug, rejected.
    let err = store
        .record_final(&id, final_response(Some("pwd"), 0.5))
        .await
        .unwrap_err();
    assert!(matches!(err, CmdsageError::AlreadyFinalized { .. }));
}

#[tokio::test]
async fn reopened_session_supersedes_its_final_response() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path()).unwrap();
    let id = store.create().await.unwrap();

    store.append(&id, Turn::user(0, "q")).await.unwrap();
    store
        .record_final(&id, final_response(Some("ls"), 0.9))
        .await
        .unwrap();

    // Fresh input reopens the session; the next finalize wins.
    store.append(&id, Turn::user(1, "more")).await.unwrap();
    let superseding = final_response(Some("ls -a"), 0.7);
    store.record_final(&id, superseding.clone()).await.unwrap();

    assert_eq!(store.final_response(&id).await.unwrap(), Some(superseding));
    // The full turn log is untouched by finalization records.
    assert_eq!(store.load(&id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn final_response_survives_a_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let response = final_response(Some("df -h"), 0.8);

    let id = {
        let store = FileSessionStore::new(dir.path()).unwrap();
        let id = store.create().await.unwrap();
        store.append(&id, Turn::user(0, "disk?")).await.unwrap();
        store.record_final(&id, response.clone()).await.unwrap();
        id
    };

    let store = FileSessionStore::new(dir.path()).unwrap();
    assert_eq!(store.final_response(&id).await.unwrap(), Some(response));
}

#[tokio::test]
async fn sessions_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path()).unwrap();

    let a = store.create().await.unwrap();
    let b = store.create().await.unwrap();
    assert_ne!(a, b);

    store.append(&a, Turn::user(0, "for a")).await.unwrap();
    store.append(&b, Turn::user(0, "for b")).await.unwrap();

    assert_eq!(store.load(&a).await.unwrap()[0].text(), Some("for a"));
    assert_eq!(store.load(&b).await.unwrap()[0].text(), Some("for b"));
}
