//! Storage integration tests: schema idempotency, turn ordering, fact upserts.

use ringside::storage::Storage;

#[tokio::test]
async fn test_schema_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let storage = Storage::new(dir.path()).await.unwrap();
    storage.append_turn("u1", "hello", "user").await.unwrap();
    drop(storage);

    // Reopening the same directory re-runs the migrations without error
    // and finds the existing data.
    let storage = Storage::new(dir.path()).await.unwrap();
    assert_eq!(storage.turn_count("u1").await.unwrap(), 1);
    let rows = storage.recent_turns("u1", 5).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].message, "hello");
    assert_eq!(rows[0].role, "user");
}

#[tokio::test]
async fn test_opens_with_slow_query_logging_enabled() {
    let dir = tempfile::tempdir().unwrap();

    // Nonzero threshold takes the log_slow_statements path in the connect
    // options; queries must still work as usual.
    let storage = Storage::new_with_slow_query(dir.path(), 100).await.unwrap();
    storage.append_turn("u1", "hello", "user").await.unwrap();
    assert_eq!(storage.turn_count("u1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_recent_turns_returns_newest_window_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();

    for i in 1..=7 {
        storage
            .append_turn("u1", &format!("m{i}"), "user")
            .await
            .unwrap();
    }

    let rows = storage.recent_turns("u1", 5).await.unwrap();
    let messages: Vec<&str> = rows.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, vec!["m3", "m4", "m5", "m6", "m7"]);
}

#[tokio::test]
async fn test_recent_turns_short_history() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();

    storage.append_turn("u1", "only", "user").await.unwrap();

    let rows = storage.recent_turns("u1", 5).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_turns_are_scoped_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();

    storage.append_turn("alice", "hi", "user").await.unwrap();
    storage.append_turn("bob", "yo", "user").await.unwrap();

    let rows = storage.recent_turns("alice", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "alice");
    assert_eq!(storage.turn_count("bob").await.unwrap(), 1);
}

#[tokio::test]
async fn test_facts_default_to_empty_without_a_row() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();

    assert_eq!(storage.get_facts("u1").await.unwrap(), "");
    assert!(!storage.has_facts_row("u1").await.unwrap());
}

#[tokio::test]
async fn test_upsert_facts_inserts_then_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();

    storage.upsert_facts("u1", "first").await.unwrap();
    assert_eq!(storage.get_facts("u1").await.unwrap(), "first");

    storage.upsert_facts("u1", "first | second").await.unwrap();
    assert_eq!(storage.get_facts("u1").await.unwrap(), "first | second");
    assert!(storage.has_facts_row("u1").await.unwrap());

    // Other users are unaffected.
    assert_eq!(storage.get_facts("u2").await.unwrap(), "");
}

#[tokio::test]
async fn test_append_turn_returns_the_persisted_row() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();

    let row = storage
        .append_turn("u1", "body slam", "assistant")
        .await
        .unwrap();
    assert!(!row.id.is_empty());
    assert_eq!(row.user_id, "u1");
    assert_eq!(row.message, "body slam");
    assert_eq!(row.role, "assistant");
    assert!(!row.created_at.is_empty());
}
