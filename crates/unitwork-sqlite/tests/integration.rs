//! End-to-end tests against a file-backed SQLite database.

use std::sync::Arc;

use rusqlite::params;
use tempfile::TempDir;
use unitwork::{
    current_session, ConfigError, OptionMap, ScopeError, ScopeOptions, SessionError,
    SessionManager,
};
use unitwork_sqlite::{SqliteProvider, SqliteSessionExt};

#[derive(Debug, thiserror::Error)]
#[error("handler failed")]
struct HandlerFailed;

fn setup(dir: &TempDir) -> Arc<SqliteProvider> {
    let path = dir.path().join("items.db");
    let provider = SqliteProvider::connect(path.to_str().expect("utf-8 path"), &OptionMap::new())
        .expect("provider should connect");

    let conn = provider.pool().get().expect("should get a connection");
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY,
            label TEXT NOT NULL
        );",
    )
    .expect("schema should apply");

    provider
}

fn manager_for(provider: &Arc<SqliteProvider>) -> SessionManager {
    SessionManager::builder()
        .provider(Arc::clone(provider) as Arc<dyn unitwork::SessionProvider>)
        .build()
        .expect("manager should build")
}

fn count_items(provider: &SqliteProvider) -> i64 {
    let conn = provider.pool().get().expect("should get a connection");
    conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
        .expect("count query should succeed")
}

fn insert_item(label: &str) -> Result<(), SessionError> {
    let handle = current_session()?;
    handle
        .with_connection(|conn| {
            conn.execute("INSERT INTO items (label) VALUES (?1)", params![label])
        })?
        .map_err(|error| SessionError::Backend(Box::new(error)))?;
    Ok(())
}

#[tokio::test]
async fn clean_scope_commits_the_insert() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = setup(&dir);
    let manager = manager_for(&provider);

    manager
        .scope(async {
            insert_item("first")?;
            Ok::<_, SessionError>(())
        })
        .await
        .expect("scope should succeed");

    assert_eq!(count_items(&provider), 1, "the insert must be committed");
}

#[tokio::test]
async fn failed_scope_rolls_the_insert_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = setup(&dir);
    let manager = manager_for(&provider);

    let result = manager
        .scope(async {
            insert_item("doomed").map_err(|_| HandlerFailed)?;
            Err::<(), HandlerFailed>(HandlerFailed)
        })
        .await;

    assert!(matches!(result, Err(ScopeError::Task(HandlerFailed))));
    assert_eq!(count_items(&provider), 0, "the insert must be rolled back");
}

#[tokio::test]
async fn commit_on_exit_false_discards_the_insert() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = setup(&dir);
    let manager = SessionManager::builder()
        .provider(Arc::clone(&provider) as Arc<dyn unitwork::SessionProvider>)
        .commit_on_exit(false)
        .build()
        .expect("manager should build");

    manager
        .scope(async {
            insert_item("uncommitted")?;
            Ok::<_, SessionError>(())
        })
        .await
        .expect("scope should succeed");

    assert_eq!(
        count_items(&provider),
        0,
        "close without commit must leave nothing behind"
    );
}

#[tokio::test]
async fn scopes_see_each_others_committed_work() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = setup(&dir);
    let manager = manager_for(&provider);

    manager
        .scope(async {
            insert_item("from the first scope")?;
            Ok::<_, SessionError>(())
        })
        .await
        .expect("first scope should succeed");

    let seen = manager
        .scope(async {
            let handle = current_session()?;
            let count = handle
                .with_connection(|conn| {
                    conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get::<_, i64>(0))
                })?
                .map_err(|error| SessionError::Backend(Box::new(error)))?;
            Ok::<_, SessionError>(count)
        })
        .await
        .expect("second scope should succeed");

    assert_eq!(seen, 1);
}

#[tokio::test]
async fn query_only_session_refuses_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = setup(&dir);
    let manager = manager_for(&provider);

    let options = OptionMap::new().with("query_only", true);
    manager
        .scope_with(ScopeOptions::with_session_options(options), async {
            let handle = current_session()?;
            let write = handle.with_connection(|conn| {
                conn.execute("INSERT INTO items (label) VALUES ('nope')", [])
            })?;
            assert!(write.is_err(), "writes must fail in a query-only session");

            let read = handle
                .with_connection(|conn| {
                    conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get::<_, i64>(0))
                })?
                .map_err(|error| SessionError::Backend(Box::new(error)))?;
            assert_eq!(read, 0, "reads keep working");
            Ok::<_, SessionError>(())
        })
        .await
        .expect("scope should succeed");

    // The pragma must not leak into pooled connections reused later.
    manager
        .scope(async {
            insert_item("writable again")?;
            Ok::<_, SessionError>(())
        })
        .await
        .expect("a later scope must be writable");
    assert_eq!(count_items(&provider), 1);
}

#[tokio::test]
async fn immediate_behavior_is_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = setup(&dir);
    let manager = manager_for(&provider);

    let options = OptionMap::new().with("behavior", "immediate");
    manager
        .scope_with(ScopeOptions::with_session_options(options), async {
            insert_item("locked early")?;
            Ok::<_, SessionError>(())
        })
        .await
        .expect("scope should succeed");

    assert_eq!(count_items(&provider), 1);
}

#[tokio::test]
async fn unknown_session_option_fails_on_first_access() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = setup(&dir);
    let manager = manager_for(&provider);

    let options = OptionMap::new().with("expire_on_commit", false);
    let result = manager
        .scope_with(ScopeOptions::with_session_options(options), async {
            current_session().map(|_| ())
        })
        .await;

    match result {
        Err(ScopeError::Task(SessionError::Backend(error))) => {
            assert!(
                error.to_string().contains("expire_on_commit"),
                "the error should name the key: {error}"
            );
        }
        other => panic!("expected a backend error naming the key, got: {other:?}"),
    }
}

#[test]
fn unknown_provider_option_is_rejected_at_connect() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("never.db");

    let options = OptionMap::new().with("echo", true);
    let err = SqliteProvider::connect(path.to_str().expect("utf-8 path"), &options)
        .expect_err("unknown provider option should fail");

    match err {
        ConfigError::UnknownKey { key } => assert_eq!(key, "echo"),
        other => panic!("expected UnknownKey, got: {other}"),
    }
}

#[test]
fn bad_default_session_options_fail_manager_construction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = setup(&dir);

    let err = SessionManager::builder()
        .provider(provider as Arc<dyn unitwork::SessionProvider>)
        .default_session_options(OptionMap::new().with("autoflush", true))
        .build()
        .expect_err("unknown default session option should fail");

    match err {
        ConfigError::UnknownKey { key } => assert_eq!(key, "autoflush"),
        other => panic!("expected UnknownKey, got: {other}"),
    }
}
