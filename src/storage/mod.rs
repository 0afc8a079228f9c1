use anyhow::Result;
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the relay indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Run a query future under [`QUERY_TIMEOUT`], turning elapsed into an error.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(QUERY_TIMEOUT, fut)
        .await
        .unwrap_or_else(|_| {
            Err(anyhow::anyhow!(
                "database query timed out after {}s",
                QUERY_TIMEOUT.as_secs()
            ))
        })
}

/// One persisted conversation turn. `conversations` is append-only — there
/// are no update or delete paths.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TurnRow {
    pub id: String,
    pub user_id: String,
    pub message: String,
    /// "user" | "assistant"
    pub role: String,
    pub created_at: String,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("ringside.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Idempotent schema creation — safe to run on every startup against an
    /// existing database file.
    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                message    TEXT NOT NULL,
                role       TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user
             ON conversations(user_id, created_at)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory (
                user_id         TEXT PRIMARY KEY,
                character_facts TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // ─── Conversations ──────────────────────────────────────────────────────

    /// Append one turn to a user's conversation log.
    pub async fn append_turn(&self, user_id: &str, message: &str, role: &str) -> Result<TurnRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO conversations (id, user_id, message, role, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(message)
        .bind(role)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(TurnRow {
            id,
            user_id: user_id.to_string(),
            message: message.to_string(),
            role: role.to_string(),
            created_at: now,
        })
    }

    /// The `limit` most recent turns for a user, returned oldest-first.
    ///
    /// Fetches newest-first (`created_at DESC`, id as tie-break) and reverses
    /// in memory, so the window is always the *latest* `limit` turns in
    /// chronological order.
    pub async fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<TurnRow>> {
        with_timeout(async {
            let mut rows: Vec<TurnRow> = sqlx::query_as(
                "SELECT id, user_id, message, role, created_at
                 FROM conversations
                 WHERE user_id = ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?",
            )
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
            rows.reverse();
            Ok(rows)
        })
        .await
    }

    /// Total turns stored for a user.
    pub async fn turn_count(&self, user_id: &str) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    // ─── Memory ─────────────────────────────────────────────────────────────

    /// The accumulated character-facts string for a user.
    ///
    /// An absent row and an empty string are indistinguishable to callers —
    /// both come back as `""`.
    pub async fn get_facts(&self, user_id: &str) -> Result<String> {
        let facts: Option<String> =
            sqlx::query_scalar("SELECT character_facts FROM memory WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(facts.unwrap_or_default())
    }

    /// Whole-string upsert of a user's character facts.
    pub async fn upsert_facts(&self, user_id: &str, facts: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO memory (user_id, character_facts) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET character_facts = excluded.character_facts",
        )
        .bind(user_id)
        .bind(facts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether a memory row exists for the user at all (absent row vs empty
    /// string — only tests care about the difference).
    pub async fn has_facts_row(&self, user_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}
