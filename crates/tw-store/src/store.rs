//! SQLite-backed session and suite storage.

use crate::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tw_core::chat::{ChatMessage, ChatSession};
use tw_core::command::Command;
use tw_core::suite::TestSuite;
use uuid::Uuid;

/// Input for [`Store::create_suite`]. The store assigns the id, the version
/// and the timestamps; callers only supply the content.
#[derive(Debug, Clone)]
pub struct NewSuite {
    pub name: String,
    pub nlp_input: String,
    pub commands: Vec<Command>,
    pub generated_code: String,
    pub llm_provider: String,
    pub llm_model: String,
}

/// One LLM call worth of spend, recorded after the call completes.
#[derive(Debug, Clone)]
pub struct CostEntry {
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// None when the model has no known pricing (local models).
    pub cost_usd: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated spend for one provider/model pair.
#[derive(Debug, Clone)]
pub struct CostSummaryRow {
    pub provider: String,
    pub model: String,
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

/// Session and suite store backed by a single SQLite database.
/// Uses Mutex<Connection> for thread safety (rusqlite::Connection is !Sync).
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        let store = Self { conn: Mutex::new(conn) };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        let store = Self { conn: Mutex::new(conn) };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    title TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    commands_json TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_messages_session
                    ON messages(session_id, created_at);

                CREATE TABLE IF NOT EXISTS suites (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    nlp_input TEXT NOT NULL,
                    commands_json TEXT NOT NULL,
                    generated_code TEXT NOT NULL,
                    llm_provider TEXT NOT NULL,
                    llm_model TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(name, version)
                );

                CREATE INDEX IF NOT EXISTS idx_suites_name
                    ON suites(name);

                CREATE TABLE IF NOT EXISTS costs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    provider TEXT NOT NULL,
                    model TEXT NOT NULL,
                    prompt_tokens INTEGER NOT NULL,
                    completion_tokens INTEGER NOT NULL,
                    cost_usd REAL,
                    created_at TEXT NOT NULL
                );",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sessions and messages
    // ------------------------------------------------------------------

    /// Insert the session if it does not exist yet. Idempotent.
    pub fn ensure_session(&self, session: &ChatSession) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute(
                "INSERT OR IGNORE INTO sessions (id, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    session.id.to_string(),
                    session.title,
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Append a message and bump the owning session's updated_at to the
    /// message time.
    pub fn append_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute(
                "INSERT INTO messages (id, session_id, role, content, commands_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    message.id.to_string(),
                    message.session_id.to_string(),
                    message.role.as_str(),
                    message.content,
                    message
                        .commands
                        .as_ref()
                        .map(|c| serde_json::to_string(c).unwrap_or_default()),
                    message.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute(
                "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                rusqlite::params![
                    message.created_at.to_rfc3339(),
                    message.session_id.to_string()
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// The most recent messages of a session, newest first.
    pub fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, commands_json, created_at
                 FROM messages WHERE session_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                rusqlite::params![session_id.to_string(), limit as i64],
                |row| {
                    Ok(RawMessageRow {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        role: row.get(2)?,
                        content: row.get(3)?,
                        commands_json: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut messages = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| StoreError::Database(e.to_string()))?;
            messages.push(raw_to_message(raw)?);
        }
        Ok(messages)
    }

    // ------------------------------------------------------------------
    // Test suites
    // ------------------------------------------------------------------

    /// Store a new suite, assigning the next version for its name. The first
    /// suite under a name is v1; saving again under the same name appends a
    /// new version, never overwrites.
    pub fn create_suite(&self, new: NewSuite) -> Result<TestSuite, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let max_version: u32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM suites WHERE name = ?1",
                rusqlite::params![new.name],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let suite = TestSuite::new(
            new.name,
            max_version + 1,
            new.nlp_input,
            new.commands,
            new.generated_code,
            new.llm_provider,
            new.llm_model,
        );
        conn.execute(
                "INSERT INTO suites (
                    id, name, version, nlp_input, commands_json,
                    generated_code, llm_provider, llm_model,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    suite.id.to_string(),
                    suite.name,
                    suite.version,
                    suite.nlp_input,
                    serde_json::to_string(&suite.commands).unwrap_or_default(),
                    suite.generated_code,
                    suite.llm_provider,
                    suite.llm_model,
                    suite.created_at.to_rfc3339(),
                    suite.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::info!(name = %suite.name, version = suite.version, "stored test suite");
        Ok(suite)
    }

    /// Fetch one suite by id.
    pub fn get_suite(&self, id: Uuid) -> Result<Option<TestSuite>, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(&format!("{SUITE_SELECT} WHERE id = ?1"))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let mut rows = stmt
            .query_map(rusqlite::params![id.to_string()], suite_row)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match rows.next() {
            Some(row) => {
                let raw = row.map_err(|e| StoreError::Database(e.to_string()))?;
                Ok(Some(raw_to_suite(raw)?))
            }
            None => Ok(None),
        }
    }

    /// The highest version stored under a name.
    pub fn latest_suite(&self, name: &str) -> Result<Option<TestSuite>, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(&format!(
                "{SUITE_SELECT} WHERE name = ?1 ORDER BY version DESC LIMIT 1"
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let mut rows = stmt
            .query_map(rusqlite::params![name], suite_row)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match rows.next() {
            Some(row) => {
                let raw = row.map_err(|e| StoreError::Database(e.to_string()))?;
                Ok(Some(raw_to_suite(raw)?))
            }
            None => Ok(None),
        }
    }

    /// All stored suites, every version, ordered by name then newest version
    /// first.
    pub fn list_suites(&self) -> Result<Vec<TestSuite>, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(&format!(
                "{SUITE_SELECT} ORDER BY name ASC, version DESC"
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], suite_row)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut suites = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| StoreError::Database(e.to_string()))?;
            suites.push(raw_to_suite(raw)?);
        }
        Ok(suites)
    }

    /// Replace a suite's stored script and bump its updated_at.
    pub fn update_suite_code(&self, id: Uuid, code: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let changed = conn
            .execute(
                "UPDATE suites SET generated_code = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![code, Utc::now().to_rfc3339(), id.to_string()],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(StoreError::SuiteNotFound(id));
        }
        Ok(())
    }

    /// Record the spend of one completed LLM call.
    pub fn record_cost(&self, entry: &CostEntry) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO costs (provider, model, prompt_tokens, completion_tokens,
                                cost_usd, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                entry.provider,
                entry.model,
                entry.prompt_tokens,
                entry.completion_tokens,
                entry.cost_usd,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Spend grouped by provider and model, across every recorded call.
    pub fn cost_summary(&self) -> Result<Vec<CostSummaryRow>, StoreError> {
        let conn = self.conn.lock().map_err(|e| StoreError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT provider, model, COUNT(*),
                        SUM(prompt_tokens), SUM(completion_tokens),
                        COALESCE(SUM(cost_usd), 0.0)
                 FROM costs
                 GROUP BY provider, model
                 ORDER BY provider ASC, model ASC",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CostSummaryRow {
                    provider: row.get(0)?,
                    model: row.get(1)?,
                    requests: row.get::<_, i64>(2)? as u64,
                    prompt_tokens: row.get::<_, i64>(3)? as u64,
                    completion_tokens: row.get::<_, i64>(4)? as u64,
                    cost_usd: row.get(5)?,
                })
            })
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(summaries)
    }
}

const SUITE_SELECT: &str = "SELECT id, name, version, nlp_input, commands_json,
                generated_code, llm_provider, llm_model,
                created_at, updated_at
         FROM suites";

/// Internal row structs for SQLite queries.
struct RawMessageRow {
    id: String,
    session_id: String,
    role: String,
    content: String,
    commands_json: Option<String>,
    created_at: String,
}

struct RawSuiteRow {
    id: String,
    name: String,
    version: u32,
    nlp_input: String,
    commands_json: String,
    generated_code: String,
    llm_provider: String,
    llm_model: String,
    created_at: String,
    updated_at: String,
}

fn suite_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSuiteRow> {
    Ok(RawSuiteRow {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        nlp_input: row.get(3)?,
        commands_json: row.get(4)?,
        generated_code: row.get(5)?,
        llm_provider: row.get(6)?,
        llm_model: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("{field}: {e}")))
}

fn raw_to_message(raw: RawMessageRow) -> Result<ChatMessage, StoreError> {
    let parse_err = |field: &str, e: String| StoreError::Database(format!("{field}: {e}"));

    Ok(ChatMessage {
        id: raw
            .id
            .parse()
            .map_err(|e: uuid::Error| parse_err("id", e.to_string()))?,
        session_id: raw
            .session_id
            .parse()
            .map_err(|e: uuid::Error| parse_err("session_id", e.to_string()))?,
        role: raw.role.parse().map_err(|e: String| parse_err("role", e))?,
        content: raw.content,
        commands: raw
            .commands_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| parse_err("commands_json", e.to_string()))?,
        created_at: parse_timestamp("created_at", &raw.created_at)?,
    })
}

fn raw_to_suite(raw: RawSuiteRow) -> Result<TestSuite, StoreError> {
    let parse_err = |field: &str, e: String| StoreError::Database(format!("{field}: {e}"));

    Ok(TestSuite {
        id: raw
            .id
            .parse()
            .map_err(|e: uuid::Error| parse_err("id", e.to_string()))?,
        name: raw.name,
        version: raw.version,
        nlp_input: raw.nlp_input,
        commands: serde_json::from_str(&raw.commands_json)
            .map_err(|e| parse_err("commands_json", e.to_string()))?,
        generated_code: raw.generated_code,
        llm_provider: raw.llm_provider,
        llm_model: raw.llm_model,
        created_at: parse_timestamp("created_at", &raw.created_at)?,
        updated_at: parse_timestamp("updated_at", &raw.updated_at)?,
    })
}
