//! libSQL storage layer for users and extracted questions.
//!
//! The [`Storage`] struct wraps a local libSQL database. Each operation opens
//! its own connection so concurrent requests never share a transaction. The
//! database runs in WAL mode and every connection waits up to
//! [`BUSY_TIMEOUT`] for the write lock instead of failing with `SQLITE_BUSY`.

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, TransactionBehavior, params};
use quizbank_shared::{NewQuestion, QuestionRecord, QuestionView, QuizbankError, Result, User};
use tracing::{info, instrument};

/// Owner label for questions whose user row no longer exists.
pub const UNKNOWN_OWNER: &str = "Unknown";

/// How long a connection waits for another writer before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const QUESTION_COLUMNS: &str =
    "q.id, q.text, q.options, q.true_answer, q.image, q.category, q.subject, q.user_id";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Database,
}

/// A user together with the stored password hash, for login checks only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hashed_password: String,
}

impl Storage {
    /// Open or create a database at `path` and bring its schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| QuizbankError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let storage = Self { db };
        storage.enable_wal().await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = self.db.connect().map_err(db_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;
        Ok(conn)
    }

    /// Switch the database file to write-ahead logging so readers never block writers.
    async fn enable_wal(&self) -> Result<()> {
        let conn = self.connect()?;
        // journal_mode answers with a row, so it has to go through query().
        let mut rows = conn
            .query("PRAGMA journal_mode=WAL", params![])
            .await
            .map_err(db_err)?;
        while rows.next().await.map_err(db_err)?.is_some() {}
        Ok(())
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let conn = self.connect()?;
        let current_version = get_schema_version(&conn).await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                conn.execute_batch(migration.sql).await.map_err(|e| {
                    QuizbankError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // User operations
    // -----------------------------------------------------------------------

    /// Insert a new user. Fails with [`QuizbankError::DuplicateUsername`] if taken.
    pub async fn create_user(&self, username: &str, hashed_password: &str) -> Result<User> {
        let conn = self.connect()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (username, hashed_password, created_at) VALUES (?1, ?2, ?3)",
            params![username, hashed_password, now.to_rfc3339()],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                QuizbankError::DuplicateUsername
            } else {
                db_err(e)
            }
        })?;

        let id = conn.last_insert_rowid();
        info!(user_id = id, username, "user created");
        Ok(User {
            id,
            username: username.to_string(),
            created_at: now,
        })
    }

    /// Look up a user and their password hash by username.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<UserCredentials>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, username, created_at, hashed_password FROM users WHERE username = ?1",
                params![username],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(UserCredentials {
                user: row_to_user(&row)?,
                hashed_password: row.get::<String>(3).map_err(db_err)?,
            })),
            None => Ok(None),
        }
    }

    /// Look up a user by id.
    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, username, created_at FROM users WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Question operations
    // -----------------------------------------------------------------------

    /// Insert all `questions` in one transaction. Returns the new ids in order.
    #[instrument(skip_all, fields(count = questions.len()))]
    pub async fn insert_questions(&self, questions: &[NewQuestion]) -> Result<Vec<i64>> {
        let conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(db_err)?;
        let now = Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(questions.len());
        for q in questions {
            let inserted = tx
                .execute(
                    "INSERT INTO questions (text, options, true_answer, image, category, subject, user_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        q.question.text.as_str(),
                        q.question.options.as_str(),
                        q.question.true_answer.as_deref(),
                        q.question.image.as_deref(),
                        q.category.as_str(),
                        q.subject.as_str(),
                        q.user_id,
                        now.as_str(),
                    ],
                )
                .await;
            if let Err(e) = inserted {
                tx.rollback().await.map_err(db_err)?;
                return Err(db_err(e));
            }
            ids.push(tx.last_insert_rowid());
        }

        tx.commit().await.map_err(db_err)?;
        info!(inserted = ids.len(), "questions stored");
        Ok(ids)
    }

    /// All stored questions, oldest first.
    pub async fn list_questions(&self) -> Result<Vec<QuestionRecord>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                &format!("SELECT {QUESTION_COLUMNS} FROM questions q ORDER BY q.id"),
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_question(&row)?);
        }
        Ok(results)
    }

    /// Questions grouped by category; each group keeps insertion order.
    pub async fn questions_grouped_by_category(
        &self,
    ) -> Result<BTreeMap<String, Vec<QuestionView>>> {
        let mut grouped: BTreeMap<String, Vec<QuestionView>> = BTreeMap::new();
        for record in self.list_questions().await? {
            grouped
                .entry(record.category.clone())
                .or_default()
                .push(record.into());
        }
        Ok(grouped)
    }

    /// Questions grouped by owning username. Orphaned rows go under [`UNKNOWN_OWNER`].
    pub async fn questions_grouped_by_owner(&self) -> Result<BTreeMap<String, Vec<QuestionView>>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {QUESTION_COLUMNS}, u.username
                     FROM questions q LEFT JOIN users u ON u.id = q.user_id
                     ORDER BY q.id"
                ),
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut grouped: BTreeMap<String, Vec<QuestionView>> = BTreeMap::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let owner = row
                .get::<Option<String>>(8)
                .map_err(db_err)?
                .unwrap_or_else(|| UNKNOWN_OWNER.to_string());
            grouped
                .entry(owner)
                .or_default()
                .push(row_to_question(&row)?.into());
        }
        Ok(grouped)
    }

    /// Delete every question. Returns the number of rows removed.
    pub async fn delete_all_questions(&self) -> Result<u64> {
        self.delete_in_transaction("DELETE FROM questions", None)
            .await
    }

    /// Delete the questions owned by `user_id`. Returns the number of rows removed.
    pub async fn delete_questions_by_user(&self, user_id: i64) -> Result<u64> {
        self.delete_in_transaction("DELETE FROM questions WHERE user_id = ?1", Some(user_id))
            .await
    }

    async fn delete_in_transaction(&self, sql: &str, user_id: Option<i64>) -> Result<u64> {
        let conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(db_err)?;

        let result = match user_id {
            Some(id) => tx.execute(sql, params![id]).await,
            None => tx.execute(sql, params![]).await,
        };

        match result {
            Ok(deleted) => {
                tx.commit().await.map_err(db_err)?;
                info!(deleted, ?user_id, "questions deleted");
                Ok(deleted)
            }
            Err(e) => {
                tx.rollback().await.map_err(db_err)?;
                Err(db_err(e))
            }
        }
    }
}

/// Get the current schema version, or 0 if no migrations have been applied.
async fn get_schema_version(conn: &Connection) -> u32 {
    let result = conn
        .query("SELECT MAX(version) FROM schema_migrations", params![])
        .await;

    match result {
        Ok(mut rows) => {
            if let Ok(Some(row)) = rows.next().await {
                row.get::<u32>(0).unwrap_or(0)
            } else {
                0
            }
        }
        Err(_) => 0, // Table doesn't exist yet
    }
}

fn db_err(e: libsql::Error) -> QuizbankError {
    QuizbankError::Storage(e.to_string())
}

/// Convert a `(id, username, created_at)` row prefix to a [`User`].
fn row_to_user(row: &libsql::Row) -> Result<User> {
    let created_at: String = row.get(2).map_err(db_err)?;
    Ok(User {
        id: row.get::<i64>(0).map_err(db_err)?,
        username: row.get::<String>(1).map_err(db_err)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| QuizbankError::Storage(format!("invalid date: {e}")))?,
    })
}

/// Convert a row selected with [`QUESTION_COLUMNS`] to a [`QuestionRecord`].
fn row_to_question(row: &libsql::Row) -> Result<QuestionRecord> {
    Ok(QuestionRecord {
        id: row.get::<i64>(0).map_err(db_err)?,
        text: row.get::<String>(1).map_err(db_err)?,
        options: row.get::<String>(2).map_err(db_err)?,
        true_answer: row.get::<Option<String>>(3).map_err(db_err)?,
        image: row.get::<Option<String>>(4).map_err(db_err)?,
        category: row.get::<String>(5).map_err(db_err)?,
        subject: row.get::<String>(6).map_err(db_err)?,
        user_id: row.get::<i64>(7).map_err(db_err)?,
    })
}
