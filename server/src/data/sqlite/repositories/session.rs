//! Session metadata repository for SQLite operations

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::SessionMetadata;

/// Max ids bound into a single IN list
const LOOKUP_CHUNK_SIZE: usize = 500;

type SessionTuple = (String, String, bool, bool, String, i64, i64);

const SELECT_COLUMNS: &str =
    "id, project_id, bookmarked, public, environment, created_at, updated_at";

fn from_tuple(row: SessionTuple) -> SessionMetadata {
    let (id, project_id, bookmarked, public, environment, created_at, updated_at) = row;
    SessionMetadata {
        id,
        project_id,
        bookmarked,
        public,
        environment,
        created_at,
        updated_at,
    }
}

/// Get a session's metadata row
pub async fn get_session(
    pool: &SqlitePool,
    session_id: &str,
    project_id: &str,
) -> Result<Option<SessionMetadata>, SqliteError> {
    let sql = format!(
        "SELECT {} FROM session_metadata WHERE id = ? AND project_id = ?",
        SELECT_COLUMNS
    );
    let row: Option<SessionTuple> = sqlx::query_as(&sql)
        .bind(session_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(from_tuple))
}

/// Batch lookup keyed by session id. Ids without a row are absent.
pub async fn lookup_sessions(
    pool: &SqlitePool,
    session_ids: &[String],
    project_id: &str,
) -> Result<HashMap<String, SessionMetadata>, SqliteError> {
    let mut result = HashMap::with_capacity(session_ids.len());

    for chunk in session_ids.chunks(LOOKUP_CHUNK_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM session_metadata WHERE project_id = ? AND id IN ({})",
            SELECT_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, SessionTuple>(&sql).bind(project_id);
        for id in chunk {
            query = query.bind(id);
        }

        for row in query.fetch_all(pool).await? {
            let metadata = from_tuple(row);
            result.insert(metadata.id.clone(), metadata);
        }
    }

    Ok(result)
}

/// Create the metadata row if missing (idempotent)
/// Returns true if created, false if already existed
pub async fn register_session(
    pool: &SqlitePool,
    session_id: &str,
    project_id: &str,
    environment: &str,
) -> Result<bool, SqliteError> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO session_metadata (id, project_id, bookmarked, public, environment, created_at, updated_at)
        VALUES (?, ?, 0, 0, ?, ?, ?)
        ON CONFLICT (id, project_id) DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(project_id)
    .bind(environment)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Set the bookmark flag on an existing row
pub async fn set_bookmarked(
    pool: &SqlitePool,
    session_id: &str,
    project_id: &str,
    bookmarked: bool,
) -> Result<SessionMetadata, SqliteError> {
    update_flag(pool, "bookmarked", session_id, project_id, bookmarked).await
}

/// Set the public flag on an existing row
pub async fn set_public(
    pool: &SqlitePool,
    session_id: &str,
    project_id: &str,
    public: bool,
) -> Result<SessionMetadata, SqliteError> {
    update_flag(pool, "public", session_id, project_id, public).await
}

/// Single-row conditional update. `column` is one of the fixed flag names.
async fn update_flag(
    pool: &SqlitePool,
    column: &'static str,
    session_id: &str,
    project_id: &str,
    value: bool,
) -> Result<SessionMetadata, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let sql = format!(
        "UPDATE session_metadata SET {} = ?, updated_at = ? WHERE id = ? AND project_id = ? RETURNING {}",
        column, SELECT_COLUMNS
    );

    let row: Option<SessionTuple> = sqlx::query_as(&sql)
        .bind(value)
        .bind(now)
        .bind(session_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    row.map(from_tuple).ok_or_else(|| SqliteError::NotFound {
        entity: "session",
        id: session_id.to_string(),
    })
}

/// Ids of all bookmarked sessions in a project
pub async fn bookmarked_session_ids(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Vec<String>, SqliteError> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM session_metadata WHERE project_id = ? AND bookmarked = 1 ORDER BY id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
