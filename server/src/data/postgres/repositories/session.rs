//! Session metadata repository for PostgreSQL operations

use std::collections::HashMap;

use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::SessionMetadata;

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

pub async fn get_session(
    pool: &PgPool,
    session_id: &str,
    project_id: &str,
) -> Result<Option<SessionMetadata>, PostgresError> {
    let sql = format!(
        "SELECT {} FROM session_metadata WHERE id = $1 AND project_id = $2",
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
    pool: &PgPool,
    session_ids: &[String],
    project_id: &str,
) -> Result<HashMap<String, SessionMetadata>, PostgresError> {
    if session_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT {} FROM session_metadata WHERE project_id = $1 AND id = ANY($2)",
        SELECT_COLUMNS
    );
    let rows: Vec<SessionTuple> = sqlx::query_as(&sql)
        .bind(project_id)
        .bind(session_ids)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let metadata = from_tuple(row);
            (metadata.id.clone(), metadata)
        })
        .collect())
}

/// Create the metadata row if missing (idempotent)
pub async fn register_session(
    pool: &PgPool,
    session_id: &str,
    project_id: &str,
    environment: &str,
) -> Result<bool, PostgresError> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO session_metadata (id, project_id, bookmarked, public, environment, created_at, updated_at)
        VALUES ($1, $2, FALSE, FALSE, $3, $4, $4)
        ON CONFLICT (id, project_id) DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(project_id)
    .bind(environment)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_bookmarked(
    pool: &PgPool,
    session_id: &str,
    project_id: &str,
    bookmarked: bool,
) -> Result<SessionMetadata, PostgresError> {
    update_flag(pool, "bookmarked", session_id, project_id, bookmarked).await
}

pub async fn set_public(
    pool: &PgPool,
    session_id: &str,
    project_id: &str,
    public: bool,
) -> Result<SessionMetadata, PostgresError> {
    update_flag(pool, "public", session_id, project_id, public).await
}

/// Single-row conditional update. `column` is one of the fixed flag names.
async fn update_flag(
    pool: &PgPool,
    column: &'static str,
    session_id: &str,
    project_id: &str,
    value: bool,
) -> Result<SessionMetadata, PostgresError> {
    let now = chrono::Utc::now().timestamp();
    let sql = format!(
        "UPDATE session_metadata SET {} = $1, updated_at = $2 WHERE id = $3 AND project_id = $4 RETURNING {}",
        column, SELECT_COLUMNS
    );

    let row: Option<SessionTuple> = sqlx::query_as(&sql)
        .bind(value)
        .bind(now)
        .bind(session_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    row.map(from_tuple).ok_or_else(|| PostgresError::NotFound {
        entity: "session",
        id: session_id.to_string(),
    })
}

pub async fn bookmarked_session_ids(
    pool: &PgPool,
    project_id: &str,
) -> Result<Vec<String>, PostgresError> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM session_metadata WHERE project_id = $1 AND bookmarked ORDER BY id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
