//! Account directory repository for SQLite operations

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{AccountRow, UserKind};

/// All accounts with an identifier, newest first
pub async fn list_accounts(pool: &SqlitePool) -> Result<Vec<AccountRow>, SqliteError> {
    let rows: Vec<(String, String, Option<String>, i64)> = sqlx::query_as(
        r#"
        SELECT id, identifier, metadata, created_at
        FROM accounts
        WHERE identifier IS NOT NULL
        ORDER BY created_at DESC, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, username, metadata, created_at)| AccountRow {
            id,
            username,
            user_kind: UserKind::from_metadata(metadata.as_deref()),
            created_at,
        })
        .collect())
}

/// Usernames registered as test users
pub async fn list_test_usernames(pool: &SqlitePool) -> Result<Vec<String>, SqliteError> {
    let names: Vec<String> = sqlx::query_scalar("SELECT username FROM test_users ORDER BY username")
        .fetch_all(pool)
        .await?;
    Ok(names)
}
