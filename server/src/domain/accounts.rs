//! Read-only account directory

use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::{READ_FAILED, ServiceError};
use crate::data::MetadataRepository;
use crate::data::types::AccountRow;

pub use crate::data::types::{AccountKind, UserKind};

pub struct AccountDirectory {
    metadata: Arc<dyn MetadataRepository>,
}

impl AccountDirectory {
    pub fn new(metadata: Arc<dyn MetadataRepository>) -> Self {
        Self { metadata }
    }

    /// Accounts, newest first, optionally of one kind only
    pub async fn accounts(&self, kind: Option<AccountKind>) -> Result<Vec<AccountRow>, ServiceError> {
        let accounts = self
            .metadata
            .list_accounts()
            .await
            .map_err(|e| ServiceError::from_data(e, "-", "list_accounts", READ_FAILED))?;
        Ok(match kind {
            Some(kind) => accounts
                .into_iter()
                .filter(|a| a.user_kind.kind() == kind)
                .collect(),
            None => accounts,
        })
    }

    /// Account identifiers and test usernames, deduplicated and sorted
    pub async fn known_user_ids(&self) -> Result<Vec<String>, ServiceError> {
        let (accounts, test_users) =
            tokio::try_join!(self.metadata.list_accounts(), self.metadata.list_test_usernames())
                .map_err(|e| ServiceError::from_data(e, "-", "known_user_ids", READ_FAILED))?;

        let ids: BTreeSet<String> = accounts
            .into_iter()
            .map(|a| a.username)
            .chain(test_users)
            .collect();
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::data::SqliteService;

    pub async fn insert_account(service: &SqliteService, id: &str, username: &str, metadata: Option<&str>) {
        sqlx::query("INSERT INTO accounts (id, identifier, metadata, created_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(username)
            .bind(metadata)
            .bind(id.len() as i64)
            .execute(service.pool())
            .await
            .unwrap();
    }

    pub async fn insert_test_user(service: &SqliteService, username: &str) {
        sqlx::query("INSERT INTO test_users (id, username, created_at) VALUES (?, ?, 0)")
            .bind(format!("tu-{}", username))
            .bind(username)
            .execute(service.pool())
            .await
            .unwrap();
    }
}
