//! MetadataRepository trait implementation for SQLite

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::traits::MetadataRepository;
use crate::data::types::{AccountRow, SessionMetadata};

use super::SqliteService;
use super::repositories::{account, session};

#[async_trait]
impl MetadataRepository for Arc<SqliteService> {
    // ==================== Session Metadata ====================

    async fn get_session(
        &self,
        session_id: &str,
        project_id: &str,
    ) -> Result<Option<SessionMetadata>, DataError> {
        session::get_session(self.pool(), session_id, project_id)
            .await
            .map_err(Into::into)
    }

    async fn lookup_sessions(
        &self,
        session_ids: &[String],
        project_id: &str,
    ) -> Result<HashMap<String, SessionMetadata>, DataError> {
        session::lookup_sessions(self.pool(), session_ids, project_id)
            .await
            .map_err(Into::into)
    }

    async fn register_session(
        &self,
        session_id: &str,
        project_id: &str,
        environment: &str,
    ) -> Result<bool, DataError> {
        session::register_session(self.pool(), session_id, project_id, environment)
            .await
            .map_err(Into::into)
    }

    async fn set_bookmarked(
        &self,
        session_id: &str,
        project_id: &str,
        bookmarked: bool,
    ) -> Result<SessionMetadata, DataError> {
        session::set_bookmarked(self.pool(), session_id, project_id, bookmarked)
            .await
            .map_err(Into::into)
    }

    async fn set_public(
        &self,
        session_id: &str,
        project_id: &str,
        public: bool,
    ) -> Result<SessionMetadata, DataError> {
        session::set_public(self.pool(), session_id, project_id, public)
            .await
            .map_err(Into::into)
    }

    async fn bookmarked_session_ids(&self, project_id: &str) -> Result<Vec<String>, DataError> {
        session::bookmarked_session_ids(self.pool(), project_id)
            .await
            .map_err(Into::into)
    }

    // ==================== Accounts ====================

    async fn list_accounts(&self) -> Result<Vec<AccountRow>, DataError> {
        account::list_accounts(self.pool())
            .await
            .map_err(Into::into)
    }

    async fn list_test_usernames(&self) -> Result<Vec<String>, DataError> {
        account::list_test_usernames(self.pool())
            .await
            .map_err(Into::into)
    }
}
