//! Conversation listing
//!
//! A conversation is a session seen through the listing mode: with
//! `allow_list` only sessions of known accounts and test users are visible,
//! with `unrestricted` every session with a member is.

use std::sync::Arc;

use super::accounts::AccountDirectory;
use super::error::ServiceError;
use super::sessions::{Conversation, SessionListRequest, SessionService};
use crate::core::config::ListingMode;
use crate::data::filters::OrderBy;

pub struct ConversationService {
    sessions: Arc<SessionService>,
    directory: AccountDirectory,
    mode: ListingMode,
}

impl ConversationService {
    pub fn new(sessions: Arc<SessionService>, directory: AccountDirectory, mode: ListingMode) -> Self {
        Self {
            sessions,
            directory,
            mode,
        }
    }

    /// User ids a listing is restricted to; `None` means no restriction
    async fn allowed_user_ids(
        &self,
        account_id: Option<&str>,
    ) -> Result<Option<Vec<String>>, ServiceError> {
        match self.mode {
            ListingMode::AllowList => {
                let known = self.directory.known_user_ids().await?;
                Ok(Some(match account_id {
                    Some(account) => known.into_iter().filter(|u| u == account).collect(),
                    None => known,
                }))
            }
            ListingMode::Unrestricted => Ok(account_id.map(|account| vec![account.to_string()])),
        }
    }

    pub async fn list_conversations(
        &self,
        project_id: &str,
        account_id: Option<&str>,
        order_by: Option<OrderBy>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<Conversation>, ServiceError> {
        let allowed = self.allowed_user_ids(account_id).await?;
        tracing::debug!(
            project_id,
            mode = %self.mode,
            allowed = allowed.as_ref().map(Vec::len),
            "Listing conversations"
        );

        let request = SessionListRequest {
            project_id: project_id.to_string(),
            filters: Vec::new(),
            order_by,
            page,
            limit,
            allowed_user_ids: allowed,
        };
        let rows = self.sessions.list_session_rows(request).await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SessionsConfig;
    use crate::data::memory::EventLog;
    use crate::data::memory::fixtures::trace;
    use crate::data::testing::{CountingStore, memory_store, metadata_store};
    use crate::domain::access::ScopeAccessControl;
    use crate::domain::accounts::fixtures::{insert_account, insert_test_user};
    use crate::domain::audit::TracingAuditLog;
    use crate::domain::telemetry::TracingExceptionSink;

    fn log() -> EventLog {
        EventLog {
            traces: vec![
                trace("t1", "s1", Some("alice"), 10),
                trace("t2", "s2", Some("stranger"), 20),
                trace("t3", "s3", Some("tester"), 30),
                trace("t4", "s3", Some("alice"), 40),
            ],
            ..Default::default()
        }
    }

    async fn service(
        mode: ListingMode,
        with_accounts: bool,
    ) -> (ConversationService, Arc<CountingStore>, tempfile::TempDir) {
        let store = Arc::new(CountingStore::new(memory_store(log())));
        let (sqlite, dir) = metadata_store().await;
        if with_accounts {
            insert_account(&sqlite, "1", "alice", None).await;
            insert_test_user(&sqlite, "tester").await;
        }
        let metadata: Arc<dyn crate::data::MetadataRepository> = Arc::new(Arc::clone(&sqlite));
        let sessions = Arc::new(SessionService::new(
            store.clone(),
            Arc::clone(&metadata),
            Arc::new(ScopeAccessControl),
            Arc::new(TracingAuditLog),
            Arc::new(TracingExceptionSink),
            SessionsConfig::default(),
        ));
        let directory = AccountDirectory::new(metadata);
        (ConversationService::new(sessions, directory, mode), store, dir)
    }

    fn ids(conversations: &[Conversation]) -> Vec<&str> {
        conversations.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_allow_list_uses_known_users() {
        let (service, _, _dir) = service(ListingMode::AllowList, true).await;
        let conversations = service
            .list_conversations("p1", None, None, None, None)
            .await
            .unwrap();
        assert_eq!(ids(&conversations), vec!["s3", "s1"]);
        assert_eq!(conversations[0].user_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_allow_list_narrowed_to_account() {
        let (service, _, _dir) = service(ListingMode::AllowList, true).await;
        let conversations = service
            .list_conversations("p1", Some("tester"), None, None, None)
            .await
            .unwrap();
        assert_eq!(ids(&conversations), vec!["s3"]);
    }

    #[tokio::test]
    async fn test_allow_list_unknown_account_is_empty_without_query() {
        let (service, store, _dir) = service(ListingMode::AllowList, true).await;
        let conversations = service
            .list_conversations("p1", Some("stranger"), None, None, None)
            .await
            .unwrap();
        assert!(conversations.is_empty());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_allow_list_without_accounts_is_empty() {
        let (service, store, _dir) = service(ListingMode::AllowList, false).await;
        assert!(
            service
                .list_conversations("p1", None, None, None, None)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_unrestricted_lists_everything() {
        let (service, _, _dir) = service(ListingMode::Unrestricted, false).await;
        let all = service
            .list_conversations("p1", None, Some(OrderBy::parse("createdAt:asc").unwrap()), None, None)
            .await
            .unwrap();
        assert_eq!(ids(&all), vec!["s1", "s2", "s3"]);

        let only = service
            .list_conversations("p1", Some("stranger"), None, None, None)
            .await
            .unwrap();
        assert_eq!(ids(&only), vec!["s2"]);
    }
}
