//! Session queries and mutations
//!
//! Reads run in two phases: the event store aggregates and orders sessions,
//! then relational flags and scores are fetched for the returned ids and
//! merged in without changing the order. Missing metadata rows are treated
//! as `bookmarked = false, public = false`.

mod filter;
mod merge;
mod types;

pub use filter::{ResolvedFilters, check_filters, rewrite_bookmarked};
pub use types::{
    Conversation, FilterOptions, Session, SessionCount, SessionDetail, SessionFlags,
    SessionListRequest, SessionTrace, SessionWithMetrics,
};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::TryFutureExt;
use futures::future::try_join_all;
use rust_decimal::Decimal;
use validator::Validate;

use super::access::{AccessControl, Actor, Scope};
use super::audit::{AuditLog, AuditRecord};
use super::error::{READ_FAILED, ServiceError, WRITE_FAILED};
use super::scores::{Score, ScoreResolver};
use super::telemetry::ExceptionSink;
use crate::core::config::SessionsConfig;
use crate::core::constants::FILTER_OPTIONS_USER_LIMIT;
use crate::data::filters::{DatetimeOp, Filter, columns};
use crate::data::types::{
    ScoreDataType, ScoreTarget, SessionAggregateRow, SessionMetadata, SessionQuery,
    TraceIdentifier,
};
use crate::data::{DataError, EventStore, MetadataRepository};

fn read_error<'a>(
    project_id: &'a str,
    operation: &'static str,
) -> impl FnOnce(DataError) -> ServiceError + 'a {
    move |e| ServiceError::from_data(e, project_id, operation, READ_FAILED)
}

fn write_error<'a>(
    project_id: &'a str,
    operation: &'static str,
) -> impl FnOnce(DataError) -> ServiceError + 'a {
    move |e| ServiceError::from_data(e, project_id, operation, WRITE_FAILED)
}

/// Relational flag changed by a mutation
#[derive(Debug, Clone, Copy)]
enum FlagUpdate {
    Bookmarked,
    Public,
}

impl FlagUpdate {
    fn scope(self) -> Scope {
        match self {
            Self::Bookmarked => Scope::ObjectsBookmark,
            Self::Public => Scope::ObjectsPublish,
        }
    }

    fn action(self) -> &'static str {
        match self {
            Self::Bookmarked => "bookmark",
            Self::Public => "publish",
        }
    }

    fn snapshot(self, metadata: &SessionMetadata) -> serde_json::Value {
        match self {
            Self::Bookmarked => serde_json::json!({ "bookmarked": metadata.bookmarked }),
            Self::Public => serde_json::json!({ "public": metadata.public }),
        }
    }
}

pub struct SessionService {
    store: Arc<dyn EventStore>,
    metadata: Arc<dyn MetadataRepository>,
    access: Arc<dyn AccessControl>,
    audit: Arc<dyn AuditLog>,
    scores: ScoreResolver,
    settings: SessionsConfig,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn EventStore>,
        metadata: Arc<dyn MetadataRepository>,
        access: Arc<dyn AccessControl>,
        audit: Arc<dyn AuditLog>,
        sink: Arc<dyn ExceptionSink>,
        settings: SessionsConfig,
    ) -> Self {
        let scores = ScoreResolver::new(Arc::clone(&store), sink, settings.score_chunk_size);
        Self {
            store,
            metadata,
            access,
            audit,
            scores,
            settings,
        }
    }

    // ==================== Listing ====================

    /// Sessions merged with their flags, in store order
    pub async fn list_sessions(
        &self,
        request: SessionListRequest,
    ) -> Result<Vec<Session>, ServiceError> {
        let project_id = request.project_id.clone();
        let rows = self.list_session_rows(request).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rows.iter().map(|r| r.session_id.clone()).collect();
        let metadata = self
            .metadata
            .lookup_sessions(&ids, &project_id)
            .await
            .map_err(read_error(&project_id, "lookup_sessions"))?;

        Ok(merge::merge_sessions(rows, &metadata))
    }

    /// Aggregated rows only, without relational flags
    pub async fn list_session_rows(
        &self,
        request: SessionListRequest,
    ) -> Result<Vec<SessionAggregateRow>, ServiceError> {
        let Some(query) = self.prepare_query(request).await? else {
            return Ok(Vec::new());
        };
        self.store
            .list_sessions(&query)
            .await
            .map_err(read_error(&query.project_id, "list_sessions"))
    }

    pub async fn count_sessions(
        &self,
        request: SessionListRequest,
    ) -> Result<SessionCount, ServiceError> {
        let Some(query) = self.prepare_query(request).await? else {
            return Ok(SessionCount { total_count: 0 });
        };
        let total_count = self
            .store
            .count_sessions(&query)
            .await
            .map_err(read_error(&query.project_id, "count_sessions"))?;
        Ok(SessionCount { total_count })
    }

    /// Validate the request and resolve relational filters.
    ///
    /// `None` means the result is known to be empty and no query is needed.
    async fn prepare_query(
        &self,
        request: SessionListRequest,
    ) -> Result<Option<SessionQuery>, ServiceError> {
        request.validate()?;

        if request
            .allowed_user_ids
            .as_ref()
            .is_some_and(|allowed| allowed.is_empty())
        {
            tracing::debug!(project_id = %request.project_id, "Empty allow-list, skipping query");
            return Ok(None);
        }

        let needs_bookmarks = check_filters(&request.filters)?;
        if let Some(order) = &request.order_by {
            order.validate()?;
        }

        let filters = if needs_bookmarks {
            let bookmarked = self
                .metadata
                .bookmarked_session_ids(&request.project_id)
                .await
                .map_err(read_error(&request.project_id, "bookmarked_session_ids"))?;
            match rewrite_bookmarked(request.filters, &bookmarked) {
                ResolvedFilters::Filters(filters) => filters,
                ResolvedFilters::Empty => {
                    tracing::debug!(project_id = %request.project_id, "No bookmarked sessions");
                    return Ok(None);
                }
            }
        } else {
            request.filters
        };

        Ok(Some(
            SessionQuery::new(request.project_id)
                .with_filters(filters)
                .with_order_by(request.order_by)
                .with_page(request.page, request.limit)
                .with_allowed_user_ids(request.allowed_user_ids),
        ))
    }

    // ==================== Metrics ====================

    /// Cost, usage and score rollups for the given sessions
    pub async fn session_metrics(
        &self,
        project_id: &str,
        session_ids: &[String],
    ) -> Result<Vec<SessionWithMetrics>, ServiceError> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = SessionQuery::new(project_id)
            .with_filters(vec![Filter::any_of(columns::SESSION_ID, session_ids.to_vec())]);
        let rows = self
            .store
            .session_metrics(&query)
            .await
            .map_err(read_error(project_id, "session_metrics"))?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = rows.iter().map(|r| r.session_id.clone()).collect();
        let (metadata, scores) = tokio::try_join!(
            self.metadata
                .lookup_sessions(&ids, project_id)
                .map_err(read_error(project_id, "lookup_sessions")),
            self.scores
                .resolve(
                    project_id,
                    ScoreTarget::Sessions(ids.clone()),
                    None,
                    Some(self.settings.metrics_score_limit),
                    Some(0),
                )
                .map_err(read_error(project_id, "session_scores")),
        )?;

        Ok(merge::merge_metrics(rows, &metadata, &scores))
    }

    // ==================== Detail ====================

    /// One session with its traces, their scores, members and summed cost
    pub async fn session_by_id(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<SessionDetail, ServiceError> {
        let metadata = self
            .metadata
            .get_session(session_id, project_id)
            .await
            .map_err(read_error(project_id, "get_session"))?
            .ok_or_else(|| {
                ServiceError::from_data(
                    DataError::not_found("session", session_id),
                    project_id,
                    "session_by_id",
                    READ_FAILED,
                )
            })?;

        let traces = self
            .store
            .trace_identifiers_for_session(project_id, session_id)
            .await
            .map_err(read_error(project_id, "trace_identifiers_for_session"))?;

        let chunk_size = self.settings.score_chunk_size.max(1);
        let chunks = try_join_all(
            traces
                .chunks(chunk_size)
                .map(|chunk| self.resolve_trace_chunk(project_id, chunk)),
        );
        let session_scores = self
            .scores
            .resolve(
                project_id,
                ScoreTarget::Sessions(vec![session_id.to_string()]),
                None,
                None,
                None,
            )
            .map_err(read_error(project_id, "session_scores"));

        let (chunk_results, session_scores) = tokio::try_join!(chunks, session_scores)?;

        let mut total_cost = Decimal::ZERO;
        let mut trace_scores: HashMap<String, Vec<Score>> = HashMap::new();
        for (scores, cost) in chunk_results {
            total_cost = total_cost.saturating_add(cost.unwrap_or(Decimal::ZERO));
            for score in scores {
                if let Some(trace_id) = score.trace_id.clone() {
                    trace_scores.entry(trace_id).or_default().push(score);
                }
            }
        }

        let users = unique_users(&traces);
        let traces = traces
            .into_iter()
            .map(|trace| SessionTrace {
                scores: trace_scores.remove(&trace.id).unwrap_or_default(),
                trace,
            })
            .collect();

        Ok(SessionDetail {
            id: metadata.id,
            project_id: metadata.project_id,
            environment: metadata.environment,
            created_at: metadata.created_at,
            flags: SessionFlags {
                bookmarked: metadata.bookmarked,
                public: metadata.public,
            },
            traces,
            users,
            total_cost,
            scores: session_scores,
        })
    }

    /// Scores and cost of one chunk of traces, bounded below by its oldest trace
    async fn resolve_trace_chunk(
        &self,
        project_id: &str,
        chunk: &[TraceIdentifier],
    ) -> Result<(Vec<Score>, Option<Decimal>), ServiceError> {
        let ids: Vec<String> = chunk.iter().map(|t| t.id.clone()).collect();
        let min_timestamp: Option<DateTime<Utc>> = chunk.iter().map(|t| t.timestamp).min();

        tokio::try_join!(
            self.scores
                .resolve(
                    project_id,
                    ScoreTarget::Traces(ids.clone()),
                    min_timestamp,
                    None,
                    None,
                )
                .map_err(read_error(project_id, "trace_scores")),
            self.store
                .trace_cost(project_id, &ids, min_timestamp)
                .map_err(read_error(project_id, "trace_cost")),
        )
    }

    // ==================== Mutations ====================

    pub async fn bookmark_session(
        &self,
        actor: &Actor,
        project_id: &str,
        session_id: &str,
        bookmarked: bool,
    ) -> Result<SessionMetadata, ServiceError> {
        self.update_flag(actor, project_id, session_id, FlagUpdate::Bookmarked, bookmarked)
            .await
    }

    pub async fn publish_session(
        &self,
        actor: &Actor,
        project_id: &str,
        session_id: &str,
        public: bool,
    ) -> Result<SessionMetadata, ServiceError> {
        self.update_flag(actor, project_id, session_id, FlagUpdate::Public, public)
            .await
    }

    async fn update_flag(
        &self,
        actor: &Actor,
        project_id: &str,
        session_id: &str,
        flag: FlagUpdate,
        value: bool,
    ) -> Result<SessionMetadata, ServiceError> {
        self.access.check(actor, project_id, flag.scope())?;

        let before = self
            .metadata
            .get_session(session_id, project_id)
            .await
            .map_err(write_error(project_id, flag.action()))?
            .ok_or_else(|| {
                ServiceError::from_data(
                    DataError::not_found("session", session_id),
                    project_id,
                    flag.action(),
                    WRITE_FAILED,
                )
            })?;

        let after = match flag {
            FlagUpdate::Bookmarked => {
                self.metadata
                    .set_bookmarked(session_id, project_id, value)
                    .await
            }
            FlagUpdate::Public => self.metadata.set_public(session_id, project_id, value).await,
        }
        .map_err(write_error(project_id, flag.action()))?;

        self.audit
            .record(AuditRecord {
                actor: actor.id.clone(),
                project_id: project_id.to_string(),
                resource_type: "session",
                resource_id: session_id.to_string(),
                action: flag.action(),
                before: Some(flag.snapshot(&before)),
                after: flag.snapshot(&after),
            })
            .await;

        Ok(after)
    }

    /// Create the metadata row for a session; false when it already existed
    pub async fn register_session(
        &self,
        project_id: &str,
        session_id: &str,
        environment: &str,
    ) -> Result<bool, ServiceError> {
        self.metadata
            .register_session(session_id, project_id, environment)
            .await
            .map_err(write_error(project_id, "register_session"))
    }

    // ==================== Misc ====================

    pub async fn has_any_session(&self, project_id: &str) -> Result<bool, ServiceError> {
        self.store
            .has_any_session(project_id)
            .await
            .map_err(read_error(project_id, "has_any_session"))
    }

    /// Values offered by the session filter UI
    pub async fn filter_options(
        &self,
        project_id: &str,
        from_timestamp: Option<DateTime<Utc>>,
    ) -> Result<FilterOptions, ServiceError> {
        let filters: Vec<Filter> = from_timestamp
            .map(|value| Filter::Datetime {
                column: columns::TIMESTAMP.to_string(),
                operator: DatetimeOp::Gte,
                value,
            })
            .into_iter()
            .collect();

        let (user_ids, tags, numeric, categorical) = tokio::try_join!(
            self.store
                .user_options(project_id, &filters, FILTER_OPTIONS_USER_LIMIT)
                .map_err(read_error(project_id, "user_options")),
            self.store
                .tag_options(project_id, &filters)
                .map_err(read_error(project_id, "tag_options")),
            self.store
                .score_names(project_id, ScoreDataType::Numeric, from_timestamp)
                .map_err(read_error(project_id, "score_names")),
            self.store
                .score_names(project_id, ScoreDataType::Categorical, from_timestamp)
                .map_err(read_error(project_id, "score_names")),
        )?;

        Ok(FilterOptions {
            user_ids,
            tags,
            scores_numeric: numeric.into_iter().map(|row| row.name).collect(),
            scores_categorical: categorical,
        })
    }
}

/// Non-empty user ids in first-seen order
fn unique_users(traces: &[TraceIdentifier]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    traces
        .iter()
        .filter_map(|t| t.user_id.as_deref())
        .filter(|u| !u.is_empty() && seen.insert(*u))
        .map(str::to_string)
        .collect()
}
