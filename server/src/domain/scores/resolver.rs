//! Chunked score lookups with per-row validation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;

use super::types::Score;
use super::validate::validate_scores;
use crate::data::types::{RawScoreRow, ScoreQuery, ScoreTarget};
use crate::data::{DataError, EventStore};
use crate::domain::telemetry::ExceptionSink;

/// Fetches scores for trace or session ids and keeps the valid ones
pub struct ScoreResolver {
    store: Arc<dyn EventStore>,
    sink: Arc<dyn ExceptionSink>,
    chunk_size: usize,
}

impl ScoreResolver {
    pub fn new(store: Arc<dyn EventStore>, sink: Arc<dyn ExceptionSink>, chunk_size: usize) -> Self {
        Self {
            store,
            sink,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Scores newest first.
    ///
    /// Id lists longer than the chunk size are split into concurrent
    /// queries. With a limit, each chunk fetches `offset + limit` rows and
    /// the window is cut after merging.
    pub async fn resolve(
        &self,
        project_id: &str,
        target: ScoreTarget,
        min_timestamp: Option<DateTime<Utc>>,
        limit: Option<u32>,
        offset: Option<u64>,
    ) -> Result<Vec<Score>, DataError> {
        if target.ids().is_empty() {
            return Ok(Vec::new());
        }

        let rows = if target.ids().len() <= self.chunk_size {
            let query = ScoreQuery::new(project_id, target)
                .with_min_timestamp(min_timestamp)
                .with_limit(limit, offset);
            self.store.scores(&query).await?
        } else {
            self.resolve_chunked(project_id, &target, min_timestamp, limit, offset)
                .await?
        };

        let (scores, dropped) = validate_scores(rows, |id, e| {
            self.sink.capture("score_validation", id, &e.to_string());
        });
        if dropped > 0 {
            tracing::warn!(project_id, dropped, kept = scores.len(), "Dropped invalid scores");
        }
        Ok(scores)
    }

    async fn resolve_chunked(
        &self,
        project_id: &str,
        target: &ScoreTarget,
        min_timestamp: Option<DateTime<Utc>>,
        limit: Option<u32>,
        offset: Option<u64>,
    ) -> Result<Vec<RawScoreRow>, DataError> {
        let offset = offset.unwrap_or(0);
        let per_chunk_limit = limit.map(|l| {
            u32::try_from(u64::from(l).saturating_add(offset)).unwrap_or(u32::MAX)
        });

        let queries: Vec<ScoreQuery> = target
            .ids()
            .chunks(self.chunk_size)
            .map(|chunk| {
                let ids = chunk.to_vec();
                let target = match target {
                    ScoreTarget::Traces(_) => ScoreTarget::Traces(ids),
                    ScoreTarget::Sessions(_) => ScoreTarget::Sessions(ids),
                };
                ScoreQuery::new(project_id, target)
                    .with_min_timestamp(min_timestamp)
                    .with_limit(per_chunk_limit, per_chunk_limit.map(|_| 0))
            })
            .collect();

        tracing::debug!(project_id, chunks = queries.len(), "Resolving scores in chunks");

        let results = try_join_all(queries.iter().map(|q| self.store.scores(q))).await?;
        let mut rows: Vec<RawScoreRow> = results.into_iter().flatten().collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(skip);
        Ok(match limit {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        })
    }
}
