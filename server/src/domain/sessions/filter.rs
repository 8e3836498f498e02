//! Resolution of filters on relational-only columns
//!
//! The event store cannot see bookmark flags, so a `bookmarked` filter is
//! rewritten into an `id` filter over the bookmarked session ids.

use crate::data::filters::{BooleanOp, ColumnStage, Filter, FilterError, columns};

/// Filters after relational columns were rewritten
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedFilters {
    Filters(Vec<Filter>),
    /// No session can match
    Empty,
}

/// Validate every filter and report whether bookmark ids are needed
pub fn check_filters(filters: &[Filter]) -> Result<bool, FilterError> {
    let mut needs_bookmarks = false;
    for filter in filters {
        filter.validate()?;
        if columns::resolve(filter.column())?.stage == ColumnStage::Relational {
            needs_bookmarks = true;
        }
    }
    Ok(needs_bookmarks)
}

/// Replace `bookmarked` filters using the project's bookmarked ids
pub fn rewrite_bookmarked(filters: Vec<Filter>, bookmarked_ids: &[String]) -> ResolvedFilters {
    let mut resolved = Vec::with_capacity(filters.len());
    for filter in filters {
        match filter {
            Filter::Boolean {
                ref column,
                operator,
                value,
            } if column == columns::BOOKMARKED => {
                let want_bookmarked = match operator {
                    BooleanOp::Eq => value,
                    BooleanOp::Ne => !value,
                };
                if want_bookmarked {
                    if bookmarked_ids.is_empty() {
                        return ResolvedFilters::Empty;
                    }
                    resolved.push(Filter::any_of(columns::SESSION_ID, bookmarked_ids.to_vec()));
                } else if !bookmarked_ids.is_empty() {
                    resolved.push(Filter::none_of(columns::SESSION_ID, bookmarked_ids.to_vec()));
                }
            }
            other => resolved.push(other),
        }
    }
    ResolvedFilters::Filters(resolved)
}
