//! PostgreSQL repositories
//!
//! Types (SessionMetadata, AccountRow) should be imported from `crate::data::types`.

pub mod account;
pub mod session;
