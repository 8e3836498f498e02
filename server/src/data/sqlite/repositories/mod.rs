//! SQLite repositories
//!
//! Types (SessionMetadata, AccountRow) should be imported from `crate::data::types`.

pub mod account;
pub mod session;

pub use account::{list_accounts, list_test_usernames};
pub use session::{
    bookmarked_session_ids, get_session, lookup_sessions, register_session, set_bookmarked,
    set_public,
};
