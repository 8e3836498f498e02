//! Session domain logic
//!
//! - `sessions` - Listing, metrics, detail and flag mutations
//! - `scores` - Score validation, chunked resolution and rollups
//! - `conversations` - Session listing restricted by the listing mode
//! - `accounts` - Read-only account directory
//! - `access`, `audit`, `telemetry` - Collaborators with default implementations
//! - `error` - Errors returned to callers

pub mod access;
pub mod accounts;
pub mod audit;
pub mod conversations;
pub mod error;
pub mod scores;
pub mod sessions;
pub mod telemetry;

pub use access::{AccessControl, Actor, ProjectRole, ScopeAccessControl};
pub use accounts::AccountDirectory;
pub use audit::{AuditLog, TracingAuditLog};
pub use conversations::ConversationService;
pub use error::ServiceError;
pub use sessions::SessionService;
pub use telemetry::{ExceptionSink, TracingExceptionSink};
