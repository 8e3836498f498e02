//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod storage;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands};
pub use config::{AppConfig, SessionsConfig};
pub use storage::{AppStorage, DataSubdir};

// Re-export service enums from data layer
pub use crate::data::{AnalyticsService, TransactionalService};
