use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

use super::config::{AnalyticsBackend, ListingMode, TransactionalBackend};
use super::constants::{
    ENV_ACTOR, ENV_ANALYTICS_BACKEND, ENV_CLICKHOUSE_URL, ENV_CONFIG, ENV_LISTING_MODE,
    ENV_MEMORY_FIXTURE, ENV_POSTGRES_URL, ENV_SQLITE_PATH, ENV_TRANSACTIONAL_BACKEND,
};
use crate::domain::access::ProjectRole;
use crate::domain::accounts::AccountKind;

#[derive(Parser)]
#[command(name = "sessionscope")]
#[command(version, about = "Session aggregation and query engine for LLM traces", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Event store backend (memory or clickhouse)
    #[arg(long, global = true, env = ENV_ANALYTICS_BACKEND, value_parser = parse_analytics_backend)]
    pub analytics_backend: Option<AnalyticsBackend>,

    /// Metadata store backend (sqlite or postgres)
    #[arg(long, global = true, env = ENV_TRANSACTIONAL_BACKEND, value_parser = parse_transactional_backend)]
    pub transactional_backend: Option<TransactionalBackend>,

    /// ClickHouse connection URL
    #[arg(long, global = true, env = ENV_CLICKHOUSE_URL)]
    pub clickhouse_url: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,

    /// SQLite database file
    #[arg(long, global = true, env = ENV_SQLITE_PATH)]
    pub sqlite_path: Option<PathBuf>,

    /// JSON fixture preloaded into the memory event store
    #[arg(long, global = true, env = ENV_MEMORY_FIXTURE)]
    pub memory_fixture: Option<PathBuf>,

    /// Conversation listing mode (allow_list or unrestricted)
    #[arg(long, global = true, env = ENV_LISTING_MODE, value_parser = parse_listing_mode)]
    pub listing_mode: Option<ListingMode>,

    /// Acting user recorded in audit logs for mutations
    #[arg(long, global = true, env = ENV_ACTOR)]
    pub actor: Option<String>,

    /// Role of the acting user in the target project
    #[arg(long, global = true, value_parser = parse_project_role)]
    pub role: Option<ProjectRole>,
}

/// Parse transactional backend from CLI/env string
fn parse_transactional_backend(s: &str) -> Result<TransactionalBackend, String> {
    match s.to_lowercase().as_str() {
        "sqlite" => Ok(TransactionalBackend::Sqlite),
        "postgres" | "postgresql" => Ok(TransactionalBackend::Postgres),
        _ => Err(format!(
            "Invalid transactional backend '{}'. Valid options: sqlite, postgres",
            s
        )),
    }
}

/// Parse analytics backend from CLI/env string
fn parse_analytics_backend(s: &str) -> Result<AnalyticsBackend, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(AnalyticsBackend::Memory),
        "clickhouse" => Ok(AnalyticsBackend::Clickhouse),
        _ => Err(format!(
            "Invalid analytics backend '{}'. Valid options: memory, clickhouse",
            s
        )),
    }
}

/// Parse listing mode from CLI/env string
fn parse_listing_mode(s: &str) -> Result<ListingMode, String> {
    match s.to_lowercase().replace('-', "_").as_str() {
        "allow_list" => Ok(ListingMode::AllowList),
        "unrestricted" => Ok(ListingMode::Unrestricted),
        _ => Err(format!(
            "Invalid listing mode '{}'. Valid options: allow_list, unrestricted",
            s
        )),
    }
}

fn parse_project_role(s: &str) -> Result<ProjectRole, String> {
    s.parse()
}

fn parse_account_kind(s: &str) -> Result<AccountKind, String> {
    s.parse()
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Query and update sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// List conversations visible to the configured listing mode
    Conversations {
        #[command(subcommand)]
        command: ConversationCommands,
    },
    /// Read the account directory
    Accounts {
        #[command(subcommand)]
        command: AccountCommands,
    },
}

/// Filter, order and page arguments shared by session listings
#[derive(Args, Clone, Debug)]
pub struct SessionListArgs {
    /// Project id
    #[arg(long, short = 'P')]
    pub project: String,

    /// Filter JSON array, e.g. '[{"type":"number","column":"countTraces","operator":">","value":1}]'
    #[arg(long)]
    pub filter: Option<String>,

    /// Order by `column`, `column:asc` or `column:desc`
    #[arg(long)]
    pub order_by: Option<String>,

    /// Zero-based page (only applied together with --limit)
    #[arg(long)]
    pub page: Option<u32>,

    /// Page size (only applied together with --page)
    #[arg(long)]
    pub limit: Option<u32>,

    /// Keep sessions with any of these members; pass without values for an empty allow-list
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    pub allowed_users: Option<Vec<String>>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SessionCommands {
    /// List sessions
    List(SessionListArgs),
    /// Count sessions matching the filters
    Count(SessionListArgs),
    /// Cost, usage and score rollups for the given sessions
    Metrics {
        #[arg(long, short = 'P')]
        project: String,
        /// Session ids
        session_ids: Vec<String>,
    },
    /// Session detail with traces, scores and total cost
    Get {
        #[arg(long, short = 'P')]
        project: String,
        session: String,
    },
    /// Set or clear the bookmark flag
    Bookmark {
        #[arg(long, short = 'P')]
        project: String,
        session: String,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        value: bool,
    },
    /// Set or clear the public flag
    Publish {
        #[arg(long, short = 'P')]
        project: String,
        session: String,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        value: bool,
    },
    /// Create the metadata row for a session (no-op when present)
    Register {
        #[arg(long, short = 'P')]
        project: String,
        session: String,
        #[arg(long, default_value = "default")]
        environment: String,
    },
    /// Whether the project has any session at all
    HasAny {
        #[arg(long, short = 'P')]
        project: String,
    },
    /// Filter options (users, tags, score names)
    FilterOptions {
        #[arg(long, short = 'P')]
        project: String,
        /// Only consider traces and scores at or after this RFC 3339 timestamp
        #[arg(long)]
        from: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConversationCommands {
    /// List conversations (id, members, creation time)
    List {
        #[arg(long, short = 'P')]
        project: String,
        /// Only sessions of this account
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        order_by: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum AccountCommands {
    /// List accounts, optionally of one kind (real, synthetic, snapshot)
    List {
        #[arg(long, value_parser = parse_account_kind)]
        kind: Option<AccountKind>,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub transactional_backend: Option<TransactionalBackend>,
    pub analytics_backend: Option<AnalyticsBackend>,
    pub postgres_url: Option<String>,
    pub clickhouse_url: Option<String>,
    pub sqlite_path: Option<PathBuf>,
    pub memory_fixture: Option<PathBuf>,
    pub listing_mode: Option<ListingMode>,
    pub actor: Option<String>,
    pub role: Option<ProjectRole>,
}

impl From<Cli> for (CliConfig, Commands) {
    fn from(cli: Cli) -> Self {
        let config = CliConfig {
            config: cli.config,
            transactional_backend: cli.transactional_backend,
            analytics_backend: cli.analytics_backend,
            postgres_url: cli.postgres_url,
            clickhouse_url: cli.clickhouse_url,
            sqlite_path: cli.sqlite_path,
            memory_fixture: cli.memory_fixture,
            listing_mode: cli.listing_mode,
            actor: cli.actor,
            role: cli.role,
        };
        (config, cli.command)
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    Cli::parse().into()
}
