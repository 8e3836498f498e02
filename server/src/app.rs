//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::cli::{
    self, AccountCommands, CliConfig, Commands, ConversationCommands, SessionCommands,
    SessionListArgs,
};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::storage::AppStorage;
use crate::data::filters::{OrderBy, parse_filters};
use crate::data::{AnalyticsService, TransactionalService};
use crate::domain::sessions::SessionListRequest;
use crate::domain::{
    AccountDirectory, Actor, ConversationService, ProjectRole, ScopeAccessControl,
    SessionService, TracingAuditLog, TracingExceptionSink,
};

/// Acting user when none is configured
const DEFAULT_ACTOR: &str = "cli";

pub struct CoreApp {
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<TransactionalService>,
    pub analytics: Arc<AnalyticsService>,
    pub sessions: Arc<SessionService>,
    pub conversations: ConversationService,
    pub accounts: AccountDirectory,
    actor: Actor,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config).await?;
        let result = app.execute(command).await;
        app.shutdown().await;

        let output = result?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        Self::assemble(config, storage, cli).await
    }

    /// Connect both stores and build the services on top of them
    async fn assemble(config: AppConfig, storage: AppStorage, cli: &CliConfig) -> Result<Self> {
        let (database, analytics) = tokio::try_join!(
            async {
                TransactionalService::init(&config, &storage)
                    .await
                    .context("Failed to initialize metadata store")
            },
            async {
                AnalyticsService::init(&config.database)
                    .await
                    .context("Failed to initialize event store")
            },
        )?;

        let database = Arc::new(database);
        let analytics = Arc::new(analytics);
        tracing::debug!(
            transactional = %database.backend(),
            analytics = %analytics.backend(),
            "Stores initialized"
        );

        let metadata = database.repository();
        let sessions = Arc::new(SessionService::new(
            analytics.repository(),
            Arc::clone(&metadata),
            Arc::new(ScopeAccessControl),
            Arc::new(TracingAuditLog),
            Arc::new(TracingExceptionSink),
            config.sessions.clone(),
        ));
        let conversations = ConversationService::new(
            Arc::clone(&sessions),
            AccountDirectory::new(Arc::clone(&metadata)),
            config.sessions.listing_mode,
        );
        let accounts = AccountDirectory::new(metadata);

        let actor = Actor::new(
            cli.actor.clone().unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
            cli.role.unwrap_or(ProjectRole::Owner),
        );

        Ok(Self {
            config,
            storage,
            database,
            analytics,
            sessions,
            conversations,
            accounts,
            actor,
        })
    }

    /// Execute one command and return its JSON output
    async fn execute(&self, command: Commands) -> Result<serde_json::Value> {
        tracing::debug!(
            data_dir = %self.storage.data_dir().display(),
            listing_mode = %self.config.sessions.listing_mode,
            actor = %self.actor.id,
            "Executing command"
        );
        match command {
            Commands::Sessions { command } => self.execute_sessions(command).await,
            Commands::Conversations { command } => match command {
                ConversationCommands::List {
                    project,
                    account,
                    order_by,
                    page,
                    limit,
                } => {
                    let order_by = order_by.as_deref().map(OrderBy::parse).transpose()?;
                    json(
                        self.conversations
                            .list_conversations(&project, account.as_deref(), order_by, page, limit)
                            .await?,
                    )
                }
            },
            Commands::Accounts { command } => match command {
                AccountCommands::List { kind } => json(self.accounts.accounts(kind).await?),
            },
        }
    }

    async fn execute_sessions(&self, command: SessionCommands) -> Result<serde_json::Value> {
        let sessions = &self.sessions;
        match command {
            SessionCommands::List(args) => json(sessions.list_sessions(list_request(args)?).await?),
            SessionCommands::Count(args) => {
                json(sessions.count_sessions(list_request(args)?).await?)
            }
            SessionCommands::Metrics {
                project,
                session_ids,
            } => json(sessions.session_metrics(&project, &session_ids).await?),
            SessionCommands::Get { project, session } => {
                json(sessions.session_by_id(&project, &session).await?)
            }
            SessionCommands::Bookmark {
                project,
                session,
                value,
            } => json(
                sessions
                    .bookmark_session(&self.actor, &project, &session, value)
                    .await?,
            ),
            SessionCommands::Publish {
                project,
                session,
                value,
            } => json(
                sessions
                    .publish_session(&self.actor, &project, &session, value)
                    .await?,
            ),
            SessionCommands::Register {
                project,
                session,
                environment,
            } => {
                let created = sessions
                    .register_session(&project, &session, &environment)
                    .await?;
                Ok(serde_json::json!({ "created": created }))
            }
            SessionCommands::HasAny { project } => {
                let has_any = sessions.has_any_session(&project).await?;
                Ok(serde_json::json!({ "hasAnySession": has_any }))
            }
            SessionCommands::FilterOptions { project, from } => {
                json(sessions.filter_options(&project, from).await?)
            }
        }
    }

    async fn shutdown(&self) {
        tokio::join!(self.database.close(), self.analytics.close());
        tracing::debug!("Stores closed");
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        // stdout carries command output
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

fn json<T: Serialize>(value: T) -> Result<serde_json::Value> {
    serde_json::to_value(value).context("Failed to serialize command output")
}

/// Parse the raw filter and order arguments of a listing command
fn list_request(args: SessionListArgs) -> Result<SessionListRequest> {
    let filters = match args.filter.as_deref() {
        Some(raw) => parse_filters(raw)?,
        None => Vec::new(),
    };
    let order_by = args.order_by.as_deref().map(OrderBy::parse).transpose()?;
    Ok(SessionListRequest {
        project_id: args.project,
        filters,
        order_by,
        page: args.page,
        limit: args.limit,
        allowed_user_ids: args.allowed_users,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::OrderDirection;
    use crate::domain::ServiceError;

    fn list_args(filter: Option<&str>, order_by: Option<&str>) -> SessionListArgs {
        SessionListArgs {
            project: "p1".to_string(),
            filter: filter.map(str::to_string),
            order_by: order_by.map(str::to_string),
            page: Some(1),
            limit: Some(10),
            allowed_users: None,
        }
    }

    async fn app(dir: &tempfile::TempDir, cli: CliConfig) -> CoreApp {
        let config = AppConfig::load_defaults_for_test(&cli);
        let storage = AppStorage::init_for_test(dir.path().to_path_buf());
        tokio::fs::create_dir_all(dir.path().join("sqlite"))
            .await
            .unwrap();
        CoreApp::assemble(config, storage, &cli).await.unwrap()
    }

    fn sessions(command: SessionCommands) -> Commands {
        Commands::Sessions { command }
    }

    #[test]
    fn test_list_request_parses_filters_and_order() {
        let request = list_request(list_args(
            Some(r#"[{"type":"number","column":"countTraces","operator":">","value":1}]"#),
            Some("createdAt:asc"),
        ))
        .unwrap();
        assert_eq!(request.project_id, "p1");
        assert_eq!(request.filters.len(), 1);
        let order_by = request.order_by.unwrap();
        assert_eq!(order_by.column, "createdAt");
        assert_eq!(order_by.direction, OrderDirection::Asc);
        assert_eq!((request.page, request.limit), (Some(1), Some(10)));
    }

    #[test]
    fn test_list_request_rejects_malformed_filter() {
        assert!(list_request(list_args(Some("not json"), None)).is_err());
    }

    #[tokio::test]
    async fn test_register_bookmark_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, CliConfig::default()).await;

        let created = app
            .execute(sessions(SessionCommands::Register {
                project: "p1".to_string(),
                session: "s1".to_string(),
                environment: "default".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(created, serde_json::json!({ "created": true }));

        let updated = app
            .execute(sessions(SessionCommands::Bookmark {
                project: "p1".to_string(),
                session: "s1".to_string(),
                value: true,
            }))
            .await
            .unwrap();
        assert_eq!(updated["bookmarked"], serde_json::json!(true));

        let count = app
            .execute(sessions(SessionCommands::Count(list_args(None, None))))
            .await
            .unwrap();
        assert_eq!(count, serde_json::json!({ "totalCount": 0 }));

        let has_any = app
            .execute(sessions(SessionCommands::HasAny {
                project: "p1".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(has_any, serde_json::json!({ "hasAnySession": false }));

        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_viewer_cannot_publish() {
        let dir = tempfile::tempdir().unwrap();
        let cli = CliConfig {
            actor: Some("ann".to_string()),
            role: Some(ProjectRole::Viewer),
            ..Default::default()
        };
        let app = app(&dir, cli).await;
        let err = app
            .execute(sessions(SessionCommands::Publish {
                project: "p1".to_string(),
                session: "s1".to_string(),
                value: true,
            }))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::Forbidden { .. })
        ));
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_accounts_and_conversations_empty() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, CliConfig::default()).await;
        let accounts = app
            .execute(Commands::Accounts {
                command: AccountCommands::List { kind: None },
            })
            .await
            .unwrap();
        assert_eq!(accounts, serde_json::json!([]));

        let conversations = app
            .execute(Commands::Conversations {
                command: ConversationCommands::List {
                    project: "p1".to_string(),
                    account: None,
                    order_by: None,
                    page: None,
                    limit: None,
                },
            })
            .await
            .unwrap();
        assert_eq!(conversations, serde_json::json!([]));
        app.shutdown().await;
    }
}
