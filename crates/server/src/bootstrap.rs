use std::sync::Arc;

use orderly_agent::OrderWorkflow;
use orderly_core::config::{AppConfig, ConfigError, LoadOptions};
use orderly_db::{connect_with_settings, migrations, DbPool, SqlConversationStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub workflow: Arc<OrderWorkflow>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("workflow assembly failed: {0}")]
    Workflow(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        "database migrations applied"
    );

    let store = Arc::new(SqlConversationStore::new(db_pool.clone()));
    let workflow =
        OrderWorkflow::from_config(&config, store).map_err(BootstrapError::Workflow)?;

    Ok(Application { config, db_pool, workflow: Arc::new(workflow) })
}

#[cfg(test)]
mod tests {
    use orderly_core::config::{ConfigOverrides, LoadOptions};
    use orderly_core::Stage;

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                catalog_access_token: Some("sq-test-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_catalog_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                catalog_access_token: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("catalog.access_token"));
    }

    #[tokio::test]
    async fn bootstrap_prepares_schema_and_serves_network_free_turns() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name = 'conversation_state'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("conversation_state table should exist after bootstrap");
        assert_eq!(table_count, 1);

        // A cart view never touches the remote catalog, so the full
        // startup data path is exercised without the network.
        let outcome = app
            .workflow
            .handle_turn("thread-bootstrap", "what's in my cart?")
            .await
            .expect("turn should complete");
        assert!(outcome.response_text.contains("cart is empty"));
        assert_eq!(outcome.cart_item_count, 0);

        let state = app.workflow.snapshot("thread-bootstrap").await.expect("snapshot");
        assert_eq!(state.stage, Stage::Idle);

        app.db_pool.close().await;
    }
}
