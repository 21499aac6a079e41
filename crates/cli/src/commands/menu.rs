use std::sync::Arc;

use anyhow::Context;

use orderly_catalog::{CatalogGateway, HttpCatalogClient};
use orderly_core::config::{AppConfig, LoadOptions};
use orderly_core::render_menu;

use crate::commands::CommandResult;

/// Fetch the live catalog and print the rendered menu.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "menu",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "menu",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let api = HttpCatalogClient::new(
            config.catalog.base_url.clone(),
            config.catalog.access_token.clone(),
            config.catalog.timeout_secs,
        )
        .context("failed to build catalog client")?;
        let gateway = CatalogGateway::new(Arc::new(api), &config.catalog.allowed_variants);
        let items = gateway.list_items().await.context("failed to fetch catalog")?;
        Ok::<String, anyhow::Error>(render_menu(&items))
    });

    match result {
        Ok(menu) => CommandResult { exit_code: 0, output: menu },
        Err(error) => CommandResult::failure("menu", "catalog_fetch", format!("{error:#}"), 4),
    }
}
