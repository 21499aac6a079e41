use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use uuid::Uuid;

use orderly_agent::OrderWorkflow;
use orderly_core::config::{AppConfig, LoadOptions};
use orderly_db::{connect_with_settings, migrations, SqlConversationStore};

use crate::commands::CommandResult;

/// Interactive ordering REPL. The thread id is the unit of state
/// isolation: a fresh one is generated per session unless `--resume` is
/// given, and the cart persists across sessions under that id.
pub fn run(resume: Option<String>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
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
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let resuming = resume.is_some();
    let thread_id = resume.unwrap_or_else(|| Uuid::new_v4().to_string());

    match runtime.block_on(chat_loop(&config, &thread_id, resuming)) {
        Ok(()) => CommandResult::success("chat", format!("conversation ended (thread {thread_id})")),
        Err(error) => CommandResult::failure("chat", "chat_runtime", format!("{error:#}"), 4),
    }
}

async fn chat_loop(config: &AppConfig, thread_id: &str, resuming: bool) -> anyhow::Result<()> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .context("failed to connect to database")?;
    migrations::run_pending(&pool).await.context("failed to run migrations")?;

    let workflow =
        OrderWorkflow::from_config(config, Arc::new(SqlConversationStore::new(pool)))?;

    if resuming {
        println!("Resuming conversation: {thread_id}");
        let snapshot = workflow.snapshot(thread_id).await?;
        if !snapshot.cart.is_empty() {
            println!("Resumed with {} item(s) in cart.", snapshot.cart.len());
        }
    } else {
        println!("Starting new conversation. Thread ID: {thread_id}");
        println!("(Save this ID to resume later with --resume)");
    }

    println!();
    println!("Welcome to the Orderly assistant!");
    println!("Type 'menu' to see options, 'help' for commands, 'quit' to exit.");

    let stdin = io::stdin();
    loop {
        print!("\nYou: ");
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = stdin.read_line(&mut line).context("failed to read input")?;
        if read == 0 {
            println!("\nGoodbye!");
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            println!("Goodbye! Your cart has been saved.");
            println!("Resume later with: orderly chat --resume {thread_id}");
            break;
        }

        match workflow.handle_turn(thread_id, input).await {
            Ok(outcome) => println!("\nBot: {}", outcome.response_text),
            Err(error) => {
                println!("\nBot: Sorry, something went wrong. Please try again. ({error})");
            }
        }
    }

    Ok(())
}
