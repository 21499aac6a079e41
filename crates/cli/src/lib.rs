pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "orderly",
    about = "Orderly operator CLI",
    long_about = "Operate the Orderly conversational ordering assistant: interactive chat, menu inspection, migrations, config inspection, and readiness checks.",
    after_help = "Examples:\n  orderly chat\n  orderly chat --resume 6f9e...\n  orderly menu\n  orderly doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive ordering conversation")]
    Chat {
        #[arg(long, help = "Resume an existing conversation by thread id")]
        resume: Option<String>,
    },
    #[command(about = "Fetch the live catalog and print the rendered menu")]
    Menu,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog token readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { resume } => commands::chat::run(resume),
        Command::Menu => commands::menu::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
