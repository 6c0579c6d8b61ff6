use agent_context::cli::{Cli, Commands};
use agent_context::config::Config;
use agent_context::context_manager::ContextManager;
use agent_context::models::ConversationMessage;
use agent_context::router::{handle_config_command, route_command};
use agent_context::storage::JsonFileStore;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli_args = Cli::parse();

    if let Err(e) = run(cli_args).await {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

async fn run(cli_args: Cli) -> Result<()> {
    let config = Config::load()?;
    init_logging(cli_args.verbose || config.general.verbose);

    // Config commands must work even when the stored context is unreadable.
    if let Some(Commands::Config(args)) = &cli_args.command {
        return handle_config_command(args.clone());
    }

    config.validate()?;
    let store = JsonFileStore::open(&config.storage.data_dir)
        .await
        .with_context(|| format!("Failed to open context store in {}", config.storage.data_dir.display()))?;
    let manager = ContextManager::initialize(Arc::new(store), config.context.clone()).await?;

    let result = match cli_args.command {
        Some(command) => route_command(command, &manager).await,
        None => run_interactive_session(&manager).await,
    };

    manager.flush().await;
    manager.dispose();
    result
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

/// Read user turns from stdin, record them, and show what the context now suggests
async fn run_interactive_session(manager: &ContextManager) -> Result<()> {
    println!("Context session. Each line is recorded as a user message.");
    println!("Type 'context' to print the prompt context, 'help' for commands, 'quit' to stop.\n");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        let bytes_read = io::stdin().read_line(&mut input)?;

        // Handle EOF (Ctrl+D or piped input ending)
        if bytes_read == 0 {
            println!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }

        if input.eq_ignore_ascii_case("help") {
            show_help();
            continue;
        }

        if input.eq_ignore_ascii_case("context") {
            let context = manager.build_context_string().await;
            if context.is_empty() {
                println!("(no context yet)\n");
            } else {
                println!("{}\n", context);
            }
            continue;
        }

        let suggestions = manager.generate_suggestions(input).await;
        manager.add_message(ConversationMessage::user(input)).await;

        for suggestion in suggestions {
            println!("  hint: {}", suggestion);
        }
    }

    Ok(())
}

fn show_help() {
    println!("Commands:");
    println!("  context  Print the context block built from history and preferences");
    println!("  help     Show this help");
    println!("  quit     Leave the session (also: exit, Ctrl+D)");
    println!("Anything else is recorded as a user message.\n");
}
