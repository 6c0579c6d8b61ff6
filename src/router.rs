use anyhow::{Context, Result};

use crate::cli::{Commands, ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::context_manager::ContextManager;
use crate::models::{ConversationMessage, MessageRole};

pub async fn route_command(command: Commands, manager: &ContextManager) -> Result<()> {
    match command {
        Commands::Add { content, role } => {
            let role: MessageRole = role.parse()?;
            manager.add_message(ConversationMessage::new(role, content)).await;
            println!("Recorded {} message.", role);
        }
        Commands::History { limit } => {
            let messages = manager.get_conversation_history(limit).await;
            if messages.is_empty() {
                println!("No conversation history.");
            }
            for message in messages {
                println!("[{}] {}: {}", format_timestamp(message.timestamp), message.role, message.content);
            }
        }
        Commands::Search { term } => {
            let hits = manager.search_messages(&term).await;
            println!("{} message(s) match '{}'", hits.len(), term);
            for message in hits {
                println!("[{}] {}: {}", format_timestamp(message.timestamp), message.role, message.content);
            }
        }
        Commands::Context => {
            let context = manager.build_context_string().await;
            if context.is_empty() {
                println!("No context recorded yet.");
            } else {
                println!("{}", context);
            }
        }
        Commands::Suggest { input } => {
            for suggestion in manager.generate_suggestions(&input).await {
                println!("- {}", suggestion);
            }
        }
        Commands::Prefs => print_preferences(manager).await,
        Commands::SetLanguage { language } => {
            manager.set_preferred_language(&language).await;
            println!("Preferred language set to {}.", language);
        }
        Commands::SetFramework { framework } => {
            manager.set_preferred_framework(&framework).await;
            println!("Preferred framework set to {}.", framework);
        }
        Commands::Clear => {
            manager
                .clear_all_context_data()
                .await
                .context("Failed to clear context data")?;
            println!("All context data cleared.");
        }
        Commands::Config(args) => handle_config_command(args)?,
    }

    manager.flush().await;
    Ok(())
}

pub fn handle_config_command(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("# {}", Config::get_config_path().display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Init => Config::create_sample_config()?,
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set_value(&key, &value)?;
            config.validate()?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }
    }
    Ok(())
}

async fn print_preferences(manager: &ContextManager) {
    let language = manager.get_preferred_language().await;
    let framework = manager.get_preferred_framework().await;
    println!("Preferred language:  {}", language.as_deref().unwrap_or("-"));
    println!("Preferred framework: {}", framework.as_deref().unwrap_or("-"));

    let frequent: Vec<String> = manager
        .get_frequent_languages(None)
        .await
        .into_iter()
        .map(|usage| format!("{} ({})", usage.language, usage.count))
        .collect();
    println!("Frequent languages:  {}", join_or_dash(&frequent));
    println!("Recent extensions:   {}", join_or_dash(&manager.get_recent_file_extensions(None).await));
    println!("Recent directories:  {}", join_or_dash(&manager.get_recent_directories(None).await));
    println!("Naming conventions:  {}", join_or_dash(&manager.get_file_naming_patterns().await));
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}
