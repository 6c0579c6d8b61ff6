use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Without a command, start an interactive session
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Record a conversation message
    Add {
        content: String,
        /// user, assistant or system
        #[clap(short, long, default_value = "user")]
        role: String,
    },
    /// Show the most recent messages
    History {
        #[clap(short, long)]
        limit: Option<usize>,
    },
    /// Search message content (case-insensitive)
    Search {
        term: String,
    },
    /// Print the context block handed to prompt builders
    Context,
    /// Suggest follow-ups for a partial request
    Suggest {
        input: String,
    },
    /// Show tracked language and file preferences
    Prefs,
    /// Set the preferred language
    SetLanguage {
        language: String,
    },
    /// Set the preferred framework
    SetFramework {
        framework: String,
    },
    /// Delete all conversation history and preferences
    Clear,
    /// Manage the configuration file
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[clap(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init,
    /// Set a configuration value and save it
    Set {
        key: String,
        value: String,
    },
}
