//! Command-line interface definition for Parley
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for serving, chatting, and inspecting history.

use clap::{Parser, Subcommand};

/// Parley - streaming LLM chat server
///
/// Serve a chat endpoint that relays model output token-by-token and keeps
/// the conversation in a message store.
#[derive(Parser, Debug, Clone)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/parley.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Parley
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the chat HTTP server
    Serve {
        /// Address to bind, e.g. 127.0.0.1:3000
        #[arg(short, long)]
        bind: Option<String>,

        /// Runtime profile: development or production
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Chat with a running server from the terminal
    Chat {
        /// Base URL of the Parley server
        #[arg(short, long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },

    /// Print the stored conversation history
    History {
        /// Output history as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/parley.yaml".to_string()),
            verbose: false,
            json_logs: false,
            command: Commands::History { json: false },
        }
    }
}
