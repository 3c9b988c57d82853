use crate::config::Config;
use crate::error::Result;
use crate::message::Message;
use crate::storage::{self, MessageStore};
use crate::view::terminal::role_tag;
use colored::Colorize;
use prettytable::{format, Table};

const PREVIEW_CHARS: usize = 60;

/// Print stored history from the configured store
///
/// Reads the store directly, so no server needs to be running. Unlike the
/// HTTP history endpoints, a store failure is reported as an error here.
///
/// # Arguments
///
/// * `config` - Loaded configuration; only the store settings are used
/// * `json` - Print the messages as pretty JSON instead of a table
pub async fn show_history(config: &Config, json: bool) -> Result<()> {
    let store = storage::connect(&config.store, config.server.profile)?;
    let messages = store.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!("{}", "No conversation history found.".yellow());
        return Ok(());
    }

    println!("\nConversation History ({}):", store.describe());
    history_table(&messages).printstd();
    println!();

    Ok(())
}

fn history_table(messages: &[Message]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Time".bold(),
        "Role".bold(),
        "Content".bold()
    ]);

    for message in messages {
        let id_short: String = message.id.chars().take(8).collect();
        let time = message.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
        table.add_row(prettytable::row![
            id_short.cyan(),
            time,
            role_tag(message.role),
            preview(&message.content)
        ]);
    }

    table
}

/// Single-line preview of message content
fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}
