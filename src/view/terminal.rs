//! Terminal rendering for [`ChatView`](super::ChatView)

use super::EMPTY_HISTORY;
use crate::message::{ChatMessage, Role};
use colored::Colorize;

/// Shown while waiting for the first token
pub const TYPING_INDICATOR: &str = "AI is typing...";

const REMEDIATION_HINT: &str =
    "Ensure the API key and store connection are correct. Check server logs for more details.";

/// Role label, colored by role
pub fn role_tag(role: Role) -> String {
    match role {
        Role::User => "You".blue().bold().to_string(),
        Role::Assistant => "AI".green().bold().to_string(),
        Role::System => "System".yellow().bold().to_string(),
        Role::Tool => "Tool".magenta().bold().to_string(),
    }
}

/// Format a full message for display
pub fn format_message(message: &ChatMessage) -> String {
    format!("{}: {}", role_tag(message.role), message.content)
}

/// Format the whole transcript, or the placeholder when it is empty
pub fn render_history(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return EMPTY_HISTORY.dimmed().to_string();
    }
    messages
        .iter()
        .map(format_message)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Waiting indicator line
pub fn typing_indicator() -> String {
    TYPING_INDICATOR.dimmed().italic().to_string()
}

/// Format a request failure with remediation hints
pub fn format_error(error: &str) -> String {
    format!(
        "{} {}\n{}",
        "Error:".red().bold(),
        error,
        REMEDIATION_HINT.yellow()
    )
}

/// Input prompt; reflects whether input is currently accepted
pub fn prompt(status_label: &str) -> String {
    format!("[{}] >>> ", status_label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_empty_history_placeholder() {
        plain();
        assert_eq!(render_history(&[]), EMPTY_HISTORY);
    }

    #[test]
    fn test_roles_are_distinguished() {
        plain();
        let rendered = render_history(&[
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::system("be brief"),
        ]);
        assert_eq!(rendered, "You: hi\nAI: hello\nSystem: be brief");
    }

    #[test]
    fn test_error_includes_hints() {
        plain();
        let text = format_error("401 Unauthorized");
        assert!(text.contains("401 Unauthorized"));
        assert!(text.contains("API key"));
        assert!(text.contains("store connection"));
        assert!(text.contains("server logs"));
    }

    #[test]
    fn test_typing_indicator_text() {
        plain();
        assert_eq!(typing_indicator(), TYPING_INDICATOR);
    }
}
