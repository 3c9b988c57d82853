//! History endpoints: `GET /api/messages` and `GET /`
//!
//! Both read through [`MessageStore::fetch_ordered`], so an unreachable store
//! yields an empty history instead of an error page.

use super::AppState;
use crate::message::{Message, Role};
use crate::storage::MessageStore;
use crate::view::EMPTY_HISTORY;
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use std::fmt::Write;

/// Stored history as JSON, oldest first
pub async fn messages(State(state): State<AppState>) -> Json<Vec<Message>> {
    Json(state.store.fetch_ordered().await)
}

/// Stored history rendered as a standalone HTML page
pub async fn page(State(state): State<AppState>) -> Html<String> {
    let messages = state.store.fetch_ordered().await;
    Html(render_page(&messages))
}

fn render_page(messages: &[Message]) -> String {
    let mut body = String::new();
    if messages.is_empty() {
        let _ = write!(body, r#"<p class="empty">{}</p>"#, EMPTY_HISTORY);
    }
    for message in messages {
        let _ = write!(
            body,
            r#"<div class="message {role}"><span class="role">{label}</span><p>{content}</p></div>"#,
            role = message.role,
            label = role_label(message.role),
            content = html_escape::encode_text(&message.content),
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Parley</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; }}
.message {{ margin: 0.75rem 0; }}
.message p {{ white-space: pre-wrap; margin: 0.25rem 0; }}
.role {{ font-weight: bold; }}
.user .role {{ color: #2563eb; }}
.assistant .role {{ color: #16a34a; }}
.empty {{ color: #6b7280; }}
</style>
</head>
<body>
<main id="messages">
{}
</main>
</body>
</html>
"#,
        body
    )
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "AI",
        Role::System => "System",
        Role::Tool => "Tool",
    }
}
