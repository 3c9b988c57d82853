/*!
Command handlers for the CLI

- `serve`: run the HTTP server
- `chat`: interactive terminal chat against a running server
- `history`: print stored history straight from the configured store
*/

use crate::config::Config;
use crate::error::Result;

// History listing
pub mod history;

/// Run the HTTP server until ctrl-c
///
/// # Errors
///
/// Returns error if the store or gateway cannot be built, or the address
/// cannot be bound
pub async fn serve(config: Config) -> Result<()> {
    crate::server::serve(config).await
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Loads history from the server, seeds a [`ChatView`] with it, and runs
    //! a readline loop that submits each line and prints the streamed reply.

    use super::*;
    use crate::client::ChatClient;
    use crate::message::{ChatRequest, Role};
    use crate::view::{terminal, ChatView};
    use colored::Colorize;
    use futures::StreamExt;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::io::Write;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `server` - Base URL of a running Parley server
    ///
    /// # Errors
    ///
    /// Returns error if the server URL is invalid or the terminal cannot be
    /// opened. Request failures are shown inline and do not end the session.
    pub async fn run_chat(server: &str) -> Result<()> {
        tracing::info!("Starting interactive chat against {}", server);

        let client = ChatClient::new(server)?;

        let history = match client.fetch_history().await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("Failed to load history: {:#}", e);
                Vec::new()
            }
        };

        let mut view = ChatView::new(&history);
        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(server);
        println!("{}\n", terminal::render_history(view.messages()));
        view.take_scroll_request();

        loop {
            match rl.readline(&terminal::prompt(view.status_label())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if matches!(trimmed, "/quit" | "/exit") {
                        break;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    view.set_input(trimmed);
                    let Some(request) = view.submit() else {
                        continue;
                    };
                    exchange(&client, &mut view, request).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Send one request and render the reply as it streams in
    async fn exchange(client: &ChatClient, view: &mut ChatView, request: ChatRequest) {
        if view.is_waiting_for_first_token() {
            println!("{}", terminal::typing_indicator());
        }

        let mut stream = match client.send(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                view.on_error(format!("{:#}", e));
                print_error(view);
                return;
            }
        };

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => {
                    let first = view.is_waiting_for_first_token();
                    view.on_chunk(&text);
                    if first && !text.is_empty() {
                        print!("{}: ", terminal::role_tag(Role::Assistant));
                    }
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                }
                Err(e) => {
                    println!();
                    view.on_error(format!("{:#}", e));
                    print_error(view);
                    return;
                }
            }
        }

        view.on_complete();
        view.take_scroll_request();
        println!("\n");
    }

    fn print_error(view: &ChatView) {
        if let Some(error) = view.error() {
            eprintln!("{}\n", terminal::format_error(error));
        }
    }

    fn print_welcome_banner(server: &str) {
        println!("{}", "Parley".bold());
        println!("Server: {}", server.cyan());
        println!("Type {} or press CTRL-D to leave.\n", "/quit".cyan());
    }
}
