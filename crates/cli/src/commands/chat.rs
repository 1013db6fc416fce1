use std::io::{self, BufRead, Write};

use advisor_core::config::LoadOptions;
use advisor_core::domain::session::SessionId;

use crate::commands::{
    advisor_runtime, build_runtime, load_config, open_store, CommandFailure, CommandResult,
};

const GREETING: &str = "Ask me about your competitors, a decision you're weighing, or an idea you want to test. Type /quit to leave.";

/// Interactive conversation on stdin/stdout. Replies are printed as they
/// arrive; the closing JSON payload summarizes the session.
pub fn run(options: &LoadOptions, session: Option<String>, ephemeral: bool) -> CommandResult {
    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("chat") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let session_id = session
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(SessionId)
        .unwrap_or_else(SessionId::generate);

    let result = runtime.block_on(async {
        let store = open_store(&config, ephemeral).await?;
        let advisor = advisor_runtime(&config, store)?;

        println!("session {session_id}\n{GREETING}\n");
        let stdin = io::stdin();
        let mut turns = 0usize;
        loop {
            print!("> ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            let read = stdin
                .lock()
                .read_line(&mut line)
                .map_err(|error| ("stdin", error.to_string(), 10u8))?;
            if read == 0 {
                break;
            }
            let utterance = line.trim();
            if utterance.is_empty() {
                continue;
            }
            if matches!(utterance, "/quit" | "/exit") {
                break;
            }

            match advisor.handle_turn(&session_id, utterance).await {
                Ok(outcome) => {
                    turns += 1;
                    println!("\n{}\n", outcome.reply.render());
                }
                Err(error) => {
                    let correlation_id = format!("{session_id}:chat:{turns}");
                    tracing::warn!(
                        event_name = "cli.chat.turn_failed",
                        session_id = %session_id,
                        correlation_id = correlation_id.as_str(),
                        error = %error,
                        "chat turn failed"
                    );
                    let interface = error.into_interface(correlation_id);
                    println!("\n{}\n", interface.user_message());
                }
            }
        }
        Ok::<usize, CommandFailure>(turns)
    });

    match result {
        Ok(turns) => CommandResult::success(
            "chat",
            format!("session {session_id} closed after {turns} answered turn(s)"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}
