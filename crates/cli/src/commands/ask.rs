use advisor_core::config::LoadOptions;
use advisor_core::domain::session::SessionId;
use serde_json::json;

use crate::commands::{
    advisor_runtime, build_runtime, error_class, load_config, open_store, CommandResult,
};

/// Runs a single turn and prints the reply as a JSON payload.
pub fn run(options: &LoadOptions, session: &str, message: &str, ephemeral: bool) -> CommandResult {
    if message.trim().is_empty() {
        return CommandResult::failure("ask", "bad_request", "message must not be empty", 1);
    }

    let config = match load_config("ask", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("ask") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let session_id = SessionId(session.trim().to_string());
    runtime.block_on(async {
        let advisor = match open_store(&config, ephemeral)
            .await
            .and_then(|store| advisor_runtime(&config, store))
        {
            Ok(advisor) => advisor,
            Err((error_class, message, exit_code)) => {
                return CommandResult::failure("ask", error_class, message, exit_code);
            }
        };

        match advisor.handle_turn(&session_id, message).await {
            Ok(outcome) => {
                let rendered = outcome.reply.render();
                let data = json!({
                    "session_id": outcome.session_id,
                    "state": outcome.state,
                    "reply": outcome.reply,
                    "validation_errors": outcome.validation_errors,
                });
                CommandResult::success_with_data("ask", rendered, Some(data))
            }
            Err(error) => {
                let (class, exit_code) = error_class(&error);
                let detail = error.to_string();
                let interface = error.into_interface(format!("{session_id}:ask"));
                let data = json!({
                    "correlation_id": interface.correlation_id(),
                    "detail": detail,
                });
                CommandResult::failure_with_data(
                    "ask",
                    class,
                    interface.user_message(),
                    exit_code,
                    Some(data),
                )
            }
        }
    })
}
