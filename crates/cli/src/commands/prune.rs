use advisor_core::config::LoadOptions;
use advisor_core::store::ConversationStore;
use advisor_db::{connect_from_config, migrations, SqlConversationStore};
use chrono::{Duration, Utc};

use crate::commands::{build_runtime, load_config, CommandFailure, CommandResult};

// a century; keeps the cutoff arithmetic in range
const MAX_AGE_HOURS: u64 = 24 * 365 * 100;

pub fn run(options: &LoadOptions, older_than_hours: Option<u64>) -> CommandResult {
    let config = match load_config("prune", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("prune") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let hours = older_than_hours.unwrap_or(config.database.session_ttl_hours).min(MAX_AGE_HOURS);
    let cutoff = Utc::now() - Duration::hours(hours as i64);

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let store = SqlConversationStore::new(pool.clone());
        let removed = store
            .prune_idle(cutoff)
            .await
            .map_err(|error| ("persistence", error.to_string(), 8u8))?;
        pool.close().await;
        Ok::<u64, CommandFailure>(removed)
    });

    match result {
        Ok(removed) => {
            tracing::info!(
                event_name = "cli.prune.completed",
                correlation_id = "prune",
                removed,
                older_than_hours = hours,
                "pruned idle sessions"
            );
            CommandResult::success(
                "prune",
                format!("removed {removed} session(s) idle for more than {hours} hour(s)"),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("prune", error_class, message, exit_code)
        }
    }
}
