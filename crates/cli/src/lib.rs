pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use advisor_core::config::{ConfigOverrides, LlmProvider, LoadOptions};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "advisor",
    about = "Conversational business advisor",
    long_about = "Talk through competitor analyses, decisions, and idea validations; manage the \
                  session store.",
    after_help = "Examples:\n  advisor chat\n  advisor ask --session demo \"Should we raise a Series A or bootstrap?\"\n  advisor config\n  advisor prune --older-than-hours 24"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Read configuration from this file (must exist)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(
        long,
        global = true,
        value_parser = parse_provider,
        help = "Override llm.provider (openai, anthropic, ollama)"
    )]
    llm_provider: Option<LlmProvider>,
    #[arg(long, global = true, help = "Override llm.model")]
    llm_model: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive advisory conversation on stdin")]
    Chat {
        #[arg(long, help = "Resume or name a session; a new id is generated when omitted")]
        session: Option<String>,
        #[arg(long, help = "Keep the conversation in memory only")]
        ephemeral: bool,
        #[arg(long, help = "Analyze as soon as required details are known")]
        skip_optional: bool,
    },
    #[command(about = "Send one message to a session and print the reply as JSON")]
    Ask {
        #[arg(long, help = "Session to continue or create")]
        session: String,
        #[arg(long, help = "Keep the conversation in memory only")]
        ephemeral: bool,
        #[arg(long, help = "Analyze as soon as required details are known")]
        skip_optional: bool,
        #[arg(help = "What to say to the advisor")]
        message: String,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Delete sessions that have been idle longer than the retention window")]
    Prune {
        #[arg(long, help = "Idle threshold; defaults to database.session_ttl_hours")]
        older_than_hours: Option<u64>,
    },
}

fn parse_provider(raw: &str) -> Result<LlmProvider, String> {
    raw.parse::<LlmProvider>().map_err(|error| error.to_string())
}

impl GlobalArgs {
    fn load_options(&self, skip_optional: bool) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                llm_provider: self.llm_provider,
                llm_model: self.llm_model.clone(),
                offer_optional_slots: skip_optional.then_some(false),
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let global = &cli.global;

    let result = match cli.command {
        Command::Chat { session, ephemeral, skip_optional } => {
            commands::chat::run(&global.load_options(skip_optional), session, ephemeral)
        }
        Command::Ask { session, ephemeral, skip_optional, message } => commands::ask::run(
            &global.load_options(skip_optional),
            &session,
            &message,
            ephemeral,
        ),
        Command::Migrate => commands::migrate::run(&global.load_options(false)),
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(&global.load_options(false)),
        },
        Command::Prune { older_than_hours } => {
            commands::prune::run(&global.load_options(false), older_than_hours)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn ask_collects_global_overrides() {
        let cli = Cli::parse_from([
            "advisor",
            "--llm-provider",
            "anthropic",
            "ask",
            "--session",
            "s1",
            "--skip-optional",
            "hello",
        ]);
        let Command::Ask { ref session, skip_optional, ref message, .. } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(session, "s1");
        assert_eq!(message, "hello");

        let options = cli.global.load_options(skip_optional);
        assert_eq!(options.overrides.llm_provider.map(|p| p.as_str()), Some("anthropic"));
        assert_eq!(options.overrides.offer_optional_slots, Some(false));
        assert!(!options.require_file);
    }

    #[test]
    fn unknown_provider_is_rejected_at_parse_time() {
        let parsed = Cli::try_parse_from(["advisor", "--llm-provider", "gemini", "config"]);
        assert!(parsed.is_err());
    }
}
