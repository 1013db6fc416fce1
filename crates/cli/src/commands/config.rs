use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use advisor_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env: &'static [&'static str],
    value: String,
    overridden: bool,
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = &options.overrides;

    let api_key = match &config.llm.api_key {
        Some(key) => redact_token(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    let fields = [
        Field {
            key: "database.url",
            env: &["ADVISOR_DATABASE_URL"],
            value: config.database.url.clone(),
            overridden: overrides.database_url.is_some(),
        },
        Field {
            key: "database.max_connections",
            env: &["ADVISOR_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
            overridden: false,
        },
        Field {
            key: "database.timeout_secs",
            env: &["ADVISOR_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
            overridden: false,
        },
        Field {
            key: "database.session_ttl_hours",
            env: &["ADVISOR_DATABASE_SESSION_TTL_HOURS"],
            value: config.database.session_ttl_hours.to_string(),
            overridden: false,
        },
        Field {
            key: "llm.provider",
            env: &["ADVISOR_LLM_PROVIDER"],
            value: config.llm.provider.as_str().to_string(),
            overridden: overrides.llm_provider.is_some(),
        },
        Field {
            key: "llm.model",
            env: &["ADVISOR_LLM_MODEL"],
            value: config.llm.model.clone(),
            overridden: overrides.llm_model.is_some(),
        },
        Field {
            key: "llm.base_url",
            env: &["ADVISOR_LLM_BASE_URL"],
            value: config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            overridden: false,
        },
        Field {
            key: "llm.api_key",
            env: &["ADVISOR_LLM_API_KEY"],
            value: api_key,
            overridden: false,
        },
        Field {
            key: "llm.timeout_secs",
            env: &["ADVISOR_LLM_TIMEOUT_SECS"],
            value: config.llm.timeout_secs.to_string(),
            overridden: false,
        },
        Field {
            key: "llm.max_retries",
            env: &["ADVISOR_LLM_MAX_RETRIES"],
            value: config.llm.max_retries.to_string(),
            overridden: false,
        },
        Field {
            key: "intake.offer_optional_slots",
            env: &["ADVISOR_INTAKE_OFFER_OPTIONAL_SLOTS"],
            value: config.intake.offer_optional_slots.to_string(),
            overridden: overrides.offer_optional_slots.is_some(),
        },
        Field {
            key: "logging.level",
            env: &["ADVISOR_LOGGING_LEVEL", "ADVISOR_LOG_LEVEL"],
            value: config.logging.level.clone(),
            overridden: overrides.log_level.is_some(),
        },
        Field {
            key: "logging.format",
            env: &["ADVISOR_LOGGING_FORMAT", "ADVISOR_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_lowercase(),
            overridden: false,
        },
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("advisor.toml"), PathBuf::from("config/advisor.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if field.overridden {
        return "flag".to_string();
    }

    if let Some(env_key) = field.env.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_the_key_prefix() {
        assert_eq!(redact_token("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_token("abcdef"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn dotted_paths_resolve_through_tables() {
        let doc = "[llm]\nmodel = \"gpt-4o\"\n".parse::<Value>().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.provider"));
        assert!(!contains_path(&doc, "database.url"));
    }
}
