//! Process configuration loaded from the environment.

use std::env;
use std::sync::OnceLock;

use crate::error::{Result, TelegramError};

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Everything the binary needs to wire the services together.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. `None` runs on in-memory storage,
    /// which is only useful for local experiments.
    pub database_url: Option<String>,
    pub user_token: String,
    /// Public bot name, used by the landing redirect.
    pub user_bot_name: String,
    pub admin_token: String,
    pub notify_token: Option<String>,
    pub admin_chat_ids: Vec<i64>,
    pub notify_chat_ids: Vec<i64>,
    pub education_file_path: Option<String>,
    pub yml_feed_url: Option<String>,
    pub http_addr: String,
}

impl AppConfig {
    /// Load and cache the configuration. Validation happens once, on
    /// first call.
    pub fn load() -> Result<&'static AppConfig> {
        if let Some(config) = CONFIG.get() {
            return Ok(config);
        }
        let config = Self::from_env()?;
        Ok(CONFIG.get_or_init(|| config))
    }

    fn from_env() -> Result<Self> {
        let user_token = env::var("USER_TELEGRAM_TOKEN")
            .map_err(|_| TelegramError::MissingEnv("USER_TELEGRAM_TOKEN"))?;
        let admin_token = env::var("ADMIN_TELEGRAM_TOKEN")
            .map_err(|_| TelegramError::MissingEnv("ADMIN_TELEGRAM_TOKEN"))?;

        Ok(Self {
            database_url: env_opt("DATABASE_URL"),
            user_token,
            user_bot_name: env::var("USER_TELEGRAM_BOT_NAME").unwrap_or_default(),
            admin_token,
            notify_token: env_opt("NOTIFICATION_TELEGRAM_TOKEN"),
            admin_chat_ids: parse_chat_ids(
                "ADMIN_CHAT_IDS",
                &env::var("ADMIN_CHAT_IDS").unwrap_or_default(),
            )?,
            notify_chat_ids: parse_chat_ids(
                "NOTIFICATION_CHAT_IDS",
                &env::var("NOTIFICATION_CHAT_IDS").unwrap_or_default(),
            )?,
            education_file_path: env_opt("EDUCATION_FILE_PATH"),
            yml_feed_url: env_opt("YANDEX_YML_URL"),
            http_addr: env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Parse a comma-separated chat id list. A malformed entry fails the
/// whole startup rather than silently dropping an operator.
fn parse_chat_ids(key: &'static str, raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .map_err(|_| TelegramError::Config(format!("{key} contains bad id {part:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_id_list() {
        assert_eq!(
            parse_chat_ids("X", "1, 42 ,,-7").unwrap(),
            vec![1, 42, -7]
        );
        assert!(parse_chat_ids("X", "").unwrap().is_empty());
    }

    #[test]
    fn bad_id_is_a_config_error() {
        let err = parse_chat_ids("ADMIN_CHAT_IDS", "1,abc").unwrap_err();
        assert!(err.to_string().contains("ADMIN_CHAT_IDS"));
    }
}
