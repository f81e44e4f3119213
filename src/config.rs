//! Process-wide configuration, read once at startup.

use chrono::NaiveDate;

/// Admin credentials for the shift-management website.
#[derive(Debug, Clone)]
pub struct SiteCredentials {
    pub username: String,
    pub password: String,
    pub totp_secret: String,
}

/// Outgoing mail transport configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub app_password: String,
    pub collector_address: String,
    pub subject: String,
}

/// Process-wide configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_port: u16,
    pub site_base_url: String,
    pub site_credentials: SiteCredentials,
    pub mail: MailConfig,
    pub llm_endpoint: String,
    pub llm_api_key: Option<String>,
    pub large_model: String,
    pub small_model: String,
    pub audio_output_device: Option<String>,
    pub cookie_store_dir: String,
    pub today_override: Option<NaiveDate>,
}

impl Config {
    pub fn from_env() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());

        Self {
            bind_port: std::env::var("ASSISTANT_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            site_base_url: std::env::var("SHIFT_SITE_URL")
                .unwrap_or_else(|_| "https://shifts.example.com".to_string()),
            site_credentials: SiteCredentials {
                username: std::env::var("SITE_USERNAME").unwrap_or_default(),
                password: std::env::var("SITE_PASSWORD").unwrap_or_default(),
                totp_secret: std::env::var("SITE_TOTP_SECRET").unwrap_or_default(),
            },
            mail: MailConfig {
                host: std::env::var("MAIL_HOST").unwrap_or_default(),
                port: std::env::var("MAIL_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
                sender: std::env::var("MAIL_SENDER").unwrap_or_default(),
                app_password: std::env::var("MAIL_APP_PASSWORD").unwrap_or_default(),
                collector_address: std::env::var("MAIL_COLLECTOR").unwrap_or_default(),
                subject: std::env::var("MAIL_SUBJECT")
                    .unwrap_or_else(|_| "SHIFT CANCELLATION REQUEST".to_string()),
            },
            llm_endpoint: std::env::var("LLM_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:11434/v1/chat/completions".to_string()),
            llm_api_key: std::env::var("LLM_API_KEY").ok(),
            large_model: std::env::var("LLM_LARGE_MODEL")
                .unwrap_or_else(|_| "large".to_string()),
            small_model: std::env::var("LLM_SMALL_MODEL")
                .unwrap_or_else(|_| "small".to_string()),
            audio_output_device: std::env::var("AUDIO_OUTPUT_DEVICE").ok(),
            cookie_store_dir: std::env::var("COOKIE_STORE_DIR").unwrap_or_else(|_| {
                format!("{home}/.assistant/cookies")
            }),
            today_override: std::env::var("TODAY_OVERRIDE")
                .ok()
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        // SAFETY: single-threaded test, no concurrent env access.
        unsafe {
            std::env::remove_var("ASSISTANT_PORT");
            std::env::remove_var("TODAY_OVERRIDE");
        }
        let config = Config::from_env();
        assert_eq!(config.bind_port, 8000);
        assert!(config.today_override.is_none());
    }
}
