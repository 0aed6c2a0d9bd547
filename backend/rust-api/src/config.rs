use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_METRICS_AUTH: &str = "admin:changeme";

#[derive(Debug, Clone, Deserialize)]
pub struct AiSettings {
    /// Delegate is disabled when no key is configured.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 10,
        }
    }
}

impl AiSettings {
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub ai: AiSettings,
    pub redis_uri: Option<String>,
    pub catalog_path: Option<String>,
    pub hints_per_session: u32,
    /// `user:password` guarding `/metrics`.
    pub metrics_auth: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            ai: AiSettings::default(),
            redis_uri: None,
            catalog_path: None,
            hints_per_session: 3,
            metrics_auth: DEFAULT_METRICS_AUTH.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, var: &str| -> Option<String> {
            settings
                .get_string(key)
                .or_else(|_| env::var(var))
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Config::default();

        let port = parse_or("PORT", lookup("server.port", "PORT"), defaults.port)?;

        let mut allowed_origins: Vec<String> = lookup("server.allowed_origins", "ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_origins);
        if let Some(frontend) = lookup("server.frontend_url", "FRONTEND_URL") {
            let frontend = frontend.trim_end_matches('/').to_string();
            if !allowed_origins.contains(&frontend) {
                allowed_origins.push(frontend);
            }
        }

        let ai_defaults = AiSettings::default();
        let ai = AiSettings {
            api_key: lookup("ai.api_key", "OPENAI_API_KEY"),
            base_url: lookup("ai.base_url", "OPENAI_BASE_URL").unwrap_or(ai_defaults.base_url),
            model: lookup("ai.model", "OPENAI_MODEL").unwrap_or(ai_defaults.model),
            timeout_secs: parse_or(
                "AI_TIMEOUT_SECS",
                lookup("ai.timeout_secs", "AI_TIMEOUT_SECS"),
                ai_defaults.timeout_secs,
            )?,
        };
        if !ai.enabled() {
            tracing::info!("OPENAI_API_KEY not set, AI features use local fallbacks");
        }

        let hints_per_session = parse_or(
            "HINTS_MAX_PER_SESSION",
            lookup("hints.max_per_session", "HINTS_MAX_PER_SESSION"),
            defaults.hints_per_session,
        )?;

        let metrics_auth = lookup("metrics.auth", "METRICS_AUTH").unwrap_or_else(|| {
            tracing::warn!("METRICS_AUTH not set, /metrics uses the default credentials");
            defaults.metrics_auth
        });

        Ok(Config {
            port,
            allowed_origins,
            ai,
            redis_uri: lookup("redis.uri", "REDIS_URI"),
            catalog_path: lookup("catalog.path", "CATALOG_PATH"),
            hints_per_session,
            metrics_auth,
        })
    }
}

fn parse_or<T: FromStr>(
    name: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, config::ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("{} has invalid value '{}'", name, value))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PORT",
        "ALLOWED_ORIGINS",
        "FRONTEND_URL",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "AI_TIMEOUT_SECS",
        "REDIS_URI",
        "HINTS_MAX_PER_SESSION",
        "METRICS_AUTH",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::load().unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        assert!(!config.ai.enabled());
        assert_eq!(config.ai.model, "gpt-3.5-turbo");
        assert_eq!(config.ai.timeout(), Duration::from_secs(10));
        assert_eq!(config.hints_per_session, 3);
        assert!(config.redis_uri.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("PORT", "9100");
        env::set_var("ALLOWED_ORIGINS", "https://a.example, https://*.preview.app/");
        env::set_var("FRONTEND_URL", "https://front.example");
        env::set_var("OPENAI_API_KEY", "sk-test");
        env::set_var("AI_TIMEOUT_SECS", "3");
        env::set_var("HINTS_MAX_PER_SESSION", "5");

        let config = Config::load().unwrap();
        clear_env();

        assert_eq!(config.port, 9100);
        assert_eq!(
            config.allowed_origins,
            vec![
                "https://a.example",
                "https://*.preview.app",
                "https://front.example"
            ]
        );
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.ai.timeout_secs, 3);
        assert_eq!(config.hints_per_session, 5);
    }

    #[test]
    #[serial]
    fn test_blank_api_key_disables_ai() {
        clear_env();
        env::set_var("OPENAI_API_KEY", "   ");
        let config = Config::load().unwrap();
        clear_env();
        assert!(!config.ai.enabled());
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_an_error() {
        clear_env();
        env::set_var("PORT", "not-a-port");
        let result = Config::load();
        clear_env();
        assert!(result.is_err());
    }
}
