use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::ConnectOptions;

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub jwt_auth_config: JwtAuthConfig,
    pub queue: QueueConfig,
    pub appointments: AppointmentConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, config::ConfigError> {
        let base_path = std::env::current_dir().map_err(|e| {
            config::ConfigError::Message(format!("Failed to find the current dir: {}", e))
        })?;
        let config_dir = base_path.join("configuration");

        let app_environment: Environment = std::env::var("CLINIC_APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .map_err(config::ConfigError::Message)?;

        let configurations = config::Config::builder()
            .add_source(config::File::from(config_dir.join("base")).required(true))
            .add_source(
                config::File::from(config_dir.join(app_environment.as_str())).required(true),
            )
            // e.g. `CLINIC__SERVER__PORT=5001` overrides `server.port`
            .add_source(
                config::Environment::with_prefix("CLINIC")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        configurations.try_deserialize()
    }
}

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_dir: String,
}

#[derive(Deserialize, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: String,
    pub password: Option<Secret<String>>,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{password}@{host}:{port}",
                password = password.expose_secret(),
                host = self.host,
                port = self.port
            ),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }

    /// Opening a client does not touch the network; connections are made lazily.
    pub fn connect(&self) -> Result<redis::Client, redis::RedisError> {
        redis::Client::open(self.url())
    }
}

#[derive(Deserialize, Clone)]
pub struct PostgresConfig {
    pub username: String,
    pub password: Secret<String>,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub require_ssl: bool,
    pub max_connections: u32,
}

impl PostgresConfig {
    pub fn connect(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        let options = PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
            .database(&self.database_name);

        options.log_statements(tracing::log::LevelFilter::Trace)
    }
}

#[derive(Deserialize, Clone)]
pub struct JwtAuthConfig {
    pub secret: Secret<String>,
    pub token_expiration_time: i64,
}

#[derive(Deserialize, Clone)]
pub struct QueueConfig {
    /// Fixed per-patient estimate used for wait times.
    pub minutes_per_patient: i64,
}

#[derive(Deserialize, Clone)]
pub struct AppointmentConfig {
    pub slot_minutes: i64,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Sandbox,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not supported environment. Use either `local`, `sandbox` or `production` ",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};

    #[test]
    fn environment_parsing_is_case_insensitive() {
        assert_ok!(Environment::try_from("Production".to_string()));
        assert_ok!(Environment::try_from("LOCAL".to_string()));
        assert_err!(Environment::try_from("staging".to_string()));
    }

    #[test]
    fn redis_url_omits_empty_credentials() {
        let redis = RedisConfig {
            host: "127.0.0.1".into(),
            port: "6379".into(),
            password: None,
        };
        assert_eq!(redis.url(), "redis://127.0.0.1:6379");

        let redis = RedisConfig {
            password: Some(Secret::new("pw".to_string())),
            ..redis
        };
        assert_eq!(redis.url(), "redis://:pw@127.0.0.1:6379");
    }
}
