use chrono::Duration;
use clinic_manager::clinic_web_server::{get_connection_pool, run};
use clinic_manager::core::config::AppConfig;
use clinic_manager::core::jwt_auth::{generate_jwt_token, JwtClaims};
use clinic_manager::core::{get_subscriber, init_subscriber};
use clinic_manager::models::staff::StaffRole;
use once_cell::sync::Lazy;
use std::net::TcpListener;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub config: AppConfig,
    pub api_client: reqwest::Client,
}

impl TestApp {
    /// Bearer token signed with the app's secret.
    pub fn token_for(&self, role: StaffRole, clinic_id: Option<Uuid>) -> String {
        let claims = JwtClaims::new(
            Uuid::new_v4(),
            "staff@clinic.test",
            role,
            clinic_id,
            Duration::minutes(self.config.jwt_auth_config.token_expiration_time),
        );
        generate_jwt_token(&claims, &self.config.jwt_auth_config).expect("Failed to sign token")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }
}

/// Start the app on a random port. The pool is lazy, so only routes that
/// reject a request before touching Postgres can be exercised here.
pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let config = AppConfig::new().expect("Failed to read configuration");
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let pool = get_connection_pool(&config);
    let redis = config.redis.connect().expect("Failed to build redis client");
    let server = run(listener, pool, redis, config.clone()).expect("Failed to build server");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        config,
        api_client: reqwest::Client::new(),
    }
}
