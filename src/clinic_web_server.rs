use crate::core::config::{AppConfig, AppointmentConfig, JwtAuthConfig, QueueConfig};
use crate::core::{AppError, RedisHelper};
use crate::routes::clinic_routes;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::web::{JsonConfig, QueryConfig};
use actix_web::{dev::Server, web::Data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::core::clinic_context::CLINIC_HEADER;

pub struct ClinicWebServer {
    port: u16,
    server: Server,
}

pub fn get_connection_pool(configuration: &AppConfig) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(5))
        .max_connections(configuration.postgres.max_connections)
        .connect_lazy_with(configuration.postgres.connect())
}

impl ClinicWebServer {
    pub async fn build(configuration: AppConfig) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.server.host, configuration.server.port
        );

        let pool = get_connection_pool(&configuration);
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");

        let redis = configuration.redis.connect()?;

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let server = run(listener, pool, redis, configuration)?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(
    listener: TcpListener,
    pool: PgPool,
    redis_client: redis::Client,
    configuration: AppConfig,
) -> Result<Server, anyhow::Error> {
    let pool = Data::new(pool);
    let redis_client = Data::new(redis_client);
    let redis_helper = Data::new(RedisHelper::new(redis_client.clone()));
    let jwt_config: Data<JwtAuthConfig> = Data::new(configuration.jwt_auth_config);
    let queue_config: Data<QueueConfig> = Data::new(configuration.queue);
    let appointment_config: Data<AppointmentConfig> = Data::new(configuration.appointments);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
            ])
            .allowed_header(CLINIC_HEADER)
            .supports_credentials();

        // Malformed bodies and query strings use the standard error envelope.
        let json_config = JsonConfig::default()
            .error_handler(|err, _req| AppError::validation_error(err).into());
        let query_config = QueryConfig::default()
            .error_handler(|err, _req| AppError::validation_error(err).into());

        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            .configure(clinic_routes)
            .app_data(json_config)
            .app_data(query_config)
            .app_data(pool.clone())
            .app_data(redis_client.clone())
            .app_data(redis_helper.clone())
            .app_data(jwt_config.clone())
            .app_data(queue_config.clone())
            .app_data(appointment_config.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
