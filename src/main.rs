use std::fmt::{Debug, Display};

use clinic_manager::clinic_web_server::{get_connection_pool, ClinicWebServer};
use clinic_manager::core::{get_subscriber, init_subscriber, AppConfig};
use clinic_manager::jobs::subscription_expiry::start_subscription_expiry_checker;
use tokio::task::JoinError;

use colored::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::new()?;

    let file_appender = tracing_appender::rolling::daily(&config.server.log_dir, "app");
    let subscriber = get_subscriber("clinic_manager".into(), "info".into(), file_appender);
    init_subscriber(subscriber);

    let clinic_web_server = ClinicWebServer::build(config.clone()).await?;
    let port = clinic_web_server.port();

    let server_task = tokio::spawn(clinic_web_server.run_until_stopped());
    let expiry_task = start_subscription_expiry_checker(get_connection_pool(&config));

    println!("{}", "-----------------------------------------".green());
    println!(
        "{}",
        format!("Server started on Addr: {}:{}", config.server.host, port).green()
    );
    println!("{}", "-----------------------------------------".green());

    tokio::select! {
        o = server_task => report_exit("API server", o),
        o = expiry_task => report_exit("Subscription expiry job", o.map(Ok::<(), String>)),
    }
    Ok(())
}

fn report_exit(task_name: &str, outcome: Result<Result<(), impl Debug + Display>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{} has exited", task_name)
        }
        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed",
                task_name
            )
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{}' task failed to complete",
                task_name
            )
        }
    }
}
