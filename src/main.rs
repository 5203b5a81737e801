use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use xiaoyuan_server::{
    AppState, config::Config, create_router, services::start_task_expiry_sweeper,
    sms::start_sms_sweeper,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configurazione prima del logger: il livello di default arriva da LOG_LEVEL
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    config.print_info();

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connect_options)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    info!("Database connection pool ready");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied");

    let state = Arc::new(AppState::from_config(pool, &config));

    // pulizia periodica dei codici SMS scaduti
    tokio::spawn(start_sms_sweeper(
        state.sms.clone(),
        config.sms_sweep_interval_secs,
    ));

    // scadenza dei task mai accettati con rimborso all'autore
    tokio::spawn(start_task_expiry_sweeper(
        state.clone(),
        config.task_expiry_interval_secs,
    ));

    let app = create_router(state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
