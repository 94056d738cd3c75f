#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing::{debug, info};
use vigil_service::config::Config;
use vigil_service::database::{LibsqlStore, open_pool};
use vigil_service::monitoring::MonitoringExecutor;
use vigil_service::notifier::LogNotifier;
use vigil_service::{Core, CoreOptions};

mod error;
mod response;
mod routes;

use error::AppError;
use logger::init_tracing;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    debug!("{config}");

    let pool = open_pool(&config.database.path, config.database.max_connections).await?;
    let store = Arc::new(LibsqlStore::new_from_pool(pool));
    let checker = Arc::new(MonitoringExecutor::new(&config.monitoring.user_agent)?);

    let options = CoreOptions {
        name: config.core.name.clone(),
        timezone: config.core.timezone_offset(),
        use_cdn: config.core.use_cdn,
        notifier_timeout: config.monitoring.notifier_timeout(),
    };
    let core = web::Data::new(Core::new(options, store, checker));
    core.attach_notifier(Arc::new(LogNotifier));
    core.load().await?;
    info!(version = core.version(), "Started {} at {}", core.name(), core.current_time());

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let served = run_server(addr, core.clone()).await;

    core.shutdown().await;
    served
}

async fn run_server(addr: SocketAddr, core: web::Data<Core>) -> Result<(), AppError> {
    info!(%addr, "Listening");
    HttpServer::new(move || App::new().app_data(core.clone()).configure(routes::configure))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
