use std::time::Duration;

use clap::Parser;

use codedrill::config::CliArgs;
use codedrill::database as db;
use codedrill::sandbox::ProcessSandbox;
use codedrill::web_server::build_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().expect("Failed to load configuration");

    let db_path = db::get_db_path();
    if cli.flush_data {
        db::remove_db(&db_path);
    }

    let db_pool = db::init_db(&db_path)
        .await
        .expect("Failed to initialize database");

    let sandbox = ProcessSandbox::build(Duration::from_millis(config.judge.time_limit_ms))
        .expect("Failed to initialize sandbox");

    let server = build_server(config, db_pool, sandbox).expect("Failed to build server");
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {res_server:?}");
        }
    }

    server_handle.stop(true).await;
    log::info!("Shutdown complete");

    Ok(())
}
