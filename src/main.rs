use std::time::Duration;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use anyhow::Result;
use config::Config;
use env_logger::Env;
use loader::RateSource;
use log::{debug, info, warn};
use store::RateStore;

mod config;
mod error;
mod exchange_rate;
mod loader;
mod query;
mod rate_table;
mod routes;
mod store;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let source = RateSource::new(config.source.clone(), config.fetch_timeout)?;
    let table = source.load().await?;

    let store = web::Data::new(RateStore::new(table));
    let source = web::Data::new(source);

    if let Some(every) = config.reload_interval {
        spawn_reloader(store.clone(), source.clone(), every);
    }

    info!("Listening on http://{}:{}", config.bind, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(store.clone())
            .app_data(source.clone())
            .configure(routes::configure)
    })
    .bind((config.bind.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}

fn spawn_reloader(store: web::Data<RateStore>, source: web::Data<RateSource>, every: Duration) {
    info!("Reloading rates every {}s", every.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; the table was just loaded.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.reload(&source).await {
                Ok(table) => debug!("Scheduled reload done, {} dates", table.len()),
                Err(e) => warn!("Scheduled reload skipped: {}", e),
            }
        }
    });
}
