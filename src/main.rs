// src/main.rs
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;

use gswatch::config::Config;
use gswatch::context::AppContext;
use gswatch::handlers;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::from_env();

    env_logger::init_from_env(Env::default().default_filter_or(config.log_level.as_str()));

    let bind = config.bind();
    info!(
        "Tracking servers that switch to {} (scanner at {}, realtime {})",
        config.unavailable_map,
        config.scanner_ws_url,
        if config.use_realtime { "on" } else { "off" }
    );

    let context = AppContext::new(config);
    context.start();

    let data = web::Data::from(context);

    info!("Starting server on {}", bind);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(handlers::routes)
    })
    .bind(&bind)?
    .run()
    .await
}
