mod handlers;

use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;

use common::config::AppConfig;

#[derive(Parser, Clone)]
#[command(name = "chat-backend")]
pub struct Args {
    /// Port to listen on; falls back to the PORT environment variable.
    #[arg(long)]
    pub port: Option<u16>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args = Args::parse();
    let config = AppConfig::load();
    let port = args
        .port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(3001);

    let pool = db::init_pool(&config)?;
    if let Err(e) = db::ensure_schema(&pool).await {
        // Health endpoints must stay reachable even when the database is
        // down; chat log endpoints will report their own failures.
        log::error!("schema init failed: {}", e);
    }

    let client = reqwest::Client::builder().build()?;

    log::info!("backend listening on http://localhost:{}", port);

    let pool_data = web::Data::new(pool);
    let client_data = web::Data::new(client);
    let config_data = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::NormalizePath::trim())
            .app_data(pool_data.clone())
            .app_data(client_data.clone())
            .app_data(config_data.clone())
            .route("/api/health", web::get().to(handlers::health))
            .route("/api/db-health", web::get().to(handlers::db_health))
            .route(
                "/api/v1/chat/completions",
                web::post().to(handlers::chat_completions),
            )
            .route("/api/v1/chat/sessions", web::get().to(handlers::list_sessions))
            .route("/api/v1/chat/logs", web::get().to(handlers::list_logs))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
