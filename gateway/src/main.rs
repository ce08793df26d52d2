mod forward;
mod ws;

use actix_web::http::header;
use actix_web::{web, App, HttpResponse, HttpServer};
use clap::Parser;

#[derive(Parser, Clone)]
#[command(name = "chat-gateway")]
pub struct Args {
    /// Port to listen on; falls back to the PORT environment variable.
    #[arg(long)]
    pub port: Option<u16>,

    /// Origin that /api/* requests are forwarded to.
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Origin that all other requests (and WebSocket upgrades) go to.
    #[arg(long)]
    pub frontend_url: Option<String>,
}

/// The two origins this gateway splits traffic between.
pub struct ProxyTargets {
    pub backend_url: String,
    pub frontend_url: String,
}

fn arg_or_env(arg: Option<String>, key: &str, default: &str) -> String {
    arg.or_else(|| std::env::var(key).ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

async fn chat_redirect() -> HttpResponse {
    HttpResponse::MovedPermanently()
        .insert_header((header::LOCATION, "/chat/index.html"))
        .finish()
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args = Args::parse();
    let port = args
        .port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(3000);
    let targets = ProxyTargets {
        backend_url: arg_or_env(args.backend_url, "BACKEND_URL", "http://localhost:3001"),
        frontend_url: arg_or_env(args.frontend_url, "FRONTEND_URL", "http://localhost:5173"),
    };

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    log::info!("gateway listening on http://localhost:{}", port);
    log::info!("forwarding /api/* to {}", targets.backend_url);
    log::info!("forwarding everything else to {}", targets.frontend_url);

    let targets_data = web::Data::new(targets);
    let client_data = web::Data::new(client);

    HttpServer::new(move || {
        App::new()
            .app_data(targets_data.clone())
            .app_data(client_data.clone())
            .route("/chat", web::get().to(chat_redirect))
            .route("/chat/", web::get().to(chat_redirect))
            .default_service(web::route().to(forward::forward))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
