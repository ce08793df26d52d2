use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::postgres::PgPool;

use common::config::AppConfig;

pub async fn chat_completions(
    req: HttpRequest,
    body: web::Bytes,
    pool: web::Data<PgPool>,
    client: web::Data<reqwest::Client>,
    config: web::Data<AppConfig>,
) -> HttpResponse {
    relay::chat_completions(req, body, pool, client, config).await
}
