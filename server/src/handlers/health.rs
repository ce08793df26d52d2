use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::postgres::PgPool;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "backend-api",
    }))
}

pub async fn db_health(pool: web::Data<PgPool>) -> HttpResponse {
    match db::db_now(pool.get_ref()).await {
        Ok(now) => HttpResponse::Ok().json(json!({ "ok": true, "now": now })),
        Err(e) => {
            log::error!("db health check failed: {}", e);
            HttpResponse::InternalServerError().json(json!({ "ok": false, "error": e.to_string() }))
        }
    }
}
