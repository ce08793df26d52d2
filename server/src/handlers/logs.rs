use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::PgPool;

use super::{clamp_limit, clamp_offset};

#[derive(Deserialize)]
pub struct LogListQuery {
    session_id: Option<String>,
    order: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn list_logs(pool: web::Data<PgPool>, query: web::Query<LogListQuery>) -> HttpResponse {
    let limit = clamp_limit(query.limit, 200, 1000);
    let offset = clamp_offset(query.offset);
    let descending = query
        .order
        .as_deref()
        .is_some_and(|o| o.eq_ignore_ascii_case("desc"));
    let session_id = query.session_id.as_deref().filter(|s| !s.is_empty());

    match db::list_chat_logs(pool.get_ref(), session_id, descending, limit, offset).await {
        Ok(logs) => HttpResponse::Ok().json(json!({ "ok": true, "logs": logs })),
        Err(e) => {
            log::error!("list logs failed: {}", e);
            HttpResponse::InternalServerError().json(json!({ "ok": false, "error": e.to_string() }))
        }
    }
}
