use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::PgPool;

use super::{clamp_limit, clamp_offset};

#[derive(Deserialize)]
pub struct SessionListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn list_sessions(
    pool: web::Data<PgPool>,
    query: web::Query<SessionListQuery>,
) -> HttpResponse {
    let limit = clamp_limit(query.limit, 50, 500);
    let offset = clamp_offset(query.offset);

    let sessions = match db::list_session_summaries(pool.get_ref(), limit, offset).await {
        Ok(sessions) => sessions,
        Err(e) => {
            log::error!("list sessions failed: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "ok": false, "error": e.to_string() }));
        }
    };

    let total = match db::count_sessions(pool.get_ref()).await {
        Ok(total) => total,
        Err(e) => {
            log::error!("count sessions failed: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "ok": false, "error": e.to_string() }));
        }
    };

    HttpResponse::Ok().json(json!({ "ok": true, "total": total, "sessions": sessions }))
}
