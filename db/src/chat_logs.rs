use sqlx::postgres::PgPool;

use common::models::{ChatLogEntry, SessionSummary};

pub struct InsertLogParams<'a> {
    pub session_id: &'a str,
    pub direction: &'a str,
    pub role: Option<&'a str>,
    pub content: Option<&'a str>,
    pub model: Option<&'a str>,
    pub meta: Option<&'a serde_json::Value>,
}

pub async fn insert_chat_log(pool: &PgPool, params: &InsertLogParams<'_>) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO chat_logs (session_id, direction, role, content, model, meta) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(params.session_id)
    .bind(params.direction)
    .bind(params.role)
    .bind(params.content)
    .bind(params.model)
    .bind(params.meta)
    .execute(pool)
    .await?;
    Ok(())
}

/// Sessions aggregated from their log rows, most recently active first.
/// Rows with a null or empty session id are excluded.
pub async fn list_session_summaries(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<SessionSummary>> {
    Ok(sqlx::query_as::<_, SessionSummary>(
        "SELECT session_id, COUNT(*) AS count, \
         MIN(created_at) AS first_activity, MAX(created_at) AS last_activity \
         FROM chat_logs \
         WHERE session_id IS NOT NULL AND session_id <> '' \
         GROUP BY session_id \
         ORDER BY last_activity DESC \
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}

pub async fn count_sessions(pool: &PgPool) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(DISTINCT session_id) FROM chat_logs \
         WHERE session_id IS NOT NULL AND session_id <> ''",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

/// Log entries ordered by creation time with the entry id as a stable
/// tie-break, optionally filtered to one session.
pub async fn list_chat_logs(
    pool: &PgPool,
    session_id: Option<&str>,
    descending: bool,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<ChatLogEntry>> {
    let order = if descending { "DESC" } else { "ASC" };
    let logs = if let Some(session_id) = session_id {
        sqlx::query_as::<_, ChatLogEntry>(&format!(
            "SELECT id, session_id, direction, role, content, model, meta, created_at \
             FROM chat_logs WHERE session_id = $1 \
             ORDER BY created_at {order}, id {order} LIMIT $2 OFFSET $3",
        ))
        .bind(session_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, ChatLogEntry>(&format!(
            "SELECT id, session_id, direction, role, content, model, meta, created_at \
             FROM chat_logs \
             ORDER BY created_at {order}, id {order} LIMIT $1 OFFSET $2",
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?
    };
    Ok(logs)
}
