use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable chat log row. Exactly one `request` entry is written per
/// relay invocation and at most one `response` entry; neither is ever
/// updated or deleted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatLogEntry {
    pub id: i64,
    pub session_id: Option<String>,
    pub direction: String,
    pub role: Option<String>,
    pub content: Option<String>,
    pub model: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated view of one chat session, derived from its log entries.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionSummary {
    pub session_id: String,
    pub count: i64,
    pub first_activity: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
