use std::time::Duration;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use futures::channel::mpsc::{self, UnboundedSender};
use serde_json::{json, Value};
use sqlx::postgres::PgPool;
use tokio_util::sync::CancellationToken;

use common::config::AppConfig;
use common::error::RelayError;

use crate::debug_tap;
use crate::sanitize::{joined_user_text, sanitize_messages};
use crate::sse::SseAccumulator;
use crate::upstream::{UpstreamRequest, UpstreamSession};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const ERROR_DETAIL_MAX_CHARS: usize = 4000;
const FALLBACK_REFERER: &str = "http://localhost:3000";

type FrameSender = UnboundedSender<Result<Bytes, actix_web::Error>>;

/// Validated inputs of one relay invocation. Built before the response is
/// committed, destroyed when the invocation completes.
#[derive(Debug)]
struct RelayRequest {
    api_key: String,
    model: String,
    session_id: String,
    debug: bool,
    referer: String,
    /// Messages exactly as the client sent them; logged, never forwarded.
    raw_messages: Vec<Value>,
    /// Sanitized messages actually sent upstream.
    messages: Vec<Value>,
    /// The client body verbatim, stored as request meta.
    body: Value,
    /// The client body with sanitized messages, resolved model and
    /// `stream: true`; other provider parameters pass through untouched.
    upstream_body: Value,
}

/// Streaming chat completion relay.
///
/// Validation failures are answered as plain JSON before the response is
/// committed; afterwards the client sees upstream SSE bytes verbatim,
/// optionally interleaved with `event: debug` frames and `: ping`
/// heartbeats, terminated by connection close.
pub async fn chat_completions(
    req: HttpRequest,
    body: web::Bytes,
    pool: web::Data<PgPool>,
    client: web::Data<reqwest::Client>,
    config: web::Data<AppConfig>,
) -> HttpResponse {
    let relay = match prepare(&req, &body, config.get_ref()) {
        Ok(relay) => relay,
        Err(e) => return error_response(&e),
    };

    let (tx, rx) = mpsc::unbounded::<Result<Bytes, actix_web::Error>>();
    let state = RelayState::new(tx);
    let pool = pool.into_inner();
    let client = client.into_inner();
    let config = config.into_inner();

    actix_web::rt::spawn(async move {
        run_relay(relay, state, &pool, &client, &config).await;
    });

    HttpResponse::Ok()
        .content_type("text/event-stream; charset=utf-8")
        .insert_header((header::CACHE_CONTROL, "no-cache, no-transform"))
        // Intermediaries like nginx must not buffer the event stream.
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(rx)
}

fn prepare(req: &HttpRequest, body: &[u8], config: &AppConfig) -> Result<RelayRequest, RelayError> {
    let api_key = config
        .upstream_api_key
        .clone()
        .ok_or_else(|| RelayError::Config("OPENROUTER_API_KEY not configured".to_string()))?;

    let parsed: Value = if body.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(body)
            .map_err(|e| RelayError::ClientInput(format!("invalid JSON body: {}", e)))?
    };
    let obj = parsed
        .as_object()
        .ok_or_else(|| RelayError::ClientInput("request body must be a JSON object".to_string()))?;

    let model = obj
        .get("model")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .or_else(|| config.default_model.clone())
        .ok_or_else(|| {
            RelayError::ClientInput("model missing and OPENROUTER_MODEL not set".to_string())
        })?;

    let session_id = obj
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .or_else(|| header_value(req, "x-session-id"))
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let debug = debug_flag(
        req.query_string(),
        header_value(req, "x-debug").as_deref(),
    );

    let referer = config
        .site_url
        .clone()
        .or_else(|| header_value(req, "origin"))
        .or_else(|| header_value(req, "referer"))
        .unwrap_or_else(|| FALLBACK_REFERER.to_string());

    let raw_messages = obj
        .get("messages")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let messages = sanitize_messages(&raw_messages);

    let mut upstream = obj.clone();
    upstream.insert("messages".to_string(), Value::Array(messages.clone()));
    upstream.insert("model".to_string(), Value::String(model.clone()));
    upstream.insert("stream".to_string(), Value::Bool(true));

    Ok(RelayRequest {
        api_key,
        model,
        session_id,
        debug,
        referer,
        raw_messages,
        messages,
        body: parsed,
        upstream_body: Value::Object(upstream),
    })
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty())
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// The debug tap is enabled by `?debug=` or the `X-Debug` header; the query
/// value wins when both are present.
fn debug_flag(query: &str, header: Option<&str>) -> bool {
    let value = query_param(query, "debug").or(header).unwrap_or("");
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn error_response(err: &RelayError) -> HttpResponse {
    let body = json!({ "error": err.to_string() });
    match err {
        RelayError::ClientInput(_) => HttpResponse::BadRequest().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// One `data:` frame carrying an error payload, written after headers are
/// already committed.
fn error_data_frame(error: &str, detail: Option<&str>) -> Bytes {
    let payload = match detail {
        Some(detail) => json!({ "error": error, "detail": detail }),
        None => json!({ "error": error }),
    };
    Bytes::from(format!("data: {}\n\n", payload))
}

/// Emit the client-visible frames for a failed invocation. Headers are
/// already out, so the failure becomes a single error data frame (preceded
/// by a debug frame when the tap is on).
fn fail_stream(state: &mut RelayState, request: &RelayRequest, err: &RelayError) {
    log::warn!("relay {}: {}", request.session_id, err);
    if let RelayError::UpstreamStatus { status, detail } = err {
        if request.debug {
            state.send(debug_tap::error_frame(*status, detail));
        }
        state.send(error_data_frame(&err.to_string(), Some(detail)));
    } else {
        state.send(error_data_frame(&err.to_string(), None));
    }
}

/// Per-invocation streaming state: the accumulation buffer, the cancellation
/// token shared with the upstream reader, and the exactly-once finalization
/// guard.
struct RelayState {
    tx: FrameSender,
    cancel: CancellationToken,
    acc: SseAccumulator,
    client_aborted: bool,
    finalized: bool,
    heartbeat: Option<actix_web::rt::task::JoinHandle<()>>,
}

impl RelayState {
    fn new(tx: FrameSender) -> Self {
        RelayState {
            tx,
            cancel: CancellationToken::new(),
            acc: SseAccumulator::new(),
            client_aborted: false,
            finalized: false,
            heartbeat: None,
        }
    }

    /// Start the keep-alive comment pinger. It stops when the invocation's
    /// token fires, and fires the token itself if the client is gone.
    fn start_heartbeat(&mut self) {
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        self.heartbeat = Some(actix_web::rt::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            // The first tick completes immediately and is not a ping.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.unbounded_send(Ok(Bytes::from_static(b": ping\n\n"))).is_err() {
                            cancel.cancel();
                            break;
                        }
                    }
                }
            }
        }));
    }

    /// Write one frame to the client. A send failure means the client went
    /// away; the token is cancelled so pending upstream reads unblock.
    fn send(&mut self, frame: Bytes) -> bool {
        if self.tx.unbounded_send(Ok(frame)).is_err() {
            self.client_aborted = true;
            self.cancel.cancel();
            return false;
        }
        true
    }

    /// Terminal actions, guarded so racing triggers run them once: cancel
    /// the token, stop the heartbeat before the stream closes, then close
    /// the client channel.
    async fn finish(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        self.cancel.cancel();
        if let Some(handle) = self.heartbeat.take() {
            let _ = handle.await;
        }
        self.tx.close_channel();
    }
}

/// How the streaming phase ended.
enum StreamOutcome {
    Completed,
    ClientAborted,
    Failed(RelayError),
}

async fn run_relay(
    request: RelayRequest,
    mut state: RelayState,
    pool: &PgPool,
    client: &reqwest::Client,
    config: &AppConfig,
) {
    log::info!(
        "relay {}: {} -> {}",
        request.session_id,
        request.model,
        config.upstream_url
    );

    state.start_heartbeat();

    if request.debug {
        state.send(debug_tap::request_frame(
            &config.upstream_url,
            &request.model,
            &request.messages,
            &request.referer,
            request.body.get("reasoning"),
        ));
    }

    persist_request(pool, &request).await;

    let session = UpstreamSession::open(
        client,
        UpstreamRequest {
            url: &config.upstream_url,
            api_key: &request.api_key,
            referer: &request.referer,
            title: &config.site_title,
            body: &request.upstream_body,
        },
        state.cancel.clone(),
    )
    .await;

    let mut session = match session {
        Ok(session) => session,
        Err(RelayError::ClientDisconnect) => {
            log::info!("relay {}: client disconnected before upstream", request.session_id);
            state.finish().await;
            return;
        }
        Err(e) => {
            fail_stream(&mut state, &request, &e);
            state.finish().await;
            return;
        }
    };

    if !session.is_success() {
        let err = RelayError::UpstreamStatus {
            status: session.status(),
            detail: session.error_detail(ERROR_DETAIL_MAX_CHARS).await,
        };
        fail_stream(&mut state, &request, &err);
        state.finish().await;
        return;
    }

    let status = session.status();
    let outcome = loop {
        match session.next_chunk().await {
            None => break StreamOutcome::Completed,
            Some(Ok(chunk)) => {
                // Accumulate first, then forward the chunk verbatim.
                state.acc.feed(&chunk);
                if !state.send(chunk) {
                    break StreamOutcome::ClientAborted;
                }
            }
            Some(Err(RelayError::ClientDisconnect)) => break StreamOutcome::ClientAborted,
            Some(Err(e)) => break StreamOutcome::Failed(e),
        }
    };

    match outcome {
        StreamOutcome::Completed => {
            if request.debug {
                state.send(debug_tap::summary_frame(status, state.acc.char_count()));
            }
            state.finish().await;
            // Persisted only after the client stream has closed.
            persist_response(pool, &request, status, state.acc.text()).await;
        }
        StreamOutcome::ClientAborted => {
            log::info!("relay {}: client disconnected mid-stream", request.session_id);
            state.finish().await;
            // A client-initiated abort never produces a response row.
        }
        StreamOutcome::Failed(e) => {
            fail_stream(&mut state, &request, &e);
            state.finish().await;
        }
    }
}

/// Best-effort request log; a storage failure must not affect the relay.
async fn persist_request(pool: &PgPool, request: &RelayRequest) {
    let content = joined_user_text(&request.raw_messages);
    let params = db::InsertLogParams {
        session_id: &request.session_id,
        direction: "request",
        role: None,
        content: content.as_deref(),
        model: Some(&request.model),
        meta: Some(&request.body),
    };
    if let Err(e) = db::insert_chat_log(pool, &params).await {
        log::warn!("relay {}: failed to persist request log: {}", request.session_id, e);
    }
}

/// Best-effort response log, written after the client connection is closed.
async fn persist_response(pool: &PgPool, request: &RelayRequest, status: u16, text: &str) {
    let meta = json!({ "status": status });
    let params = db::InsertLogParams {
        session_id: &request.session_id,
        direction: "response",
        role: Some("assistant"),
        content: if text.is_empty() { None } else { Some(text) },
        model: Some(&request.model),
        meta: Some(&meta),
    };
    if let Err(e) = db::insert_chat_log(pool, &params).await {
        log::warn!("relay {}: failed to persist response log: {}", request.session_id, e);
    }
}
