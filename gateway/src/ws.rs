use actix_web::{web, HttpRequest, HttpResponse};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

use actix_ws::Message as ClientMessage;

/// Accept the client upgrade and splice it to the same path on the frontend
/// origin (Vite HMR runs over this). Frames are relayed verbatim until
/// either side closes.
pub async fn bridge(
    req: HttpRequest,
    payload: web::Payload,
    frontend_url: &str,
) -> Result<HttpResponse, actix_web::Error> {
    let target = ws_target_url(frontend_url, req.path(), req.uri().query());
    let (response, session, msg_stream) = actix_ws::handle(&req, payload)?;

    actix_web::rt::spawn(async move {
        if let Err(e) = run_bridge(session, msg_stream, &target).await {
            log::debug!("websocket bridge to {} closed: {}", target, e);
        }
    });

    Ok(response)
}

/// Convert an http(s) origin plus request path/query into the ws(s) URL the
/// upstream connection dials.
pub(crate) fn ws_target_url(base: &str, path: &str, query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    let mut url = format!("{}{}", base, path);
    if let Some(qs) = query {
        url.push('?');
        url.push_str(qs);
    }
    url
}

async fn run_bridge(
    mut client: actix_ws::Session,
    mut client_rx: actix_ws::MessageStream,
    target: &str,
) -> anyhow::Result<()> {
    let (upstream, _) = connect_async(target).await?;
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    loop {
        tokio::select! {
            msg = client_rx.next() => match msg {
                Some(Ok(ClientMessage::Text(text))) => {
                    upstream_tx.send(UpstreamMessage::Text(text.to_string())).await?;
                }
                Some(Ok(ClientMessage::Binary(data))) => {
                    upstream_tx.send(UpstreamMessage::Binary(data.to_vec())).await?;
                }
                Some(Ok(ClientMessage::Ping(data))) => {
                    upstream_tx.send(UpstreamMessage::Ping(data.to_vec())).await?;
                }
                Some(Ok(ClientMessage::Pong(data))) => {
                    upstream_tx.send(UpstreamMessage::Pong(data.to_vec())).await?;
                }
                Some(Ok(ClientMessage::Close(_))) | Some(Err(_)) | None => {
                    let _ = upstream_tx.send(UpstreamMessage::Close(None)).await;
                    break;
                }
                Some(Ok(_)) => {}
            },
            msg = upstream_rx.next() => match msg {
                Some(Ok(UpstreamMessage::Text(text))) => client.text(text).await?,
                Some(Ok(UpstreamMessage::Binary(data))) => client.binary(data).await?,
                Some(Ok(UpstreamMessage::Ping(data))) => client.ping(&data).await?,
                Some(Ok(UpstreamMessage::Pong(data))) => client.pong(&data).await?,
                Some(Ok(UpstreamMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = client.close(None).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_origins_become_ws_urls() {
        assert_eq!(
            ws_target_url("http://localhost:5173", "/", None),
            "ws://localhost:5173/"
        );
        assert_eq!(
            ws_target_url("https://front.example/", "/hmr", Some("token=a")),
            "wss://front.example/hmr?token=a"
        );
    }
}
