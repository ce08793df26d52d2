use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use common::error::RelayError;

/// Everything needed to issue one outbound streaming completion request.
pub struct UpstreamRequest<'a> {
    pub url: &'a str,
    pub api_key: &'a str,
    pub referer: &'a str,
    pub title: &'a str,
    pub body: &'a Value,
}

/// An open streaming response from the completion provider.
///
/// Every read races the invocation's cancellation token, so a client abort
/// unblocks a pending read promptly instead of waiting out a network
/// timeout. Dropping the session aborts the underlying request.
pub struct UpstreamSession {
    response: reqwest::Response,
    cancel: CancellationToken,
}

impl UpstreamSession {
    /// Send the POST and wait for response headers. A single attempt; any
    /// failure surfaces to the caller unretried.
    pub async fn open(
        client: &reqwest::Client,
        request: UpstreamRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<Self, RelayError> {
        let send = client
            .post(request.url)
            .bearer_auth(request.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header("HTTP-Referer", request.referer)
            .header("X-Title", request.title)
            .json(request.body)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(RelayError::ClientDisconnect),
            res = send => res.map_err(|e| RelayError::UpstreamTransport(e.to_string()))?,
        };

        Ok(UpstreamSession { response, cancel })
    }

    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    pub fn is_success(&self) -> bool {
        self.response.status().is_success()
    }

    /// Next body chunk, end of stream (`None`), or an error.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, RelayError>> {
        tokio::select! {
            _ = self.cancel.cancelled() => Some(Err(RelayError::ClientDisconnect)),
            chunk = self.response.chunk() => match chunk {
                Ok(Some(bytes)) => Some(Ok(bytes)),
                Ok(None) => None,
                Err(e) => Some(Err(RelayError::UpstreamTransport(e.to_string()))),
            },
        }
    }

    /// Read the non-streamed body of a failed request, truncated. A
    /// non-success status is not a transport failure: callers relay the
    /// status and this detail to the client.
    pub async fn error_detail(self, max_chars: usize) -> String {
        let text = self.response.text().await.unwrap_or_default();
        truncate_chars(&text, max_chars)
    }
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_bounds_long_input() {
        let long = "x".repeat(5000);
        assert_eq!(truncate_chars(&long, 4000).len(), 4000);
        assert_eq!(truncate_chars("short", 4000), "short");
    }

    #[test]
    fn truncate_chars_counts_characters_not_bytes() {
        let s = "éé";
        assert_eq!(truncate_chars(s, 1), "é");
    }
}
