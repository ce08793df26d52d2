use thiserror::Error;

/// Client-visible failures of a relay invocation. Persistence failures are
/// deliberately not represented here: they are logged and swallowed at the
/// call site and never change what the client sees.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Server-side misconfiguration, detected before any upstream call.
    #[error("{0}")]
    Config(String),

    /// Malformed or incomplete client input. No upstream call is made.
    #[error("{0}")]
    ClientInput(String),

    /// Non-success HTTP status from the completion provider.
    #[error("upstream error {status}")]
    UpstreamStatus { status: u16, detail: String },

    /// Network-level failure talking to the provider. Never retried.
    #[error("{0}")]
    UpstreamTransport(String),

    /// The client went away; distinguished from transport failures so it is
    /// logged as a non-alarming condition.
    #[error("client_disconnected")]
    ClientDisconnect,
}
