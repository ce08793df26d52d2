pub mod chat;
pub(crate) mod debug_tap;
pub mod sanitize;
pub mod sse;
pub mod upstream;

pub use chat::chat_completions;
