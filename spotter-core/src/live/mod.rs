//! Remote conversational endpoint: wire protocol, prompt and connection.

mod client;
pub mod prompt;
pub mod protocol;

pub use client::{LiveClient, MockRemote, RemoteSession};
pub use protocol::{ClientMessage, ServerEvent, SessionSetup, ToolCall};
