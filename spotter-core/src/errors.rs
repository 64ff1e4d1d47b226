use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum SpotterError {
    /// Microphone or speaker missing, busy or denied. Fatal to session start.
    #[error("audio device unavailable: {0}")]
    DeviceAccess(String),

    #[error("remote session error: {0}")]
    RemoteSession(String),

    #[error("malformed audio payload: {len} bytes is not a multiple of {width}")]
    MalformedAudio { len: usize, width: usize },

    #[error("tool call `{name}` rejected: {reason}")]
    ToolCall { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SpotterError {
    pub fn remote<D: std::fmt::Display>(d: D) -> Self {
        SpotterError::RemoteSession(d.to_string())
    }

    pub fn device<D: std::fmt::Display>(d: D) -> Self {
        SpotterError::DeviceAccess(d.to_string())
    }
}

impl From<anyhow::Error> for SpotterError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<SpotterError>() {
            Ok(inner) => inner,
            Err(other) => SpotterError::RemoteSession(format!("{:#}", other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpotterError>;
