use thiserror::Error;

use crate::render_host::HostError;

/// Coarse failure classes, each with its own recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Render engine missing at startup; fatal.
    Initialization,
    /// Control socket connect/receive failures; recovered by reconnecting.
    Transport,
    /// A single command could not be serviced; dropped.
    Command,
    /// Model fetch/decode failures; shown as a transient banner.
    Asset,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("render host failed to initialize: {0}")]
    Startup(#[source] HostError),
    #[error("no model loaded; cannot {operation}")]
    NoModelLoaded { operation: &'static str },
    #[error("model has no expression support")]
    NoExpressionSupport,
    #[error("no playable motion")]
    NoPlayableMotion,
    #[error("render host is not ready")]
    HostNotReady,
    #[error("invalid {control} value: {value:?}")]
    InvalidInput { control: &'static str, value: String },
    #[error("loadModel command has no modelUrl or modelPath")]
    MissingLocator,
    #[error("model load failed: {0}")]
    Asset(#[source] HostError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("settings store failed: {0}")]
    Settings(#[from] SettingsError),
}

impl ControllerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ControllerError::Startup(_) => ErrorCategory::Initialization,
            ControllerError::Asset(_) => ErrorCategory::Asset,
            _ => ErrorCategory::Command,
        }
    }

    pub(crate) fn invalid(control: &'static str, value: impl ToString) -> Self {
        ControllerError::InvalidInput {
            control,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("page url must start with http:// or https://: {0}")]
    UnsupportedScheme(String),
    #[error("invalid page url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("websocket connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("websocket receive failed: {0}")]
    Receive(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("malformed control message: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ChannelError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Transport
    }
}
