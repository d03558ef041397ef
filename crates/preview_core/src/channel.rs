//! Connection state machine of the control socket.
//!
//! This type decides; [`crate::session::Session`] performs the IO. Keeping the two apart
//! lets the reconnect policy be exercised without a network.

use std::time::Duration;

use shared::protocol::{ControlCommand, CONTROL_PATH};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::ChannelError,
    timers::{TimerKind, Timers},
};

pub const STARTUP_DELAY: Duration = Duration::from_millis(1500);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting out the startup delay; no attempt made yet.
    Idle,
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: Url,
    pub startup_delay: Duration,
    pub reconnect_delay: Duration,
    pub reconnect: bool,
}

impl ChannelConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            startup_delay: STARTUP_DELAY,
            reconnect_delay: RECONNECT_DELAY,
            reconnect: true,
        }
    }

    pub fn for_page(page_url: &str) -> Result<Self, ChannelError> {
        Ok(Self::new(control_url(page_url)?))
    }
}

/// Control socket URL for a page origin: same host, `/ws/preview`, `wss` when the page is `https`.
pub fn control_url(page_url: &str) -> Result<Url, ChannelError> {
    let page = Url::parse(page_url)?;
    let scheme = match page.scheme() {
        "https" => "wss",
        "http" => "ws",
        _ => return Err(ChannelError::UnsupportedScheme(page_url.to_string())),
    };
    let host = page
        .host_str()
        .ok_or_else(|| ChannelError::UnsupportedScheme(page_url.to_string()))?;
    let authority = match page.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(Url::parse(&format!("{scheme}://{authority}{CONTROL_PATH}"))?)
}

/// What the IO side must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    None,
    /// Open a new socket now.
    Connect,
    /// Drop any live socket or in-flight connect, then open a new socket.
    Reconnect,
}

#[derive(Debug)]
pub struct ControlChannel {
    config: ChannelConfig,
    state: ConnectionState,
}

impl ControlChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn url(&self) -> &Url {
        &self.config.url
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.config.reconnect
    }

    pub fn set_reconnect_enabled(&mut self, enabled: bool) {
        self.config.reconnect = enabled;
    }

    /// Arms the startup delay. The first connect happens when the reconnect timer fires.
    pub fn start(&mut self, timers: &mut Timers) {
        self.state = ConnectionState::Idle;
        timers.schedule(TimerKind::Reconnect, self.config.startup_delay);
    }

    pub fn on_timer(&mut self) -> ChannelAction {
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => ChannelAction::None,
            ConnectionState::Idle | ConnectionState::Closed => {
                info!(url = %self.config.url, "connecting control channel");
                self.state = ConnectionState::Connecting;
                ChannelAction::Connect
            }
        }
    }

    pub fn on_open(&mut self, timers: &mut Timers) {
        timers.cancel(TimerKind::Reconnect);
        self.state = ConnectionState::Open;
        info!(url = %self.config.url, "control channel connected");
    }

    /// Connect failure, socket error or close. Returns whether a reconnect was scheduled.
    pub fn on_disconnect(&mut self, timers: &mut Timers) -> bool {
        self.state = ConnectionState::Closed;
        if !self.config.reconnect {
            info!("control channel closed; reconnect disabled");
            return false;
        }
        if timers.is_pending(TimerKind::Reconnect) {
            return false;
        }
        let scheduled = timers.schedule(TimerKind::Reconnect, self.config.reconnect_delay);
        if scheduled {
            debug!(delay = ?self.config.reconnect_delay, "control channel reconnect scheduled");
        }
        scheduled
    }

    /// User-requested reconnect: skips any pending backoff.
    pub fn manual_reconnect(&mut self, timers: &mut Timers) -> ChannelAction {
        timers.cancel(TimerKind::Reconnect);
        self.state = ConnectionState::Connecting;
        info!(url = %self.config.url, "manual reconnect");
        ChannelAction::Reconnect
    }

    /// Decodes one text frame. Malformed frames are errors; unknown command tags decode to
    /// `None` and are dropped.
    pub fn decode(&self, text: &str) -> Result<Option<ControlCommand>, ChannelError> {
        match serde_json::from_str::<ControlCommand>(text) {
            Ok(ControlCommand::Unknown) => {
                debug!("ignoring control message with unknown type");
                Ok(None)
            }
            Ok(command) => Ok(Some(command)),
            Err(err) => {
                warn!(%err, "dropping malformed control message");
                Err(ChannelError::Decode(err))
            }
        }
    }
}
