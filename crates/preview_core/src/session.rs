//! The previewer's event loop: one task that owns the controller and multiplexes the control
//! socket, timer deadlines and user input.

use std::{future::Future, time::Duration};

use futures::{future::BoxFuture, FutureExt, StreamExt};
use shared::{
    protocol::{ControlCommand, MotionRequest},
    settings::{DefaultBackground, RenderQuality, SettingToggle},
};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::{
    channel::{ChannelAction, ChannelConfig, ControlChannel},
    controller::{CommandOutcome, Controller, Resolution, AUTO_FIT_SETTLE_DELAY},
    error::{ChannelError, ControllerError},
    render_host::{Background, RenderHost},
    timers::{TimerKind, Timers},
};

/// Debounce for container resizes and view activation.
pub const RESIZE_DELAY: Duration = Duration::from_millis(100);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Connecting = BoxFuture<'static, Result<WsStream, tungstenite::Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderControl {
    PositionX,
    PositionY,
    Scale,
    Rotation,
    Opacity,
}

impl SliderControl {
    fn name(self) -> &'static str {
        match self {
            SliderControl::PositionX => "position x",
            SliderControl::PositionY => "position y",
            SliderControl::Scale => "scale",
            SliderControl::Rotation => "rotation",
            SliderControl::Opacity => "opacity",
        }
    }
}

/// Local UI events. They take the same path as remote commands.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    /// Raw slider text; parsed and validated by the controller.
    Slider { control: SliderControl, raw: String },
    ResetTransform,
    AutoFit,
    ClearModel,
    Reconnect,
    /// Pointer pressed on the model.
    PointerDown,
    SelectExpression(String),
    PlayMotion(MotionRequest),
    SetResolution(String),
    ContainerResized,
    /// The preview view became visible again.
    ViewActivated,
    Toggle { toggle: SettingToggle, value: bool },
    SetQuality(RenderQuality),
    SetDefaultBackground(DefaultBackground),
    SetLanguage(String),
    SetBackground(Background),
    /// A command entered locally rather than received over the socket.
    Command(ControlCommand),
    Shutdown,
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<UserInput>,
}

impl SessionHandle {
    /// Returns `false` once the session has stopped.
    pub async fn send(&self, input: UserInput) -> bool {
        self.tx.send(input).await.is_ok()
    }
}

pub struct Session<H: RenderHost> {
    controller: Controller<H>,
    channel: ControlChannel,
    timers: Timers,
    inputs: mpsc::Receiver<UserInput>,
    tx: mpsc::Sender<UserInput>,
    connecting: Option<Connecting>,
    socket: Option<WsStream>,
}

async fn poll_connect(connecting: &mut Option<Connecting>) -> Result<WsStream, tungstenite::Error> {
    match connecting {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(socket: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

fn sleep_until_deadline(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

fn parse_number(control: SliderControl, raw: &str) -> Result<f64, ControllerError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ControllerError::InvalidInput {
            control: control.name(),
            value: raw.to_string(),
        })
}

impl<H: RenderHost + 'static> Session<H> {
    /// Take a [`SessionHandle`] before calling [`Session::run`]: the session holds no sender of
    /// its own while running, so a session run without handles stops at once.
    pub fn new(controller: Controller<H>, mut config: ChannelConfig) -> Self {
        config.reconnect = controller.settings().ws_reconnect;
        let (tx, inputs) = mpsc::channel(64);
        Self {
            controller,
            channel: ControlChannel::new(config),
            timers: Timers::new(),
            inputs,
            tx,
            connecting: None,
            socket: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn controller(&self) -> &Controller<H> {
        &self.controller
    }

    /// Runs until [`UserInput::Shutdown`] or until every [`SessionHandle`] is dropped, then hands
    /// the controller back. With no handle taken beforehand it returns immediately.
    pub async fn run(mut self) -> Controller<H> {
        // Only handles keep the input queue open.
        let (closed_tx, _) = mpsc::channel(1);
        self.tx = closed_tx;

        self.channel.start(&mut self.timers);
        self.controller
            .set_connection_status(false, self.channel.url().as_str());

        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                result = poll_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_result(result);
                }
                frame = next_frame(&mut self.socket) => {
                    self.on_frame(frame).await;
                }
                _ = sleep_until_deadline(deadline) => {
                    self.on_timers();
                }
                input = self.inputs.recv() => {
                    let Some(input) = input else {
                        info!("input queue closed; stopping session");
                        break;
                    };
                    if input == UserInput::Shutdown {
                        info!("session shutdown requested");
                        break;
                    }
                    self.on_input(input).await;
                }
            }
        }

        self.connecting = None;
        if let Some(mut ws) = self.socket.take() {
            let _ = ws.close(None).await;
        }
        self.controller
    }

    fn connect(&mut self) {
        let url = self.channel.url().to_string();
        self.connecting = Some(
            async move { connect_async(url.as_str()).await.map(|(ws, _)| ws) }.boxed(),
        );
    }

    fn apply_channel_action(&mut self, action: ChannelAction) {
        match action {
            ChannelAction::None => {}
            ChannelAction::Connect => self.connect(),
            ChannelAction::Reconnect => {
                // Dropping the stream tears the socket down without waiting on the peer.
                self.socket = None;
                self.connecting = None;
                self.connect();
            }
        }
    }

    fn on_connect_result(&mut self, result: Result<WsStream, tungstenite::Error>) {
        match result {
            Ok(ws) => {
                self.socket = Some(ws);
                self.channel.on_open(&mut self.timers);
                self.controller
                    .set_connection_status(true, self.channel.url().as_str());
            }
            Err(err) => {
                let err = ChannelError::Connect(err);
                warn!(%err, category = ?err.category(), "control channel connect failed");
                self.disconnected();
            }
        }
    }

    fn disconnected(&mut self) {
        self.socket = None;
        self.channel.on_disconnect(&mut self.timers);
        self.controller
            .set_connection_status(false, self.channel.url().as_str());
    }

    async fn on_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Text(text))) => {
                if let Ok(Some(command)) = self.channel.decode(&text) {
                    self.run_command(command).await;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                info!(?frame, "control channel closed by peer");
                self.disconnected();
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                let err = ChannelError::Receive(err);
                warn!(%err, category = ?err.category(), "control channel error");
                self.disconnected();
            }
            None => {
                info!("control channel stream ended");
                self.disconnected();
            }
        }
    }

    /// Socket and local commands both land here.
    async fn run_command(&mut self, command: ControlCommand) {
        if command == ControlCommand::ClearModel {
            self.timers.cancel(TimerKind::AutoFitSettle);
        }
        let outcome = self.controller.dispatch(command).await;
        self.after_command(outcome);
    }

    fn after_command(&mut self, outcome: CommandOutcome) {
        if outcome.schedule_settle {
            // A reload within the window keeps the first deadline.
            self.timers
                .schedule(TimerKind::AutoFitSettle, AUTO_FIT_SETTLE_DELAY);
        }
    }

    fn on_timers(&mut self) {
        for kind in self.timers.take_due(Instant::now()) {
            debug!(?kind, "timer fired");
            match kind {
                TimerKind::Reconnect => {
                    let action = self.channel.on_timer();
                    self.apply_channel_action(action);
                }
                TimerKind::Resize => self.controller.handle_resize(),
                TimerKind::AutoFitSettle => {
                    self.controller.settle_auto_fit();
                }
            }
        }
    }

    async fn on_input(&mut self, input: UserInput) {
        let result = match input {
            UserInput::Slider { control, raw } => self.on_slider(control, &raw),
            UserInput::ResetTransform => {
                self.controller.reset_transform();
                Ok(())
            }
            UserInput::AutoFit => self.controller.auto_fit().map(|_| ()),
            UserInput::ClearModel => {
                self.run_command(ControlCommand::ClearModel).await;
                Ok(())
            }
            UserInput::Reconnect => {
                let action = self.channel.manual_reconnect(&mut self.timers);
                self.apply_channel_action(action);
                self.controller
                    .set_connection_status(false, self.channel.url().as_str());
                Ok(())
            }
            UserInput::PointerDown => {
                self.controller.play_random_motion();
                Ok(())
            }
            UserInput::SelectExpression(name) => self.controller.set_expression(&name),
            UserInput::PlayMotion(request) => self.controller.play_motion(&request).map(|_| ()),
            UserInput::SetResolution(raw) => raw
                .parse::<Resolution>()
                .map(|resolution| self.controller.set_resolution(resolution)),
            UserInput::ContainerResized | UserInput::ViewActivated => {
                self.timers.schedule(TimerKind::Resize, RESIZE_DELAY);
                Ok(())
            }
            UserInput::Toggle { toggle, value } => {
                self.controller.set_toggle(toggle, value);
                if toggle == SettingToggle::WsReconnect {
                    self.channel.set_reconnect_enabled(value);
                }
                Ok(())
            }
            UserInput::SetQuality(quality) => {
                self.controller.set_quality(quality);
                Ok(())
            }
            UserInput::SetDefaultBackground(default_bg) => {
                self.controller.set_default_background(default_bg);
                Ok(())
            }
            UserInput::SetLanguage(language) => {
                self.controller.set_language(&language);
                Ok(())
            }
            UserInput::SetBackground(background) => {
                self.controller.set_background(background);
                Ok(())
            }
            UserInput::Command(command) => {
                self.run_command(command).await;
                Ok(())
            }
            UserInput::Shutdown => Ok(()),
        };

        if let Err(err) = result {
            debug!(%err, category = ?err.category(), "user input dropped");
        }
    }

    fn on_slider(&mut self, control: SliderControl, raw: &str) -> Result<(), ControllerError> {
        let value = parse_number(control, raw)?;
        match control {
            SliderControl::PositionX => self.controller.set_offset_x(value),
            SliderControl::PositionY => self.controller.set_offset_y(value),
            SliderControl::Scale => self.controller.set_user_scale(value),
            SliderControl::Rotation => self.controller.set_rotation(value),
            SliderControl::Opacity => self.controller.set_opacity(value),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
