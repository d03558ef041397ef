//! Transform and playback controller for the model previewer.
//!
//! [`Controller`] owns the render host and all view state; [`Session`] drives it from the
//! control socket, timers and local input on a single task.

pub mod auto_fit;
pub mod channel;
pub mod controller;
pub mod error;
pub mod events;
pub mod logging;
pub mod metadata;
pub mod playback;
pub mod render_host;
pub mod session;
pub mod settings_store;
pub mod timers;
pub mod transform;

pub use channel::{control_url, ChannelConfig, ConnectionState, ControlChannel};
pub use controller::{CommandOutcome, Controller, LoadedModel, Resolution};
pub use error::{ChannelError, ControllerError, ErrorCategory, SettingsError};
pub use events::PreviewEvent;
pub use logging::LogGate;
pub use render_host::{
    Background, CapabilitySet, HostError, MotionGroup, RenderHost, RenderModel, RenderOptions,
};
pub use session::{Session, SessionHandle, SliderControl, UserInput};
pub use settings_store::{JsonFileStore, SettingsStore};
pub use transform::ViewTransform;

#[cfg(test)]
#[path = "tests/fake_host.rs"]
mod fake_host;
