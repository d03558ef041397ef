//! Contract between the controller and the graphics/animation engine.
//!
//! The controller never probes the engine for features: a host is handed to
//! [`crate::Controller::new`] once and everything it can do is expressed here.

use async_trait::async_trait;
use shared::{
    domain::{Bounds, Point, Viewport},
    model::ModelMetadata,
    settings::RenderQuality,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("render engine unavailable: {0}")]
    Unavailable(String),
    #[error("failed to load model {locator}: {reason}")]
    Load { locator: String, reason: String },
    #[error("render engine rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub antialias: bool,
    pub quality: RenderQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Transparent,
    /// Default tinted backdrop used when the `defaultBg` setting is `custom`.
    Tinted,
    Solid(u32),
}

impl Background {
    pub const TINT: u32 = 0x667eea;

    /// Parses a `#rrggbb` (or bare `rrggbb`) colour.
    pub fn parse_solid(raw: &str) -> Option<Self> {
        let hex = raw.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(Background::Solid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionGroup {
    pub name: String,
    pub clip_count: usize,
}

impl MotionGroup {
    pub fn new(name: impl Into<String>, clip_count: usize) -> Self {
        Self {
            name: name.into(),
            clip_count,
        }
    }
}

/// What a loaded model can play.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    /// `None` when the model has no expression support at all.
    pub expressions: Option<Vec<String>>,
    /// In the model's natural enumeration order.
    pub motion_groups: Vec<MotionGroup>,
}

impl CapabilitySet {
    pub fn motion_group_names(&self) -> Vec<String> {
        self.motion_groups.iter().map(|g| g.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.motion_groups.is_empty()
            && self.expressions.as_ref().map_or(true, |names| names.is_empty())
    }
}

/// A renderable model handed out by [`RenderHost::load`].
pub trait RenderModel: Send {
    fn local_bounds(&self) -> Bounds;
    fn set_pivot(&mut self, pivot: Point);
    fn set_scale(&mut self, scale: f64);
    fn set_position(&mut self, position: Point);
    fn set_rotation(&mut self, radians: f64);
    fn set_alpha(&mut self, alpha: f64);
    fn set_visible(&mut self, visible: bool);
    fn capabilities(&self) -> CapabilitySet;
    fn set_expression(&mut self, name: &str) -> Result<(), HostError>;
    /// Starts a clip of `group`; `None` lets the engine choose its default clip.
    fn start_motion(&mut self, group: &str, index: Option<usize>) -> Result<(), HostError>;
    /// Model JSON the host already parsed while loading, if any.
    fn take_metadata(&mut self) -> Option<ModelMetadata> {
        None
    }
}

#[async_trait]
pub trait RenderHost: Send {
    type Model: RenderModel + 'static;

    fn initialize(&mut self, options: RenderOptions, viewport: Viewport) -> Result<(), HostError>;
    fn is_ready(&self) -> bool;
    /// Current size of the element hosting the canvas.
    fn container_size(&self) -> (f64, f64);
    fn viewport(&self) -> Viewport;
    fn resize(&mut self, viewport: Viewport);
    fn set_background(&mut self, background: Background);
    fn set_placeholder_visible(&mut self, visible: bool);
    /// Paints one frame immediately.
    fn render_now(&mut self);

    async fn load(&mut self, locator: &str) -> Result<Self::Model, HostError>;
    /// Resolves after the next frame boundary.
    async fn next_frame(&mut self);
    fn release(&mut self, model: Self::Model);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!(Background::parse_solid("#ffffff"), Some(Background::Solid(0xffffff)));
        assert_eq!(Background::parse_solid("00ff7f"), Some(Background::Solid(0x00ff7f)));
        assert_eq!(Background::parse_solid("#fff"), None);
        assert_eq!(Background::parse_solid("#gg0000"), None);
    }
}
