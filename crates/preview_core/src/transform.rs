//! Normalized view transform and its conversion into concrete render values.

use shared::domain::{Point, Viewport};

use crate::error::ControllerError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub offset_x: f64,
    pub offset_y: f64,
    /// User zoom ratio, 1.0 = 100%.
    pub user_scale: f64,
    pub rotation_deg: f64,
    /// Render alpha in `[0, 1]`.
    pub opacity: f64,
    /// Scale chosen by auto-fit.
    pub base_scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            user_scale: 1.0,
            rotation_deg: 0.0,
            opacity: 1.0,
            base_scale: 1.0,
        }
    }
}

/// Concrete values handed to the render host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTransform {
    pub scale: f64,
    pub position: Point,
    pub rotation_rad: f64,
    pub alpha: f64,
}

/// Slider positions shown by the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformDisplay {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_percent: f64,
    pub rotation_deg: f64,
    pub opacity_percent: f64,
}

fn finite(control: &'static str, value: f64) -> Result<f64, ControllerError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ControllerError::invalid(control, value))
    }
}

impl ViewTransform {
    pub fn effective_scale(&self) -> f64 {
        self.base_scale * self.user_scale
    }

    pub fn set_offset(&mut self, dx: f64, dy: f64) -> Result<(), ControllerError> {
        let dx = finite("offset x", dx)?;
        let dy = finite("offset y", dy)?;
        self.offset_x = dx;
        self.offset_y = dy;
        Ok(())
    }

    pub fn set_user_scale(&mut self, ratio_percent: f64) -> Result<(), ControllerError> {
        let percent = finite("scale", ratio_percent)?;
        if percent <= 0.0 {
            return Err(ControllerError::invalid("scale", percent));
        }
        self.user_scale = percent / 100.0;
        Ok(())
    }

    pub fn set_rotation(&mut self, degrees: f64) -> Result<(), ControllerError> {
        self.rotation_deg = finite("rotation", degrees)?;
        Ok(())
    }

    /// Percent outside `[0, 100]` is clamped into range.
    pub fn set_opacity(&mut self, percent: f64) -> Result<(), ControllerError> {
        let percent = finite("opacity", percent)?;
        self.opacity = (percent / 100.0).clamp(0.0, 1.0);
        Ok(())
    }

    /// Back to identity placement. Opacity and the fitted base scale are kept.
    pub fn reset(&mut self) {
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.user_scale = 1.0;
        self.rotation_deg = 0.0;
    }

    /// Installs a fitted base scale and re-centers.
    pub fn fit(&mut self, base_scale: f64) {
        self.base_scale = base_scale;
        self.reset();
    }

    pub fn to_render(&self, viewport: Viewport) -> RenderTransform {
        let center = viewport.center();
        RenderTransform {
            scale: self.effective_scale(),
            position: Point::new(center.x + self.offset_x, center.y + self.offset_y),
            rotation_rad: self.rotation_deg.to_radians(),
            alpha: self.opacity,
        }
    }

    pub fn display(&self) -> TransformDisplay {
        TransformDisplay {
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            scale_percent: self.user_scale * 100.0,
            rotation_deg: self.rotation_deg.rem_euclid(360.0),
            opacity_percent: self.opacity * 100.0,
        }
    }
}
