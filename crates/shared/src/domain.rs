use serde::{Deserialize, Serialize};

/// Drawable area of the render surface, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const MIN_WIDTH: f64 = 400.0;
    pub const MIN_HEIGHT: f64 = 300.0;

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Derives the canvas size from its container: 90% of the container, never below 400x300.
    pub fn from_container(container_width: f64, container_height: f64) -> Self {
        Self {
            width: (container_width * 0.9).floor().max(Self::MIN_WIDTH),
            height: (container_height * 0.9).floor().max(Self::MIN_HEIGHT),
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in model-local space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}
