use shared::domain::{Bounds, Point, Viewport};

pub const FIT_MARGIN: f64 = 50.0;
const MIN_AVAILABLE: f64 = 100.0;
const BREATHING_ROOM: f64 = 0.85;
pub const MIN_BASE_SCALE: f64 = 0.1;
pub const MAX_BASE_SCALE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub base_scale: f64,
    /// Model-local point that becomes the rotation/scale origin.
    pub pivot: Point,
}

/// Scale that fits `bounds` inside `viewport` minus a fixed margin, aspect preserved.
pub fn compute_fit(viewport: Viewport, bounds: Bounds) -> Fit {
    let avail_w = (viewport.width - FIT_MARGIN * 2.0).max(MIN_AVAILABLE);
    let avail_h = (viewport.height - FIT_MARGIN * 2.0).max(MIN_AVAILABLE);

    let raw = (avail_w / bounds.width.max(1.0)).min(avail_h / bounds.height.max(1.0));
    let base_scale = (raw * BREATHING_ROOM).clamp(MIN_BASE_SCALE, MAX_BASE_SCALE);

    Fit {
        base_scale,
        pivot: bounds.center(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_tall_model_into_landscape_viewport() {
        let fit = compute_fit(
            Viewport::new(800.0, 600.0),
            Bounds::new(0.0, 0.0, 200.0, 400.0),
        );
        assert!((fit.base_scale - 1.0625).abs() < 1e-12);
        assert_eq!(fit.pivot, Point::new(100.0, 200.0));
    }

    #[test]
    fn pivot_ignores_model_origin() {
        let fit = compute_fit(
            Viewport::new(800.0, 600.0),
            Bounds::new(-300.0, 40.0, 600.0, 1000.0),
        );
        assert_eq!(fit.pivot, Point::new(0.0, 540.0));
    }

    #[test]
    fn pathological_sizes_are_clamped() {
        let tiny = compute_fit(Viewport::new(800.0, 600.0), Bounds::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(tiny.base_scale, MAX_BASE_SCALE);

        let huge = compute_fit(
            Viewport::new(800.0, 600.0),
            Bounds::new(0.0, 0.0, 100_000.0, 100_000.0),
        );
        assert_eq!(huge.base_scale, MIN_BASE_SCALE);
    }

    #[test]
    fn small_viewport_keeps_minimum_available_area() {
        let fit = compute_fit(
            Viewport::new(120.0, 150.0),
            Bounds::new(0.0, 0.0, 100.0, 100.0),
        );
        assert!((fit.base_scale - 0.85).abs() < 1e-12);
    }
}
