//! Display-state updates published to whatever UI is attached to the controller.

use std::time::Duration;

use shared::domain::Viewport;

use crate::{error::ErrorCategory, transform::TransformDisplay};

/// How long a non-fatal error banner stays up.
pub const ERROR_BANNER_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewEvent {
    ConnectionStatus {
        connected: bool,
        url: String,
    },
    ModelInfo {
        name: String,
        expressions: Vec<String>,
        motion_groups: Vec<String>,
    },
    /// Model gone; the "no model" placeholder is back.
    ModelCleared,
    TransformChanged(TransformDisplay),
    ExpressionChanged(Option<String>),
    MotionChanged {
        group: String,
        index: Option<usize>,
    },
    ViewportChanged(Viewport),
    ErrorBanner {
        category: ErrorCategory,
        message: String,
        /// `None` for blocking banners that stay until the app is restarted.
        dismiss_after: Option<Duration>,
    },
}

/// Last path segment of a model locator, accepting either separator.
pub fn model_display_name(locator: &str) -> String {
    locator
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
