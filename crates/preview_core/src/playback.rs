//! Maps requested motions onto the groups a model actually has.

use rand::Rng;
use shared::protocol::MotionRequest;

use crate::{error::ControllerError, render_host::MotionGroup};

/// Tried in order when the requested group does not exist.
pub const FALLBACK_GROUPS: [&str; 7] = ["idle", "Idle", "IDLE", "tap_body", "Tap", "TapBody", "tap"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMotion {
    pub group: String,
    pub index: Option<usize>,
    pub fell_back: bool,
}

/// Last successfully applied expression and motion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSelection {
    pub expression: Option<String>,
    pub motion_group: Option<String>,
    pub motion_index: Option<usize>,
}

pub fn resolve_motion(
    request: &MotionRequest,
    groups: &[MotionGroup],
) -> Result<ResolvedMotion, ControllerError> {
    let requested = request.group();
    let has = |name: &str| groups.iter().any(|g| g.name == name);

    let (group, fell_back) = if has(requested) {
        (requested.to_string(), false)
    } else if let Some(fallback) = FALLBACK_GROUPS.iter().find(|name| has(name)) {
        (fallback.to_string(), true)
    } else if let Some(first) = groups.first() {
        (first.name.clone(), true)
    } else {
        return Err(ControllerError::NoPlayableMotion);
    };

    Ok(ResolvedMotion {
        group,
        index: request.index(),
        fell_back,
    })
}

/// Uniform pick over `groups`.
pub fn pick_random_group<'a, R: Rng>(
    groups: &'a [MotionGroup],
    rng: &mut R,
) -> Option<&'a MotionGroup> {
    if groups.is_empty() {
        return None;
    }
    groups.get(rng.random_range(0..groups.len()))
}
