use std::time::Duration;

use reqwest::Client;
use shared::{
    domain::{Bounds, Viewport},
    model::ModelMetadata,
    protocol::{ControlCommand, MotionRequest},
    settings::{DefaultBackground, PreviewSettings, RenderQuality, SettingToggle},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    auto_fit::{compute_fit, Fit},
    error::{ControllerError, ErrorCategory},
    events::{model_display_name, PreviewEvent, ERROR_BANNER_DURATION},
    logging::LogGate,
    metadata::fetch_metadata,
    playback::{pick_random_group, resolve_motion, PlaybackSelection, ResolvedMotion},
    render_host::{Background, CapabilitySet, RenderHost, RenderModel, RenderOptions},
    settings_store::SettingsStore,
    transform::ViewTransform,
};

/// Delay before the second auto-fit pass after a load.
pub const AUTO_FIT_SETTLE_DELAY: Duration = Duration::from_millis(100);

pub struct LoadedModel<M> {
    pub locator: String,
    pub metadata: Option<ModelMetadata>,
    pub capabilities: CapabilitySet,
    handle: M,
}

impl<M: RenderModel> LoadedModel<M> {
    pub fn handle(&self) -> &M {
        &self.handle
    }
}

/// Canvas size request from the resolution picker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Follow the container.
    Auto,
    Fixed { width: u32, height: u32 },
}

impl std::str::FromStr for Resolution {
    type Err = ControllerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("auto") {
            return Ok(Resolution::Auto);
        }
        let parsed = raw
            .split_once(['x', 'X'])
            .and_then(|(w, h)| {
                Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?))
            })
            .filter(|(w, h)| *w > 0 && *h > 0);
        match parsed {
            Some((width, height)) => Ok(Resolution::Fixed { width, height }),
            None => Err(ControllerError::invalid("resolution", raw)),
        }
    }
}

/// What the caller has to schedule after a command ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub schedule_settle: bool,
}

/// Owns the render host, the loaded model and all view/playback state.
pub struct Controller<H: RenderHost> {
    host: H,
    settings: PreviewSettings,
    store: Option<Box<dyn SettingsStore>>,
    log_gate: Option<LogGate>,
    transform: ViewTransform,
    model: Option<LoadedModel<H::Model>>,
    selection: PlaybackSelection,
    last_fit_bounds: Option<Bounds>,
    http: Client,
    events: broadcast::Sender<PreviewEvent>,
}

impl<H: RenderHost> Controller<H> {
    /// Initializes the host once; failure here is fatal to startup.
    pub fn new(mut host: H, settings: PreviewSettings) -> Result<Self, ControllerError> {
        let (container_w, container_h) = host.container_size();
        let viewport = Viewport::from_container(container_w, container_h);
        let options = RenderOptions {
            antialias: settings.antialias,
            quality: settings.quality,
        };
        host.initialize(options, viewport).map_err(ControllerError::Startup)?;
        host.set_background(default_background(settings.default_bg));
        host.set_placeholder_visible(true);

        let (events, _) = broadcast::channel(256);
        info!(width = viewport.width, height = viewport.height, "previewer initialized");
        Ok(Self {
            host,
            settings,
            store: None,
            log_gate: None,
            transform: ViewTransform::default(),
            model: None,
            selection: PlaybackSelection::default(),
            last_fit_bounds: None,
            http: Client::new(),
            events,
        })
    }

    pub fn with_settings_store(mut self, store: Box<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_log_gate(mut self, gate: LogGate) -> Self {
        gate.set_debug(self.settings.debug);
        self.log_gate = Some(gate);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreviewEvent> {
        self.events.subscribe()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn settings(&self) -> &PreviewSettings {
        &self.settings
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn selection(&self) -> &PlaybackSelection {
        &self.selection
    }

    pub fn model(&self) -> Option<&LoadedModel<H::Model>> {
        self.model.as_ref()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.model
            .as_ref()
            .map(|m| m.capabilities.clone())
            .unwrap_or_default()
    }

    pub fn viewport(&self) -> Viewport {
        self.host.viewport()
    }

    fn emit(&self, event: PreviewEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_connection_status(&self, connected: bool, url: &str) {
        self.emit(PreviewEvent::ConnectionStatus {
            connected,
            url: url.to_string(),
        });
    }

    /// Pushes the current transform to the loaded model and paints one frame.
    pub fn apply_transform(&mut self) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        let render = self.transform.to_render(self.host.viewport());
        model.handle.set_scale(render.scale);
        model.handle.set_position(render.position);
        model.handle.set_rotation(render.rotation_rad);
        model.handle.set_alpha(render.alpha);
        self.host.render_now();
    }

    fn after_transform_change(
        &mut self,
        result: Result<(), ControllerError>,
    ) -> Result<(), ControllerError> {
        if let Err(err) = &result {
            debug!(%err, "ignoring transform input");
            return result;
        }
        self.apply_transform();
        result
    }

    pub fn set_offset(&mut self, dx: f64, dy: f64) -> Result<(), ControllerError> {
        let result = self.transform.set_offset(dx, dy);
        self.after_transform_change(result)
    }

    pub fn set_offset_x(&mut self, dx: f64) -> Result<(), ControllerError> {
        self.set_offset(dx, self.transform.offset_y)
    }

    pub fn set_offset_y(&mut self, dy: f64) -> Result<(), ControllerError> {
        self.set_offset(self.transform.offset_x, dy)
    }

    pub fn set_user_scale(&mut self, ratio_percent: f64) -> Result<(), ControllerError> {
        let result = self.transform.set_user_scale(ratio_percent);
        self.after_transform_change(result)
    }

    pub fn set_rotation(&mut self, degrees: f64) -> Result<(), ControllerError> {
        let result = self.transform.set_rotation(degrees);
        self.after_transform_change(result)
    }

    pub fn set_opacity(&mut self, percent: f64) -> Result<(), ControllerError> {
        let result = self.transform.set_opacity(percent);
        self.after_transform_change(result)
    }

    pub fn reset_transform(&mut self) {
        self.transform.reset();
        self.apply_transform();
        self.emit(PreviewEvent::TransformChanged(self.transform.display()));
    }

    pub fn auto_fit(&mut self) -> Result<Fit, ControllerError> {
        if !self.host.is_ready() {
            debug!("auto-fit skipped: render host not ready");
            return Err(ControllerError::HostNotReady);
        }
        let Some(model) = self.model.as_mut() else {
            debug!("auto-fit skipped: no model loaded");
            return Err(ControllerError::NoModelLoaded {
                operation: "auto-fit",
            });
        };

        let bounds = model.handle.local_bounds();
        let fit = compute_fit(self.host.viewport(), bounds);
        model.handle.set_pivot(fit.pivot);
        self.transform.fit(fit.base_scale);
        self.last_fit_bounds = Some(bounds);
        self.apply_transform();
        self.emit(PreviewEvent::TransformChanged(self.transform.display()));
        debug!(base_scale = fit.base_scale, "auto-fit completed");
        Ok(fit)
    }

    /// Second fit pass: refits only when the model's bounds moved since the last fit.
    pub fn settle_auto_fit(&mut self) -> Option<Fit> {
        if !self.settings.auto_fit {
            return None;
        }
        let bounds = self.model.as_ref()?.handle.local_bounds();
        if self.last_fit_bounds == Some(bounds) {
            debug!("auto-fit settle: bounds unchanged");
            return None;
        }
        self.auto_fit().ok()
    }

    /// Re-derives the viewport from the container, then refits or reapplies.
    pub fn handle_resize(&mut self) {
        let (container_w, container_h) = self.host.container_size();
        self.resize_to(Viewport::from_container(container_w, container_h));
    }

    fn resize_to(&mut self, viewport: Viewport) {
        self.host.resize(viewport);
        self.host.set_background(default_background(self.settings.default_bg));
        self.emit(PreviewEvent::ViewportChanged(viewport));
        if self.settings.auto_fit && self.model.is_some() {
            let _ = self.auto_fit();
        } else {
            self.apply_transform();
        }
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Auto => self.handle_resize(),
            Resolution::Fixed { width, height } => {
                self.resize_to(Viewport::new(f64::from(width), f64::from(height)))
            }
        }
        debug!(?resolution, "resolution set");
    }

    pub fn set_background(&mut self, background: Background) {
        self.host.set_background(background);
        self.host.render_now();
    }

    fn release_model(&mut self) {
        if let Some(old) = self.model.take() {
            debug!(locator = %old.locator, "releasing model");
            self.host.release(old.handle);
        }
        self.last_fit_bounds = None;
    }

    /// Loads and installs a model. The previous model is released first and is not restored
    /// if the new one fails to load.
    pub async fn load_model(
        &mut self,
        locator: &str,
        metadata: Option<ModelMetadata>,
    ) -> Result<CommandOutcome, ControllerError> {
        info!(%locator, "loading model");
        self.host.set_placeholder_visible(false);
        self.release_model();
        self.selection = PlaybackSelection::default();

        let mut handle = match self.host.load(locator).await {
            Ok(handle) => handle,
            Err(err) => {
                let err = ControllerError::Asset(err);
                warn!(%err, "model load failed");
                self.host.set_placeholder_visible(true);
                self.emit(PreviewEvent::ErrorBanner {
                    category: ErrorCategory::Asset,
                    message: err.to_string(),
                    dismiss_after: Some(ERROR_BANNER_DURATION),
                });
                return Err(err);
            }
        };

        // Engine-internal state is only valid after one frame; reveal after the barrier.
        self.host.next_frame().await;
        handle.set_visible(true);
        handle.set_alpha(1.0);

        let capabilities = handle.capabilities();
        let metadata = metadata.or_else(|| handle.take_metadata());
        self.model = Some(LoadedModel {
            locator: locator.to_string(),
            metadata,
            capabilities,
            handle,
        });

        let auto_fit = self.settings.auto_fit;
        if auto_fit {
            let _ = self.auto_fit();
        } else {
            self.apply_transform();
        }

        self.refresh_model_info().await;
        info!(%locator, "model loaded");
        Ok(CommandOutcome {
            schedule_settle: auto_fit,
        })
    }

    async fn refresh_model_info(&mut self) {
        let (locator, needs_metadata) = match self.model.as_ref() {
            Some(model) => (model.locator.clone(), model.metadata.is_none()),
            None => return,
        };
        if needs_metadata {
            match fetch_metadata(&self.http, &locator).await {
                Ok(metadata) => {
                    if let Some(model) = self.model.as_mut() {
                        model.metadata = Some(metadata);
                    }
                }
                Err(err) => debug!(%locator, error = %err, "model metadata unavailable"),
            }
        }

        let Some(model) = self.model.as_ref() else {
            return;
        };
        let from_metadata = model
            .metadata
            .as_ref()
            .map(ModelMetadata::expression_names)
            .unwrap_or_default();
        let expressions = if from_metadata.is_empty() {
            model.capabilities.expressions.clone().unwrap_or_default()
        } else {
            from_metadata
        };
        self.emit(PreviewEvent::ModelInfo {
            name: model_display_name(&locator),
            expressions,
            motion_groups: model.capabilities.motion_group_names(),
        });
    }

    pub fn clear_model(&mut self) {
        if self.model.is_none() {
            debug!("clear requested with no model loaded");
        }
        self.release_model();
        self.selection = PlaybackSelection::default();
        self.transform = ViewTransform::default();
        self.host.set_placeholder_visible(true);
        self.host.render_now();
        self.emit(PreviewEvent::ModelCleared);
        self.emit(PreviewEvent::TransformChanged(self.transform.display()));
    }

    pub fn set_expression(&mut self, name: &str) -> Result<(), ControllerError> {
        let Some(model) = self.model.as_mut() else {
            debug!(expression = name, "cannot set expression: no model loaded");
            return Err(ControllerError::NoModelLoaded {
                operation: "set expression",
            });
        };
        if model.capabilities.expressions.is_none() {
            debug!(expression = name, "cannot set expression: model has no expressions");
            return Err(ControllerError::NoExpressionSupport);
        }

        model.handle.set_expression(name)?;
        self.selection.expression = Some(name.to_string());
        self.emit(PreviewEvent::ExpressionChanged(Some(name.to_string())));
        debug!(expression = name, "expression set");
        Ok(())
    }

    pub fn play_motion(
        &mut self,
        request: &MotionRequest,
    ) -> Result<ResolvedMotion, ControllerError> {
        let Some(model) = self.model.as_mut() else {
            debug!(motion = request.group(), "cannot play motion: no model loaded");
            return Err(ControllerError::NoModelLoaded {
                operation: "play motion",
            });
        };

        let resolved = resolve_motion(request, &model.capabilities.motion_groups).map_err(|err| {
            debug!(motion = request.group(), %err, "motion not playable");
            err
        })?;
        if resolved.fell_back {
            debug!(
                requested = request.group(),
                resolved = %resolved.group,
                "motion group missing; using fallback"
            );
        }

        model.handle.start_motion(&resolved.group, resolved.index)?;
        self.selection.motion_group = Some(resolved.group.clone());
        self.selection.motion_index = resolved.index;
        self.emit(PreviewEvent::MotionChanged {
            group: resolved.group.clone(),
            index: resolved.index,
        });
        debug!(group = %resolved.group, index = ?resolved.index, "motion started");
        Ok(resolved)
    }

    /// Response to a pointer-down on the model.
    pub fn play_random_motion(&mut self) -> Option<ResolvedMotion> {
        self.play_random_motion_with(&mut rand::rng())
    }

    pub fn play_random_motion_with<R: rand::Rng>(
        &mut self,
        rng: &mut R,
    ) -> Option<ResolvedMotion> {
        let group = {
            let model = self.model.as_ref()?;
            pick_random_group(&model.capabilities.motion_groups, rng)?.name.clone()
        };
        self.play_motion(&MotionRequest::Group(group)).ok()
    }

    fn persist_settings(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&self.settings) {
                warn!(%err, "failed to save settings");
            }
        }
    }

    pub fn set_toggle(&mut self, toggle: SettingToggle, value: bool) {
        self.settings.set_toggle(toggle, value);
        if toggle == SettingToggle::Debug {
            if let Some(gate) = &self.log_gate {
                gate.set_debug(value);
            }
        }
        self.persist_settings();
    }

    pub fn set_quality(&mut self, quality: RenderQuality) {
        self.settings.quality = quality;
        self.persist_settings();
    }

    pub fn set_default_background(&mut self, default_bg: DefaultBackground) {
        self.settings.default_bg = default_bg;
        self.persist_settings();
        self.set_background(default_background(default_bg));
    }

    pub fn set_language(&mut self, language: &str) {
        self.settings.language = language.to_string();
        self.persist_settings();
    }

    /// Runs one decoded control command. Failures are logged and dropped.
    pub async fn dispatch(&mut self, command: ControlCommand) -> CommandOutcome {
        debug!(command = command.name(), "control command received");
        let result = match command {
            ControlCommand::LoadModel {
                model_url,
                model_path,
                model_data,
            } => match model_url.or(model_path).filter(|l| !l.trim().is_empty()) {
                Some(locator) => self.load_model(&locator, model_data).await,
                None => Err(ControllerError::MissingLocator),
            },
            ControlCommand::SetExpression { expression } => {
                self.set_expression(&expression).map(|_| CommandOutcome::default())
            }
            ControlCommand::PlayMotion { motion } => {
                self.play_motion(&motion).map(|_| CommandOutcome::default())
            }
            ControlCommand::ClearModel => {
                self.clear_model();
                Ok(CommandOutcome::default())
            }
            ControlCommand::UpdateCanvas => {
                self.handle_resize();
                Ok(CommandOutcome::default())
            }
            ControlCommand::Unknown => {
                debug!("ignoring unknown control command");
                Ok(CommandOutcome::default())
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(%err, category = ?err.category(), "control command dropped");
                CommandOutcome::default()
            }
        }
    }
}

pub fn default_background(default_bg: DefaultBackground) -> Background {
    match default_bg {
        DefaultBackground::Transparent => Background::Transparent,
        DefaultBackground::Custom => Background::Tinted,
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
