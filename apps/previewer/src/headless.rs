//! Render host without a graphics device. It keeps the scene state a real renderer would
//! draw and logs each frame, which is enough to drive and observe the controller.

use std::time::Duration;

use async_trait::async_trait;
use preview_core::{
    metadata::fetch_metadata, Background, CapabilitySet, HostError, MotionGroup, RenderHost,
    RenderModel, RenderOptions,
};
use reqwest::Client;
use shared::{
    domain::{Bounds, Point, Viewport},
    model::ModelMetadata,
};
use tracing::{debug, info};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Model size used when neither `--model-bounds` nor the model's `Layout` gives one.
const DEFAULT_MODEL_SIZE: f64 = 1000.0;

pub struct HeadlessModel {
    locator: String,
    bounds: Bounds,
    capabilities: CapabilitySet,
    metadata: Option<ModelMetadata>,
    pivot: Point,
    scale: f64,
    position: Point,
    rotation: f64,
    alpha: f64,
    visible: bool,
}

impl HeadlessModel {
    fn from_metadata(locator: &str, metadata: ModelMetadata, bounds: Option<Bounds>) -> Self {
        let expressions = metadata.expression_names();
        let capabilities = CapabilitySet {
            expressions: (!expressions.is_empty()).then_some(expressions),
            motion_groups: metadata
                .motion_groups()
                .into_iter()
                .map(|group| MotionGroup::new(group.name, group.clip_count))
                .collect(),
        };
        let bounds = bounds.unwrap_or_else(|| {
            let layout = metadata.layout.unwrap_or_default();
            Bounds::new(
                0.0,
                0.0,
                layout.width.unwrap_or(DEFAULT_MODEL_SIZE),
                layout.height.unwrap_or(DEFAULT_MODEL_SIZE),
            )
        });
        Self {
            locator: locator.to_string(),
            bounds,
            capabilities,
            metadata: Some(metadata),
            pivot: Point::default(),
            scale: 1.0,
            position: Point::default(),
            rotation: 0.0,
            alpha: 0.0,
            visible: false,
        }
    }
}

impl RenderModel for HeadlessModel {
    fn local_bounds(&self) -> Bounds {
        self.bounds
    }

    fn set_pivot(&mut self, pivot: Point) {
        self.pivot = pivot;
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    fn set_rotation(&mut self, radians: f64) {
        self.rotation = radians;
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    fn set_expression(&mut self, name: &str) -> Result<(), HostError> {
        let known = self
            .capabilities
            .expressions
            .as_ref()
            .is_some_and(|names| names.iter().any(|n| n == name));
        if !known {
            return Err(HostError::Rejected(format!("unknown expression {name}")));
        }
        info!(model = %self.locator, expression = name, "expression applied");
        Ok(())
    }

    fn start_motion(&mut self, group: &str, index: Option<usize>) -> Result<(), HostError> {
        let clips = self
            .capabilities
            .motion_groups
            .iter()
            .find(|g| g.name == group)
            .map(|g| g.clip_count)
            .ok_or_else(|| HostError::Rejected(format!("unknown motion group {group}")))?;
        if let Some(index) = index.filter(|i| *i >= clips) {
            return Err(HostError::Rejected(format!(
                "motion {group} has {clips} clips; index {index} out of range"
            )));
        }
        info!(model = %self.locator, group, ?index, "motion started");
        Ok(())
    }

    fn take_metadata(&mut self) -> Option<ModelMetadata> {
        self.metadata.take()
    }
}

pub struct HeadlessRenderHost {
    http: Client,
    container: (f64, f64),
    bounds_override: Option<Bounds>,
    viewport: Viewport,
    ready: bool,
    background: Background,
    placeholder: bool,
    frame: u64,
}

impl HeadlessRenderHost {
    pub fn new(container: (f64, f64), bounds_override: Option<Bounds>) -> Self {
        Self {
            http: Client::new(),
            container,
            bounds_override,
            viewport: Viewport::from_container(container.0, container.1),
            ready: false,
            background: Background::Transparent,
            placeholder: false,
            frame: 0,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn placeholder_visible(&self) -> bool {
        self.placeholder
    }
}

#[async_trait]
impl RenderHost for HeadlessRenderHost {
    type Model = HeadlessModel;

    fn initialize(&mut self, options: RenderOptions, viewport: Viewport) -> Result<(), HostError> {
        let (w, h) = self.container;
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(HostError::Unavailable(format!(
                "container has no drawable area ({w}x{h})"
            )));
        }
        self.viewport = viewport;
        self.ready = true;
        info!(
            width = viewport.width,
            height = viewport.height,
            antialias = options.antialias,
            quality = ?options.quality,
            "headless renderer ready"
        );
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn container_size(&self) -> (f64, f64) {
        self.container
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn set_background(&mut self, background: Background) {
        self.background = background;
    }

    fn set_placeholder_visible(&mut self, visible: bool) {
        self.placeholder = visible;
    }

    fn render_now(&mut self) {
        self.frame += 1;
        debug!(
            frame = self.frame,
            width = self.viewport.width,
            height = self.viewport.height,
            background = ?self.background,
            placeholder = self.placeholder,
            "frame"
        );
    }

    async fn load(&mut self, locator: &str) -> Result<HeadlessModel, HostError> {
        let metadata = fetch_metadata(&self.http, locator)
            .await
            .map_err(|err| HostError::Load {
                locator: locator.to_string(),
                reason: format!("{err:#}"),
            })?;
        Ok(HeadlessModel::from_metadata(
            locator,
            metadata,
            self.bounds_override,
        ))
    }

    async fn next_frame(&mut self) {
        tokio::time::sleep(FRAME_INTERVAL).await;
        self.frame += 1;
    }

    fn release(&mut self, model: HeadlessModel) {
        debug!(
            model = %model.locator,
            pivot_x = model.pivot.x,
            pivot_y = model.pivot.y,
            scale = model.scale,
            x = model.position.x,
            y = model.position.y,
            rotation = model.rotation,
            alpha = model.alpha,
            visible = model.visible,
            "model released"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use shared::settings::RenderQuality;

    use super::*;

    fn model_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(json.as_bytes()).expect("write");
        file
    }

    fn ready_host(bounds: Option<Bounds>) -> HeadlessRenderHost {
        let mut host = HeadlessRenderHost::new((1000.0, 800.0), bounds);
        let viewport = host.viewport();
        host.initialize(
            RenderOptions {
                antialias: true,
                quality: RenderQuality::High,
            },
            viewport,
        )
        .expect("init");
        host
    }

    #[test]
    fn zero_sized_container_fails_initialization() {
        let mut host = HeadlessRenderHost::new((0.0, 0.0), None);
        let err = host
            .initialize(
                RenderOptions {
                    antialias: true,
                    quality: RenderQuality::Low,
                },
                Viewport::new(400.0, 300.0),
            )
            .expect_err("must fail");
        assert!(matches!(err, HostError::Unavailable(_)));
        assert!(!host.is_ready());
    }

    #[tokio::test]
    async fn capabilities_come_from_model_json() {
        let file = model_file(
            r#"{
                "Version": 3,
                "FileReferences": {
                    "Expressions": [{ "Name": "f01" }, { "Name": "f02" }],
                    "Motions": { "Idle": [{}, {}], "TapBody": [{}] }
                },
                "Layout": { "Width": 300, "Height": 600 }
            }"#,
        );
        let mut host = ready_host(None);
        let mut model = host
            .load(&file.path().to_string_lossy())
            .await
            .expect("load");

        let caps = model.capabilities();
        assert_eq!(caps.expressions, Some(vec!["f01".into(), "f02".into()]));
        assert_eq!(
            caps.motion_groups,
            vec![MotionGroup::new("Idle", 2), MotionGroup::new("TapBody", 1)]
        );
        assert_eq!(model.local_bounds(), Bounds::new(0.0, 0.0, 300.0, 600.0));

        assert!(model.start_motion("Idle", Some(1)).is_ok());
        assert!(model.start_motion("Idle", Some(2)).is_err());
        assert!(model.start_motion("Wave", None).is_err());
        assert!(model.set_expression("f02").is_ok());
        assert!(model.set_expression("f09").is_err());

        let metadata = model.take_metadata().expect("parsed metadata handed over");
        assert_eq!(metadata.expression_names(), vec!["f01", "f02"]);
        assert!(model.take_metadata().is_none());
    }

    #[tokio::test]
    async fn bounds_override_wins_and_no_expressions_means_unsupported() {
        let file = model_file(r#"{ "FileReferences": { "Motions": { "Idle": [{}] } } }"#);
        let bounds = Bounds::new(-10.0, -20.0, 200.0, 400.0);
        let mut host = ready_host(Some(bounds));
        let model = host
            .load(&file.path().to_string_lossy())
            .await
            .expect("load");
        assert_eq!(model.local_bounds(), bounds);
        assert_eq!(model.capabilities().expressions, None);
    }

    #[tokio::test]
    async fn frames_advance_on_render_and_barrier() {
        let mut host = ready_host(None);
        host.set_placeholder_visible(true);
        host.render_now();
        host.next_frame().await;
        assert_eq!(host.frame(), 2);
        assert!(host.placeholder_visible());
    }

    #[tokio::test]
    async fn missing_model_is_a_load_error() {
        let mut host = ready_host(None);
        let err = host
            .load("/definitely/not/here.model3.json")
            .await
            .err()
            .expect("must fail");
        assert!(matches!(err, HostError::Load { .. }));
    }
}
