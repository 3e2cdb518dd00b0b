pub mod builder;

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat};
use strum::{Display, EnumIter, IntoStaticStr};
use tokio::sync::watch;

use crate::{
    accumulator::AccumulationPolicy,
    algorithms::RingProcessor,
    error::{FootprintError, Result},
    io::rings_from_geojson,
    markup::{validate_payload, SvgMaskRasterizer},
    session::{RunToken, SessionState},
    traits::{ContourTracer, ImagePreprocessor, RunObserver, SegmentationService, TileCapture},
    types::{BoundingBox, CapturedTile, Footprint, SegmentationRequest, SegmentationResponse},
};

pub use builder::OrchestratorBuilder;

/// Stage of the run currently in progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Capturing,
    RequestingSegmentation,
    DecodingMask,
    CleaningMask,
    Vectorizing,
    Georeferencing,
    Accumulating,
    Error,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Footprints were accepted; `total` is the accumulator size afterwards
    Completed { accepted: usize, total: usize },
    /// The run finished but no ring survived filtering
    NothingDetected,
    Failed(FootprintError),
    /// A newer run started before this one finished; results were discarded
    Superseded,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn error(&self) -> Option<&FootprintError> {
        match self {
            RunOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Everything a single run produced, kept for inspection and debug overlays
#[derive(Debug)]
pub struct RunContext {
    pub token: RunToken,
    pub region: BoundingBox,
    pub tile: Option<CapturedTile>,
    /// Rasterized mask before cleanup
    pub raw_mask: Option<GrayImage>,
    pub cleaned_mask: Option<GrayImage>,
    pub footprints: Vec<Footprint>,
}

impl RunContext {
    fn new(token: RunToken, region: BoundingBox) -> Self {
        Self {
            token,
            region,
            tile: None,
            raw_mask: None,
            cleaned_mask: None,
            footprints: Vec::new(),
        }
    }
}

/// Observer that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_state(&self, state: PipelineState) {
        tracing::debug!(%state, "pipeline state");
    }

    fn on_outcome(&self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Completed { accepted, total } => {
                tracing::info!(accepted, total, "footprints added");
            }
            RunOutcome::NothingDetected => tracing::info!("no buildings detected in this area"),
            RunOutcome::Failed(err) => {
                tracing::error!(stage = err.stage(), detail = err.detail(), "run failed: {err}");
            }
            RunOutcome::Superseded => tracing::warn!("run superseded by a newer one"),
        }
    }
}

/// Why a run stopped early
enum Interrupt {
    Stale,
    Failed(FootprintError),
}

impl From<FootprintError> for Interrupt {
    fn from(err: FootprintError) -> Self {
        Interrupt::Failed(err)
    }
}

/// Drives capture, segmentation, mask cleanup, vectorization,
/// georeferencing and accumulation for one drawn region at a time.
pub struct Orchestrator {
    capture: Arc<dyn TileCapture>,
    segmentation: Arc<dyn SegmentationService>,
    tracer: Arc<dyn ContourTracer>,
    observer: Arc<dyn RunObserver>,
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    rasterizer: SvgMaskRasterizer,
    ring_processor: RingProcessor,
    policy: AccumulationPolicy,
    state: watch::Sender<PipelineState>,
    /// Token of the latest run started through this orchestrator
    active_run: AtomicU64,
}

impl Orchestrator {
    /// Create a new orchestrator builder
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Watch state changes of this orchestrator
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Get information about the orchestrator configuration
    pub fn info(&self) -> String {
        let steps: Vec<&str> = self.preprocessors.iter().map(|p| p.name()).collect();
        format!(
            "Orchestrator: mask cleanup [{}], min area {} m², tolerance {}, {} policy",
            steps.join(" -> "),
            self.ring_processor.min_area_m2,
            self.ring_processor.simplify_tolerance,
            self.policy
        )
    }

    /// Run the whole pipeline for one region
    pub async fn run(&self, session: &SessionState, region: BoundingBox) -> RunOutcome {
        self.run_with_context(session, region).await.0
    }

    /// Run the pipeline and also return the intermediate products
    pub async fn run_with_context(
        &self,
        session: &SessionState,
        region: BoundingBox,
    ) -> (RunOutcome, RunContext) {
        let token = session.begin_run();
        self.active_run.store(token.value(), Ordering::SeqCst);
        let mut ctx = RunContext::new(token, region);
        tracing::info!(run = %token, ?region, "starting footprint run");

        let outcome = match self.execute(session, &mut ctx).await {
            Ok(outcome) => outcome,
            Err(Interrupt::Stale) => RunOutcome::Superseded,
            // A newer run owns the session; this failure is no longer news
            Err(Interrupt::Failed(err)) if !session.is_current(token) => {
                tracing::warn!(run = %token, "stale run failed: {err}");
                RunOutcome::Superseded
            }
            Err(Interrupt::Failed(err)) => {
                self.transition(token, PipelineState::Error);
                RunOutcome::Failed(err)
            }
        };

        self.observer.on_outcome(&outcome);
        self.transition(token, PipelineState::Idle);
        (outcome, ctx)
    }

    /// Publish a state change, unless a newer run of this orchestrator owns the state
    fn transition(&self, token: RunToken, state: PipelineState) {
        if self.active_run.load(Ordering::SeqCst) != token.value() {
            return;
        }
        self.state.send_replace(state);
        self.observer.on_state(state);
    }

    fn ensure_current(session: &SessionState, token: RunToken) -> std::result::Result<(), Interrupt> {
        if session.is_current(token) {
            Ok(())
        } else {
            tracing::warn!(run = %token, "stale run stopped");
            Err(Interrupt::Stale)
        }
    }

    async fn execute(
        &self,
        session: &SessionState,
        ctx: &mut RunContext,
    ) -> std::result::Result<RunOutcome, Interrupt> {
        let token = ctx.token;

        self.transition(token, PipelineState::Capturing);
        let tile = self.capture.capture(&ctx.region).await?;
        Self::ensure_current(session, token)?;
        let (width, height) = (tile.width(), tile.height());
        let bbox = tile.bbox;
        tracing::info!(width, height, "tile captured");

        self.transition(token, PipelineState::RequestingSegmentation);
        let request = SegmentationRequest {
            image_base64: STANDARD.encode(encode_png(&tile.image)?),
            width,
            height,
        };
        ctx.tile = Some(tile);
        let response = self.segmentation.segment(&request).await?;
        Self::ensure_current(session, token)?;
        let svg = mask_content(response)?;

        self.transition(token, PipelineState::DecodingMask);
        let validated = validate_payload(&svg, width, height)?;
        tokio::task::yield_now().await;
        Self::ensure_current(session, token)?;
        let raw = self.rasterizer.rasterize(&validated)?;
        if raw.dimensions() != (width, height) {
            return Err(FootprintError::Rasterization(format!(
                "mask rasterized to {}x{} instead of {width}x{height}",
                raw.width(),
                raw.height()
            ))
            .into());
        }
        self.observer.on_mask(&raw, &bbox);

        self.transition(token, PipelineState::CleaningMask);
        tokio::task::yield_now().await;
        Self::ensure_current(session, token)?;
        let mut cleaned = raw.clone();
        for preprocessor in &self.preprocessors {
            cleaned = preprocessor.preprocess(&cleaned)?;
            tracing::debug!(step = preprocessor.name(), "mask cleanup step applied");
        }
        ctx.raw_mask = Some(raw);

        self.transition(token, PipelineState::Vectorizing);
        let png = encode_png(&DynamicImage::ImageLuma8(cleaned.clone()))
            .map_err(|e| FootprintError::Vectorization(format!("cannot encode cleaned mask: {e}")))?;
        ctx.cleaned_mask = Some(cleaned);
        let traced = self
            .tracer
            .trace(&png)
            .await
            .map_err(|e| match e {
                FootprintError::Vectorization(_) => e,
                other => FootprintError::Vectorization(other.to_string()),
            })?;
        Self::ensure_current(session, token)?;
        let rings = rings_from_geojson(&traced)?;
        tracing::debug!(rings = rings.len(), "mask vectorized");

        self.transition(token, PipelineState::Georeferencing);
        tokio::task::yield_now().await;
        Self::ensure_current(session, token)?;
        let footprints = self
            .ring_processor
            .process_rings(&rings, width, height, &bbox, session.ids());

        self.transition(token, PipelineState::Accumulating);
        if footprints.is_empty() {
            return Ok(RunOutcome::NothingDetected);
        }

        let mut accumulator = session.accumulator().await;
        Self::ensure_current(session, token)?;
        if self.policy == AccumulationPolicy::Replace {
            accumulator.clear();
        }
        let accepted = accumulator.accept(footprints.clone());
        let total = accumulator.len();
        drop(accumulator);

        ctx.footprints = footprints;
        Ok(RunOutcome::Completed { accepted, total })
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| FootprintError::CaptureFailure(format!("cannot encode tile as PNG: {e}")))?;
    Ok(bytes)
}

/// Pull the SVG out of a service reply, turning reported errors into failures
fn mask_content(response: SegmentationResponse) -> Result<String> {
    if let Some(message) = response.error {
        return Err(FootprintError::SegmentationRequest {
            status: None,
            message,
            detail: response.details,
        });
    }
    match response.svg {
        Some(svg) if !svg.trim().is_empty() => Ok(svg),
        _ => Err(FootprintError::InvalidSegmentationPayload {
            reason: "response carries no mask content".to_string(),
            payload: serde_json::to_string(&response).unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;
    use strum::IntoEnumIterator;
    use tokio::sync::Notify;

    const BUILDING_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><rect x="10" y="10" width="30" height="30" fill="white"/></svg>"#;

    fn region() -> BoundingBox {
        // Roughly one metre per pixel over a 100 px tile
        BoundingBox::new(-49.360, -49.359, -25.564, -25.565).expect("bbox")
    }

    struct StaticCapture;

    #[async_trait]
    impl TileCapture for StaticCapture {
        async fn capture(&self, region: &BoundingBox) -> Result<CapturedTile> {
            Ok(CapturedTile {
                image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([90, 90, 90, 255]))),
                bbox: *region,
            })
        }
    }

    struct FailingCapture;

    #[async_trait]
    impl TileCapture for FailingCapture {
        async fn capture(&self, _region: &BoundingBox) -> Result<CapturedTile> {
            Err(FootprintError::CaptureFailure("map not ready".to_string()))
        }
    }

    struct FixedSegmentation(SegmentationResponse);

    #[async_trait]
    impl SegmentationService for FixedSegmentation {
        async fn segment(&self, request: &SegmentationRequest) -> Result<SegmentationResponse> {
            assert!(!request.image_base64.starts_with("data:"));
            Ok(self.0.clone())
        }
    }

    struct UnreachableSegmentation;

    #[async_trait]
    impl SegmentationService for UnreachableSegmentation {
        async fn segment(&self, _request: &SegmentationRequest) -> Result<SegmentationResponse> {
            Err(FootprintError::SegmentationRequest {
                status: Some(502),
                message: "server error (502)".to_string(),
                detail: Some("bad gateway".to_string()),
            })
        }
    }

    /// Blocks inside `segment` until released, then answers or fails
    struct GatedSegmentation {
        entered: Arc<Notify>,
        gate: Arc<Notify>,
        fail_with: Option<u16>,
    }

    #[async_trait]
    impl SegmentationService for GatedSegmentation {
        async fn segment(&self, _request: &SegmentationRequest) -> Result<SegmentationResponse> {
            self.entered.notify_one();
            self.gate.notified().await;
            match self.fail_with {
                Some(status) => Err(FootprintError::SegmentationRequest {
                    status: Some(status),
                    message: format!("server error ({status})"),
                    detail: None,
                }),
                None => Ok(SegmentationResponse::mask(BUILDING_SVG)),
            }
        }
    }

    struct GarbageTracer;

    #[async_trait]
    impl ContourTracer for GarbageTracer {
        async fn trace(&self, _encoded_png: &[u8]) -> Result<String> {
            Ok("tracer crashed".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        states: Mutex<Vec<PipelineState>>,
        masks: Mutex<Vec<(u32, u32)>>,
        outcomes: Mutex<Vec<String>>,
    }

    impl RunObserver for RecordingObserver {
        fn on_state(&self, state: PipelineState) {
            self.states.lock().unwrap().push(state);
        }

        fn on_outcome(&self, outcome: &RunOutcome) {
            self.outcomes.lock().unwrap().push(format!("{outcome:?}"));
        }

        fn on_mask(&self, mask: &GrayImage, _bbox: &BoundingBox) {
            self.masks.lock().unwrap().push(mask.dimensions());
        }
    }

    fn orchestrator(response: SegmentationResponse) -> Orchestrator {
        Orchestrator::builder()
            .capture(StaticCapture)
            .segmentation(FixedSegmentation(response))
            .build()
            .expect("orchestrator")
    }

    #[tokio::test]
    async fn test_run_accumulates_building() {
        let session = SessionState::new();
        let orchestrator = orchestrator(SegmentationResponse::mask(BUILDING_SVG));

        let (outcome, ctx) = orchestrator.run_with_context(&session, region()).await;
        assert!(matches!(outcome, RunOutcome::Completed { accepted: 1, total: 1 }), "{outcome:?}");
        assert_eq!(ctx.footprints.len(), 1);
        assert!(ctx.footprints[0].area_m2() > 5.0);
        assert_eq!(ctx.cleaned_mask.as_ref().map(|m| m.dimensions()), Some((100, 100)));
        assert_eq!(orchestrator.state(), PipelineState::Idle);
        assert_eq!(session.accumulator().await.all()[0].id(), "building_1");
    }

    #[tokio::test]
    async fn test_state_sequence_and_mask_callback() {
        let observer = Arc::new(RecordingObserver::default());
        let orchestrator = Orchestrator::builder()
            .capture(StaticCapture)
            .segmentation(FixedSegmentation(SegmentationResponse::mask(BUILDING_SVG)))
            .shared_observer(observer.clone())
            .build()
            .expect("orchestrator");

        let mut states = orchestrator.subscribe();
        orchestrator.run(&SessionState::new(), region()).await;

        let expected: Vec<PipelineState> = PipelineState::iter()
            .filter(|s| !matches!(s, PipelineState::Idle | PipelineState::Error))
            .chain([PipelineState::Idle])
            .collect();
        assert_eq!(*observer.states.lock().unwrap(), expected);
        assert_eq!(*observer.masks.lock().unwrap(), vec![(100, 100)]);
        assert!(states.has_changed().expect("sender alive"));
        assert_eq!(*states.borrow_and_update(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_empty_mask_detects_nothing() {
        let session = SessionState::new();
        let orchestrator = orchestrator(SegmentationResponse::mask(r#"<svg viewBox="0 0 100 100"></svg>"#));

        let outcome = orchestrator.run(&session, region()).await;
        assert!(matches!(outcome, RunOutcome::NothingDetected));
        assert!(session.accumulator().await.is_empty());
        assert_eq!(orchestrator.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_black_mask_leaves_earlier_footprints() {
        let session = SessionState::new();
        orchestrator(SegmentationResponse::mask(BUILDING_SVG))
            .run(&session, region())
            .await;

        let black = orchestrator(SegmentationResponse::mask(
            r#"<svg viewBox="0 0 100 100"><rect width="100" height="100" fill="black"/></svg>"#,
        ));
        let outcome = black.run(&session, region()).await;
        assert!(matches!(outcome, RunOutcome::NothingDetected), "{outcome:?}");
        assert_eq!(black.state(), PipelineState::Idle);

        let acc = session.accumulator().await;
        let ids: Vec<&str> = acc.all().iter().map(Footprint::id).collect();
        assert_eq!(ids, ["building_1"]);
    }

    #[tokio::test]
    async fn test_empty_run_keeps_footprints_under_either_policy() {
        for policy in [AccumulationPolicy::Append, AccumulationPolicy::Replace] {
            let session = SessionState::new();
            let build = |svg: &'static str| {
                Orchestrator::builder()
                    .capture(StaticCapture)
                    .segmentation(FixedSegmentation(SegmentationResponse::mask(svg)))
                    .accumulation(policy)
                    .build()
                    .expect("orchestrator")
            };

            build(BUILDING_SVG).run(&session, region()).await;
            let outcome = build(r#"<svg viewBox="0 0 100 100"></svg>"#)
                .run(&session, region())
                .await;
            assert!(matches!(outcome, RunOutcome::NothingDetected), "{policy:?}: {outcome:?}");

            let acc = session.accumulator().await;
            assert_eq!(acc.len(), 1, "{policy:?}");
            assert_eq!(acc.all()[0].id(), "building_1");
        }
    }

    #[tokio::test]
    async fn test_missing_mask_content_fails_without_touching_accumulator() {
        let session = SessionState::new();
        orchestrator(SegmentationResponse::mask(BUILDING_SVG))
            .run(&session, region())
            .await;

        let observer = Arc::new(RecordingObserver::default());
        let broken = Orchestrator::builder()
            .capture(StaticCapture)
            .segmentation(FixedSegmentation(SegmentationResponse::default()))
            .shared_observer(observer.clone())
            .build()
            .expect("orchestrator");

        let outcome = broken.run(&session, region()).await;
        assert!(matches!(
            outcome.error(),
            Some(FootprintError::InvalidSegmentationPayload { .. })
        ));
        assert_eq!(session.accumulator().await.len(), 1);
        assert_eq!(broken.state(), PipelineState::Idle);

        let states = observer.states.lock().unwrap().clone();
        assert_eq!(
            states,
            vec![
                PipelineState::Capturing,
                PipelineState::RequestingSegmentation,
                PipelineState::Error,
                PipelineState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_service_reported_error() {
        let mut response = SegmentationResponse::failure("model overloaded");
        response.details = Some("retry later".to_string());

        let outcome = orchestrator(response).run(&SessionState::new(), region()).await;
        match outcome.error() {
            Some(FootprintError::SegmentationRequest { message, detail, .. }) => {
                assert_eq!(message, "model overloaded");
                assert_eq!(detail.as_deref(), Some("retry later"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mismatched_mask_size_is_invalid_payload() {
        let orchestrator = orchestrator(SegmentationResponse::mask(r#"<svg viewBox="0 0 64 64"></svg>"#));
        let outcome = orchestrator.run(&SessionState::new(), region()).await;
        assert!(matches!(
            outcome.error(),
            Some(FootprintError::InvalidSegmentationPayload { .. })
        ));
    }

    #[tokio::test]
    async fn test_collaborator_failures() {
        let session = SessionState::new();

        let capture_failure = Orchestrator::builder()
            .capture(FailingCapture)
            .segmentation(FixedSegmentation(SegmentationResponse::mask(BUILDING_SVG)))
            .build()
            .expect("orchestrator");
        let outcome = capture_failure.run(&session, region()).await;
        assert_eq!(outcome.error().map(FootprintError::stage), Some("capture"));

        let service_failure = Orchestrator::builder()
            .capture(StaticCapture)
            .segmentation(UnreachableSegmentation)
            .build()
            .expect("orchestrator");
        let outcome = service_failure.run(&session, region()).await;
        assert!(matches!(
            outcome.error(),
            Some(FootprintError::SegmentationRequest { status: Some(502), .. })
        ));

        let tracer_failure = Orchestrator::builder()
            .capture(StaticCapture)
            .segmentation(FixedSegmentation(SegmentationResponse::mask(BUILDING_SVG)))
            .tracer(GarbageTracer)
            .build()
            .expect("orchestrator");
        let outcome = tracer_failure.run(&session, region()).await;
        assert!(matches!(outcome.error(), Some(FootprintError::Vectorization(_))));

        assert!(session.accumulator().await.is_empty());
        assert_eq!(tracer_failure.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_two_runs_append_in_order() {
        let session = SessionState::new();
        let orchestrator = orchestrator(SegmentationResponse::mask(BUILDING_SVG));

        orchestrator.run(&session, region()).await;
        let second = BoundingBox::new(-49.358, -49.357, -25.564, -25.565).expect("bbox");
        let outcome = orchestrator.run(&session, second).await;
        assert!(matches!(outcome, RunOutcome::Completed { accepted: 1, total: 2 }));

        let acc = session.accumulator().await;
        let ids: Vec<&str> = acc.all().iter().map(Footprint::id).collect();
        assert_eq!(ids, ["building_1", "building_2"]);
    }

    #[tokio::test]
    async fn test_replace_policy_keeps_latest_run_only() {
        let session = SessionState::new();
        let orchestrator = Orchestrator::builder()
            .capture(StaticCapture)
            .segmentation(FixedSegmentation(SegmentationResponse::mask(BUILDING_SVG)))
            .accumulation(AccumulationPolicy::Replace)
            .build()
            .expect("orchestrator");

        orchestrator.run(&session, region()).await;
        let outcome = orchestrator.run(&session, region()).await;
        assert!(matches!(outcome, RunOutcome::Completed { accepted: 1, total: 1 }));
        assert_eq!(session.accumulator().await.all()[0].id(), "building_2");
    }

    #[tokio::test]
    async fn test_newer_run_supersedes_older() {
        let session = SessionState::new();
        let entered = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());

        let slow = Orchestrator::builder()
            .capture(StaticCapture)
            .segmentation(GatedSegmentation {
                entered: entered.clone(),
                gate: gate.clone(),
                fail_with: None,
            })
            .build()
            .expect("orchestrator");
        let fast = orchestrator(SegmentationResponse::mask(BUILDING_SVG));

        let first = slow.run(&session, region());
        let second = async {
            entered.notified().await;
            let outcome = fast.run(&session, region()).await;
            gate.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, RunOutcome::Superseded));
        assert!(second.is_completed());
        assert_eq!(slow.state(), PipelineState::Idle);
        assert_eq!(fast.state(), PipelineState::Idle);
        let acc = session.accumulator().await;
        assert_eq!(acc.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_run_failure_is_superseded() {
        let session = SessionState::new();
        let entered = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let observer = Arc::new(RecordingObserver::default());

        let slow = Orchestrator::builder()
            .capture(StaticCapture)
            .segmentation(GatedSegmentation {
                entered: entered.clone(),
                gate: gate.clone(),
                fail_with: Some(504),
            })
            .shared_observer(observer.clone())
            .build()
            .expect("orchestrator");
        let fast = orchestrator(SegmentationResponse::mask(BUILDING_SVG));

        let first = slow.run(&session, region());
        let second = async {
            entered.notified().await;
            let outcome = fast.run(&session, region()).await;
            gate.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, RunOutcome::Superseded), "{first:?}");
        assert!(matches!(second, RunOutcome::Completed { accepted: 1, total: 1 }));
        assert!(!observer.states.lock().unwrap().contains(&PipelineState::Error));
        assert_eq!(*observer.outcomes.lock().unwrap(), vec!["Superseded".to_string()]);
        assert_eq!(slow.state(), PipelineState::Idle);
    }

    #[test]
    fn test_builder_requires_collaborators() {
        assert!(matches!(
            Orchestrator::builder().capture(StaticCapture).build(),
            Err(FootprintError::Config(_))
        ));
    }

    #[test]
    fn test_info_lists_cleanup_steps() {
        let info = orchestrator(SegmentationResponse::default()).info();
        assert!(info.contains("threshold -> closing"));
        assert!(info.contains("append"));
    }
}
