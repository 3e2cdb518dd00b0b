use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    accumulator::AccumulationPolicy,
    algorithms::{ClosingPreprocessor, ImageprocTracer, RingProcessor, ThresholdPreprocessor},
    config::PipelineConfig,
    error::{FootprintError, Result},
    markup::SvgMaskRasterizer,
    pipeline::{Orchestrator, PipelineState, TracingObserver},
    traits::{ContourTracer, ImagePreprocessor, RunObserver, SegmentationService, TileCapture},
};

/// Builder for creating orchestrators with a fluent API
pub struct OrchestratorBuilder {
    capture: Option<Arc<dyn TileCapture>>,
    segmentation: Option<Arc<dyn SegmentationService>>,
    tracer: Option<Arc<dyn ContourTracer>>,
    observer: Option<Arc<dyn RunObserver>>,
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    rasterizer: SvgMaskRasterizer,
    ring_processor: RingProcessor,
    policy: AccumulationPolicy,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder
    pub fn new() -> Self {
        Self {
            capture: None,
            segmentation: None,
            tracer: None,
            observer: None,
            preprocessors: Vec::new(),
            rasterizer: SvgMaskRasterizer::default(),
            ring_processor: RingProcessor::default(),
            policy: AccumulationPolicy::default(),
        }
    }

    /// Apply mask, geometry and accumulation settings from a config
    pub fn with_config(self, config: &PipelineConfig) -> Self {
        self.with_threshold(config.mask.threshold)
            .with_closing(config.mask.kernel_size)
            .ring_processor(config.geometry.ring_processor())
            .accumulation(config.accumulation)
    }

    pub fn capture<C>(mut self, capture: C) -> Self
    where
        C: TileCapture + 'static,
    {
        self.capture = Some(Arc::new(capture));
        self
    }

    pub fn segmentation<S>(mut self, service: S) -> Self
    where
        S: SegmentationService + 'static,
    {
        self.segmentation = Some(Arc::new(service));
        self
    }

    /// Set the contour tracer (replaces any existing one)
    pub fn tracer<T>(mut self, tracer: T) -> Self
    where
        T: ContourTracer + 'static,
    {
        self.tracer = Some(Arc::new(tracer));
        self
    }

    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: RunObserver + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Share an observer the caller keeps a handle to
    pub fn shared_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Add a mask preprocessor; they run in insertion order
    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: ImagePreprocessor + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    pub fn with_threshold(self, threshold: u8) -> Self {
        self.add_preprocessor(ThresholdPreprocessor { threshold })
    }

    /// Add morphological closing as a mask cleanup step
    pub fn with_closing(self, kernel_size: u32) -> Self {
        self.add_preprocessor(ClosingPreprocessor { kernel_size })
    }

    pub fn rasterizer(mut self, rasterizer: SvgMaskRasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn ring_processor(mut self, processor: RingProcessor) -> Self {
        self.ring_processor = processor;
        self
    }

    pub fn accumulation(mut self, policy: AccumulationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the orchestrator with default components where not specified.
    ///
    /// Capture and segmentation have no defaults. Without preprocessors the
    /// mask is thresholded at 128 and closed with a 5 pixel window.
    pub fn build(self) -> Result<Orchestrator> {
        let capture = self
            .capture
            .ok_or_else(|| FootprintError::Config("no tile capture configured".to_string()))?;
        let segmentation = self
            .segmentation
            .ok_or_else(|| FootprintError::Config("no segmentation service configured".to_string()))?;
        let tracer = self.tracer.unwrap_or_else(|| Arc::new(ImageprocTracer::default()));
        let observer = self.observer.unwrap_or_else(|| Arc::new(TracingObserver));

        let preprocessors = if self.preprocessors.is_empty() {
            vec![
                Box::new(ThresholdPreprocessor::default()) as Box<dyn ImagePreprocessor>,
                Box::new(ClosingPreprocessor::default()),
            ]
        } else {
            self.preprocessors
        };

        let (state, _) = watch::channel(PipelineState::Idle);

        Ok(Orchestrator {
            capture,
            segmentation,
            tracer,
            observer,
            preprocessors,
            rasterizer: self.rasterizer,
            ring_processor: self.ring_processor,
            policy: self.policy,
            state,
            active_run: AtomicU64::new(0),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
