use crate::config::WeldMapConfig;
use crate::pipeline::detect::{ComponentDetector, DemoDetector, VisionDetector};
use crate::pipeline::render::PageRasterizer;
use edgequake_llm::LLMProvider;
use std::sync::Arc;

/// Shared state handed to every handler via `State<AppState>`.
///
/// Cheap to clone; everything is behind `Arc`. Nothing in here is mutated
/// after startup, so requests never contend on it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WeldMapConfig>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    /// Detector for `/api/upload-pdf`; `None` when no provider is configured.
    pub detector: Option<Arc<dyn ComponentDetector>>,
    /// Provider used by `/api/test-ai`.
    pub provider: Option<Arc<dyn LLMProvider>>,
    pub demo: Arc<dyn ComponentDetector>,
}

impl AppState {
    /// State without any vision provider; only the demo flow can annotate.
    pub fn new(config: WeldMapConfig, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            config: Arc::new(config),
            rasterizer,
            detector: None,
            provider: None,
            demo: Arc::new(DemoDetector),
        }
    }

    /// Enable AI analysis through `provider`.
    pub fn with_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        let vision = VisionDetector::new(Arc::clone(&provider), Arc::clone(&self.config));
        self.detector = Some(Arc::new(vision));
        self.provider = Some(provider);
        self
    }

    /// Replace the upload detector (used by tests and alternative backends).
    pub fn with_detector(mut self, detector: Arc<dyn ComponentDetector>) -> Self {
        self.detector = Some(detector);
        self
    }
}
