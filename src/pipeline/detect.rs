//! Component detection: one page image → normalised [`Analysis`].
//!
//! [`ComponentDetector`] is the seam between the upload flow and whatever
//! produces the analysis. [`VisionDetector`] asks the configured vision
//! model; [`DemoDetector`] returns fixed data so the full flow can be shown
//! without any provider.

use crate::config::WeldMapConfig;
use crate::error::AnalysisError;
use crate::ingest::{demo_analysis, normalize, Analysis};
use crate::model::Size;
use crate::pipeline::extract::extract_json;
use crate::pipeline::llm::analyze_page;
use crate::pipeline::render::RasterPage;
use async_trait::async_trait;
use edgequake_llm::LLMProvider;
use std::sync::Arc;
use tracing::{debug, info};

/// Produces the component analysis of one rendered page.
#[async_trait]
pub trait ComponentDetector: Send + Sync {
    /// Short name for logs and the upload response `mode`.
    fn name(&self) -> &'static str;

    async fn detect(&self, page: &RasterPage) -> Result<Analysis, AnalysisError>;
}

/// Turn a raw model reply for 1-based `page_num` into an analysis.
pub fn parse_reply(page_num: usize, reply: &str, page: Size) -> Result<Analysis, AnalysisError> {
    let value = extract_json(reply).map_err(|e| AnalysisError::UnparseableResponse {
        page: page_num,
        detail: e.to_string(),
    })?;
    normalize(&value, page).ok_or(AnalysisError::UnknownSchema { page: page_num })
}

fn page_size(page: &RasterPage) -> Size {
    Size::new(f64::from(page.width), f64::from(page.height))
}

/// Vision-model backed detector.
pub struct VisionDetector {
    provider: Arc<dyn LLMProvider>,
    config: Arc<WeldMapConfig>,
}

impl VisionDetector {
    pub fn new(provider: Arc<dyn LLMProvider>, config: Arc<WeldMapConfig>) -> Self {
        Self { provider, config }
    }
}

#[async_trait]
impl ComponentDetector for VisionDetector {
    fn name(&self) -> &'static str {
        "ai"
    }

    async fn detect(&self, page: &RasterPage) -> Result<Analysis, AnalysisError> {
        let page_num = page.index + 1;
        let reply = analyze_page(
            &self.provider,
            page_num,
            &page.png,
            page.width,
            page.height,
            &self.config,
        )
        .await?;
        info!(
            "Page {}: vision reply in {}ms ({} in / {} out tokens)",
            page_num, reply.duration_ms, reply.input_tokens, reply.output_tokens
        );
        let analysis = parse_reply(page_num, &reply.content, page_size(page))?;
        let count = analysis.components.len();
        debug!("Page {}: {} components detected", page_num, count);
        Ok(analysis)
    }
}

/// Returns the fixed demo analysis for every page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoDetector;

#[async_trait]
impl ComponentDetector for DemoDetector {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn detect(&self, page: &RasterPage) -> Result<Analysis, AnalysisError> {
        let page_num = page.index + 1;
        normalize(&demo_analysis(), page_size(page))
            .ok_or(AnalysisError::UnknownSchema { page: page_num })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SchemaVersion;
    use crate::model::AnnotationType;

    fn raster(w: u32, h: u32) -> RasterPage {
        RasterPage {
            index: 0,
            width: w,
            height: h,
            png: Vec::new(),
        }
    }

    #[test]
    fn fenced_reply_parses() {
        let reply = "```json\n{\"weld_joints\": [{\"coords\": [5, 6], \"type\": \"shop\"}]}\n```";
        let a = parse_reply(1, reply, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(a.schema, SchemaVersion::WeldJointsV2);
        assert_eq!(a.components[0].kind, AnnotationType::ShopWeld);
    }

    #[test]
    fn prose_reply_is_unparseable() {
        let err = parse_reply(3, "No components found.", Size::new(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, AnalysisError::UnparseableResponse { page: 3, .. }));
    }

    #[test]
    fn foreign_json_is_unknown_schema() {
        let err = parse_reply(2, "{\"answer\": 42}", Size::new(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownSchema { page: 2 }));
    }

    #[tokio::test]
    async fn demo_detector_clamps_to_small_pages() {
        let a = DemoDetector.detect(&raster(400, 200)).await.unwrap();
        assert!(!a.components.is_empty());
        assert!(a
            .components
            .iter()
            .all(|c| c.position.x <= 400.0 && c.position.y <= 200.0));
    }
}
