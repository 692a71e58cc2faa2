//! Configuration types for weld-map generation and export.
//!
//! All behaviour is controlled through [`WeldMapConfig`], built via its
//! [`WeldMapConfigBuilder`]. Symbol proportions, margin bands and render
//! scale live here; the interactive preview and both export targets read the
//! same numbers.

use crate::error::WeldMapError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one weld-map service instance.
///
/// # Example
/// ```rust
/// use weldmap::WeldMapConfig;
///
/// let config = WeldMapConfig::builder()
///     .render_scale(2.0)
///     .model("gpt-4o")
///     .api_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct WeldMapConfig {
    /// Rasterisation zoom relative to 72 DPI. Range: 0.5–6.0. Default: 2.0.
    ///
    /// 2.0 renders an A3 isometric at roughly 2400 px on its long edge, which
    /// keeps weld dots and line numbers legible for the vision model.
    pub render_scale: f32,

    /// Maximum rendered image dimension in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// LLM model identifier. If None, `gpt-4o` is used with OpenAI.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Per-call timeout for the vision model in seconds. Default: 90.
    ///
    /// No retries happen; on timeout the page carries zero components.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// TrueType font for labels on annotated PNGs. If None or unreadable,
    /// labels keep their background box but glyphs are skipped.
    pub label_font: Option<PathBuf>,

    /// Give generated symbols a type-code label (`FW`, `SW`, ...). Default: true.
    pub auto_labels: bool,

    pub style: SymbolStyle,

    pub placement: PlacementConfig,
}

impl Default for WeldMapConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            max_rendered_pixels: 4000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 90,
            system_prompt: None,
            label_font: None,
            auto_labels: true,
            style: SymbolStyle::default(),
            placement: PlacementConfig::default(),
        }
    }
}

impl fmt::Debug for WeldMapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let provider = self.provider.as_ref().map(|_| "<dyn LLMProvider>");
        f.debug_struct("WeldMapConfig")
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &provider)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("label_font", &self.label_font)
            .field("auto_labels", &self.auto_labels)
            .field("style", &self.style)
            .field("placement", &self.placement)
            .finish()
    }
}

impl WeldMapConfig {
    pub fn builder() -> WeldMapConfigBuilder {
        WeldMapConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`WeldMapConfig`].
#[derive(Debug)]
pub struct WeldMapConfigBuilder {
    config: WeldMapConfig,
}

impl WeldMapConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn label_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.label_font = Some(path.into());
        self
    }

    pub fn auto_labels(mut self, v: bool) -> Self {
        self.config.auto_labels = v;
        self
    }

    pub fn style(mut self, style: SymbolStyle) -> Self {
        self.config.style = style;
        self
    }

    pub fn placement(mut self, placement: PlacementConfig) -> Self {
        self.config.placement = placement;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WeldMapConfig, WeldMapError> {
        let c = &self.config;
        if !(0.5..=6.0).contains(&c.render_scale) {
            return Err(WeldMapError::InvalidConfig(format!(
                "render scale must be 0.5–6.0, got {}",
                c.render_scale
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(WeldMapError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        c.style.validate()?;
        c.placement.validate()?;
        Ok(self.config)
    }
}

// ── Symbol style ─────────────────────────────────────────────────────────

/// Symbol drawing constants, in canvas display pixels.
///
/// Every export target scales these by its own display → output factor, so a
/// diamond is the same fraction of the page in the editor, in the annotated
/// PNG and in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolStyle {
    /// Canonical symbol unit; a diamond spans `1.6 × unit_size`. Default: 30.
    pub unit_size: f64,
    /// Outline width in raster pixels. Default: 2.
    pub stroke_width: f64,
    pub label_font_size: f64,
    /// Gap between a shape and its label. Default: 5.
    pub label_margin: f64,
    /// Padding inside the label background. Default: 2.
    pub label_padding: f64,
    pub arrowhead: bool,
    pub arrowhead_size: f64,
    /// Clearance between the arrow tip and the target. Default: 15.
    pub tip_gap: f64,
}

impl Default for SymbolStyle {
    fn default() -> Self {
        Self {
            unit_size: 30.0,
            stroke_width: 2.0,
            label_font_size: 12.0,
            label_margin: 5.0,
            label_padding: 2.0,
            arrowhead: true,
            arrowhead_size: 8.0,
            tip_gap: 15.0,
        }
    }
}

impl SymbolStyle {
    fn validate(&self) -> Result<(), WeldMapError> {
        let positive = [
            ("unit_size", self.unit_size),
            ("stroke_width", self.stroke_width),
            ("label_font_size", self.label_font_size),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(WeldMapError::InvalidConfig(format!("{name} must be > 0, got {v}")));
            }
        }
        let non_negative = [
            ("label_margin", self.label_margin),
            ("label_padding", self.label_padding),
            ("arrowhead_size", self.arrowhead_size),
            ("tip_gap", self.tip_gap),
        ];
        for (name, v) in non_negative {
            if !(v.is_finite() && v >= 0.0) {
                return Err(WeldMapError::InvalidConfig(format!("{name} must be ≥ 0, got {v}")));
            }
        }
        Ok(())
    }
}

// ── Placement ────────────────────────────────────────────────────────────

/// Margin-band layout for generated symbols, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Distance from the page edge to the outer side of a band. Default: 30.
    pub edge_offset: f64,
    /// Band width across its short axis. Default: 40.
    pub band_thickness: f64,
    /// Inset of the band ends from the page corners. Default: 60.
    pub span_inset: f64,
    /// Pitch along left/right bands. Default: 50.
    pub side_pitch: f64,
    /// Pitch along top/bottom bands. Default: 80.
    pub edge_pitch: f64,
    /// Symbols keep this far from a band's ends. Default: 20.
    pub end_clearance: f64,
    /// Connectors shorter than this are dropped. Default: 10.
    pub min_connector_length: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            edge_offset: 30.0,
            band_thickness: 40.0,
            span_inset: 60.0,
            side_pitch: 50.0,
            edge_pitch: 80.0,
            end_clearance: 20.0,
            min_connector_length: 10.0,
        }
    }
}

impl PlacementConfig {
    fn validate(&self) -> Result<(), WeldMapError> {
        let fields = [
            ("edge_offset", self.edge_offset),
            ("band_thickness", self.band_thickness),
            ("span_inset", self.span_inset),
            ("side_pitch", self.side_pitch),
            ("edge_pitch", self.edge_pitch),
            ("end_clearance", self.end_clearance),
            ("min_connector_length", self.min_connector_length),
        ];
        for (name, v) in fields {
            if !(v.is_finite() && v >= 0.0) {
                return Err(WeldMapError::InvalidConfig(format!("{name} must be ≥ 0, got {v}")));
            }
        }
        Ok(())
    }
}
