//! HTTP server binary for weldmap.
//!
//! A thin shim over the library crate: maps CLI flags (with environment
//! fallbacks, optionally from a `.env` file) to `WeldMapConfig` and
//! `ServerConfig`, resolves the vision provider and serves the router.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use weldmap::pipeline::llm::resolve_provider;
use weldmap::pipeline::render::PdfiumRasterizer;
use weldmap::server::{build_router, AppState, ServerConfig};
use weldmap::WeldMapConfig;

const AFTER_HELP: &str = "\
ROUTES:
  GET  /api/health              liveness
  GET  /api/test-ai             ping the vision provider
  POST /api/upload-pdf          multipart `file` → AI analysis + annotated pages
  POST /api/demo-upload         same, with fixed demo analysis (no API key needed)
  POST /api/upload-pdf-only     multipart `file` → page images only
  POST /api/export-pdf          {filename, images, symbols, canvas} → PDF
  POST /api/export-annotations  validate a symbol list

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise the system library)
  RUST_LOG                Log filter (default: weldmap=info,tower_http=info)";

#[derive(Parser, Debug)]
#[command(
    name = "weldmap-server",
    version,
    about = "Weld-map service: annotate piping drawings and export canvas-accurate PDFs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Bind address.
    #[arg(long, env = "WELDMAP_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port.
    #[arg(short, long, env = "WELDMAP_PORT", default_value_t = 8001)]
    port: u16,

    /// Whole-request timeout in seconds.
    #[arg(long, env = "WELDMAP_REQUEST_TIMEOUT", default_value_t = 300)]
    request_timeout: u64,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "WELDMAP_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Vision model ID (e.g. gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "WELDMAP_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "WELDMAP_PROVIDER")]
    provider: Option<String>,

    /// Per-call vision timeout in seconds.
    #[arg(long, env = "WELDMAP_API_TIMEOUT", default_value_t = 90)]
    api_timeout: u64,

    /// Rasterisation scale relative to 72 DPI (0.5–6.0).
    #[arg(long, env = "WELDMAP_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// TrueType font for labels on annotated page images.
    #[arg(long, env = "WELDMAP_FONT")]
    font: Option<PathBuf>,

    /// Do not try to configure a vision provider; only demo / manual flows work.
    #[arg(long)]
    no_ai: bool,

    /// Debug-level logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "weldmap=debug,tower_http=debug"
    } else {
        "weldmap=info,tower_http=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    if let Some(path) = dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }

    // ── Library config ───────────────────────────────────────────────────
    let mut builder = WeldMapConfig::builder()
        .render_scale(cli.render_scale)
        .api_timeout_secs(cli.api_timeout);
    if let Some(model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(font) = cli.font {
        builder = builder.label_font(font);
    }
    let config = builder.build().context("invalid configuration")?;

    let server = ServerConfig {
        host: cli.host,
        port: cli.port,
        request_timeout_secs: cli.request_timeout,
        max_upload_bytes: cli.max_upload_mb.saturating_mul(1024 * 1024),
    };

    // ── Vision provider (optional) ───────────────────────────────────────
    let provider = if cli.no_ai {
        tracing::info!("AI analysis disabled (--no-ai)");
        None
    } else {
        match resolve_provider(&config) {
            Ok(p) => {
                tracing::info!("Vision provider ready");
                Some(p)
            }
            Err(e) => {
                tracing::warn!("AI analysis unavailable, /api/upload-pdf will answer 503: {e}");
                None
            }
        }
    };

    let rasterizer = Arc::new(PdfiumRasterizer::new(&config));
    let mut state = AppState::new(config, rasterizer);
    if let Some(p) = provider {
        state = state.with_provider(p);
    }
    let app = build_router(state, &server);

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
