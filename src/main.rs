use anyhow::{Context, Result};
use clap::Parser;
use profile_lens::config::Config;
use profile_lens::logging::{self, LogConfig};
use profile_lens::render::Renderer;
use profile_lens::server::{self, AppState};
use profile_lens::{HttpFetcher, Pipeline, Proxifier};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "profile-lens",
    version,
    about = "Render profile pages through a headless browser and serve them proxy-safe"
)]
struct Cli {
    /// Path to config.toml (default: ~/.profile-lens/config.toml)
    #[arg(long, short, value_name = "PATH", env = "PROFILE_LENS_CONFIG")]
    config: Option<PathBuf>,
    /// Listen host (IP address or resolvable name)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,
    /// Listen port
    #[arg(long, short, value_name = "PORT")]
    port: Option<u16>,
    /// Public base URL the proxy is reachable at
    #[arg(long, value_name = "URL")]
    public_url: Option<String>,
    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.public_url {
            config.server.public_url = Some(url.clone());
        }
    }
}

// ── Bootstrap ───────────────────────────────────────────────────────────────

#[cfg(feature = "browser")]
fn build_renderer(config: &Config) -> Arc<dyn Renderer> {
    Arc::new(profile_lens::render::ChromiumRenderer::new(
        config.render.clone(),
        config.origin.clone(),
    ))
}

#[cfg(not(feature = "browser"))]
fn build_renderer(_config: &Config) -> Arc<dyn Renderer> {
    Arc::new(profile_lens::render::DisabledRenderer)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_env()
    });

    let mut config = Config::load(cli.config.clone())?;
    cli.apply_overrides(&mut config);

    let proxy_base = config.server.proxy_base();
    let proxifier = Proxifier::new(&proxy_base)
        .with_context(|| format!("Invalid public URL: {}", proxy_base))?;
    let fetcher = HttpFetcher::new(&config.origin, &config.proxy)?;
    let renderer = build_renderer(&config);

    let state = Arc::new(AppState {
        pipeline: Pipeline::new(proxifier),
        renderer: renderer.clone(),
        fetcher: Arc::new(fetcher),
        origin: config.origin.clone(),
        proxy: config.proxy.clone(),
    });

    let addr = config.server.socket_addr()?;
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down gracefully...");
    };

    server::serve(state, addr, shutdown).await?;
    renderer.shutdown().await;
    Ok(())
}
