//! Headless driver for the sweep engine.
//!
//! Commands:
//! - scan: select a rectangle, sweep it with N agents and write the coverage raster as PNG
//! - lookup: resolve a place name through the configured lookup service

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::FmtSubscriber;

use swarm_sweep::lookup::{search, suggest};
use swarm_sweep::{
    BoundingRegion, ControlEvent, HeadlessSurface, ImmediateScheduler, IntervalScheduler, LatLng, LoopOutcome,
    NominatimClient, ScanConfig, ScanController, ScanHost, ScanSummary, StopReason, Viewport, run_scan_loop,
};

#[derive(Parser)]
#[command(name = "sweep-tester")]
#[command(version)]
#[command(about = "Run multi-agent area sweeps without a browser")]
struct Cli {
    /// JSON configuration file; built-in defaults when omitted
    #[arg(long, env = "SWARM_SWEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the rectangle spanned by two corners
    Scan {
        /// First corner as "lat,lng"
        #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
        from: LatLng,

        /// Opposite corner as "lat,lng"
        #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
        to: LatLng,

        /// Number of agents
        #[arg(short, long)]
        agents: Option<u32>,

        /// Drawing-surface width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Drawing-surface height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Frame period in milliseconds; 0 runs frames back to back
        #[arg(long = "frame-ms")]
        frame_ms: Option<u64>,

        /// Where to write the coverage raster
        #[arg(short, long, default_value = "coverage.png")]
        output: PathBuf,
    },

    /// Look up a place by name
    Lookup {
        query: String,

        /// Print typing suggestions instead of the single best match
        #[arg(long)]
        suggest: bool,
    },
}

fn parse_lat_lng(value: &str) -> Result<LatLng, String> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lng\", got \"{value}\""))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude \"{lat}\": {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude \"{lng}\": {e}"))?;
    Ok(LatLng::new(lat, lng))
}

fn load_config(path: Option<&PathBuf>) -> Result<ScanConfig> {
    match path {
        Some(path) => ScanConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(ScanConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Scan {
            from,
            to,
            agents,
            width,
            height,
            frame_ms,
            output,
        } => {
            if let Some(width) = width {
                config.view.width = width;
            }
            if let Some(height) = height {
                config.view.height = height;
            }
            if let Some(frame_ms) = frame_ms {
                config.frame_interval_ms = frame_ms;
            }
            config.validate()?;
            run_scan(config, from, to, agents, output).await
        }
        Commands::Lookup { query, suggest: suggestions } => run_lookup(&config, &query, suggestions).await,
    }
}

async fn run_scan(config: ScanConfig, from: LatLng, to: LatLng, agents: Option<u32>, output: PathBuf) -> Result<()> {
    let summary = sweep(config, from, to, agents).await?;

    // --- 4. Report ---
    for agent in &summary.agents {
        info!(
            agent = agent.id,
            color = ?agent.color.0,
            speed = agent.speed,
            area = agent.area,
            finished_at = agent.finished_at,
            "agent"
        );
    }
    info!(
        session = %summary.session,
        ticks = summary.ticks,
        covered_pixels = summary.covered_pixels,
        output = %output.display(),
        "scan completed"
    );

    summary
        .save_png(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

/// Runs one scan of the rectangle spanned by `from` and `to` to completion.
async fn sweep(config: ScanConfig, from: LatLng, to: LatLng, agents: Option<u32>) -> Result<ScanSummary> {
    // --- 1. View ---
    // A user zooms onto the area before clicking; the headless view does the same.
    let region = BoundingRegion::from_corners(from, to)?;
    let mut view = Viewport::new(
        config.view.default_center,
        config.view.default_zoom,
        config.view.width,
        config.view.height,
        config.view.max_zoom,
    );
    view.fit_bounds(&region, config.completion.fit_padding);

    let frame_ms = config.frame_interval_ms;
    let controller = ScanController::new(config)?;
    let host = Arc::new(Mutex::new(ScanHost::new(controller, HeadlessSurface::new(view))));

    // --- 2. Selection ---
    let session = {
        let mut host = host.lock().await;
        if let Some(agents) = agents {
            let dispatch = host.dispatch(ControlEvent::AgentCountSelected(agents));
            if let Some(alert) = dispatch.alerts.first() {
                bail!("{alert}");
            }
        }
        host.dispatch(ControlEvent::MapClicked(from));
        let dispatch = host.dispatch(ControlEvent::MapClicked(to));
        if let Some(alert) = dispatch.alerts.first() {
            bail!("{alert}");
        }
        dispatch.started.context("selection did not start a scan")?
    };

    // --- 3. Frame Loop ---
    let outcome: LoopOutcome = if frame_ms == 0 {
        run_scan_loop(host.clone(), ImmediateScheduler, session).await
    } else {
        run_scan_loop(host.clone(), IntervalScheduler::from_millis(frame_ms), session).await
    };
    if outcome.reason != StopReason::Completed {
        bail!("scan {} stopped early: {:?}", outcome.session, outcome.reason);
    }

    let host = host.lock().await;
    if let Some(message) = host.surface().messages().last() {
        info!(content = %message.content, "message");
    }
    let viewport = host.surface().viewport();
    debug!(
        lat = viewport.center().lat,
        lng = viewport.center().lng,
        zoom = viewport.zoom(),
        "view fitted"
    );

    outcome.summary.context("completed scan without a summary")
}

async fn run_lookup(config: &ScanConfig, query: &str, suggestions: bool) -> Result<()> {
    let client = NominatimClient::new(&config.lookup)?;

    if suggestions {
        let places = suggest(&client, query, config.lookup.min_query_len).await;
        if places.is_empty() {
            warn!(query, "no suggestions");
        }
        for place in places {
            println!("{:.6},{:.6}\t{}", place.lat, place.lon, place.label);
        }
        return Ok(());
    }

    let place = search(&client, query).await?;
    println!("{:.6},{:.6}\t{}", place.lat, place.lon, place.label);
    Ok(())
}
