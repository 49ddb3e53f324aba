use anyhow::{bail, Context, Result};
use clap::Parser;
use lcd_sens::config::{load_display_config, AppSettings, ReloadingScene};
use lcd_sens::core::{open_with_timeout, MetricsEngine, RefreshLoop};
use lcd_sens_device::{parse_device_id, DeviceBackend, DeviceProfile, DeviceRegistry, SystemBackend};
use lcd_sens_render::{write_png, Compositor};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Width and height used by `--render` when no panel is known
const PREVIEW_SIZE: (u32, u32) = (480, 480);
/// Gap between the two sampling passes before a preview
const PREVIEW_SETTLE: Duration = Duration::from_millis(500);

/// lcd-sens - Live system metrics on USB LCD panels
#[derive(Parser, Debug)]
#[command(name = "lcd-sens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Display configuration file (JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Drive this panel instead of auto-detecting (hex VID:PID, e.g. 0418:5304)
    #[arg(long = "device", value_name = "VID:PID")]
    device: Option<String>,

    /// List supported panels and whether they are attached
    #[arg(short = 'l', long = "list-devices")]
    list_devices: bool,

    /// Render one frame to a PNG file instead of a panel
    #[arg(short = 'r', long = "render", value_name = "PNG")]
    render: Option<PathBuf>,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings file errors must not hide the logger, so load before init
    // and report afterwards
    let settings = AppSettings::load();

    let level = match settings.as_ref() {
        Ok(s) if cli.debug == 0 => s.debug_level,
        _ => cli.debug,
    };
    let log_level = match level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG overrides the CLI level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    warn!("Starting lcd-sens v{}", env!("CARGO_PKG_VERSION"));

    let settings = settings.unwrap_or_else(|e| {
        warn!("Ignoring unreadable settings: {:#}", e);
        AppSettings::default()
    });

    let backend: Arc<dyn DeviceBackend> = Arc::new(SystemBackend::new());

    if cli.list_devices {
        list_devices(backend.as_ref());
        return Ok(());
    }

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => settings.display_config_path()?,
    };
    let display = load_display_config(&config_path)?;
    info!("Loaded display configuration {}", config_path.display());

    let device = cli.device.as_deref().or(settings.device.as_deref());
    let profile = select_profile(device, backend.as_ref())?;

    let engine = Arc::new(MetricsEngine::with_default_sources());

    if let Some(output) = cli.render {
        let (width, height) = profile
            .as_ref()
            .map(|p| p.dimensions())
            .unwrap_or(PREVIEW_SIZE);
        engine.warm_up(PREVIEW_SETTLE).await;
        return render_preview(&engine, &display.to_scene(), width, height, &output);
    }

    let Some(profile) = profile else {
        bail!("No supported panel found (use --list-devices or --device VID:PID)");
    };

    let refresh = settings.refresh_settings(display.refresh_interval());
    let scenes = Arc::new(ReloadingScene::new(&config_path, &display));

    let transport = open_with_timeout(Arc::clone(&backend), profile.clone(), refresh.open_timeout)
        .await
        .with_context(|| format!("opening {} ({})", profile.name, profile.id()))?;

    let refresh_loop = RefreshLoop::new(Arc::clone(&engine), scenes, profile, backend, refresh)
        .context("creating refresh loop")?;
    refresh_loop.attach(transport);
    refresh_loop.subscribe_to(&engine);

    engine.start()?;
    refresh_loop.start()?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for Ctrl-C: {}", e);
    }
    warn!("Shutting down");

    refresh_loop.stop().await;
    engine.stop().await;

    let stats = refresh_loop.stats();
    info!(
        "Frames: {} rendered, {} sent, {} dropped, {} skipped",
        stats.rendered, stats.sent, stats.dropped, stats.skipped
    );
    Ok(())
}

fn list_devices(backend: &dyn DeviceBackend) {
    println!("Supported panels:");
    for profile in DeviceRegistry::builtin().profiles() {
        let (width, height) = profile.dimensions();
        let status = if !SystemBackend::supports(profile.transport) {
            "no driver in this build"
        } else if backend.is_present(profile.vendor_id, profile.product_id) {
            "attached"
        } else {
            "not found"
        };
        println!(
            "  {}  {:<32} {}x{} {:<9} {}",
            profile.id(),
            profile.name,
            width,
            height,
            profile.transport,
            status
        );
    }
}

/// Profile for an explicit `VID:PID`, else the first attached known panel
fn select_profile(device: Option<&str>, backend: &dyn DeviceBackend) -> Result<Option<DeviceProfile>> {
    let registry = DeviceRegistry::builtin();
    match device {
        Some(id) => {
            let Some((vendor_id, product_id)) = parse_device_id(id) else {
                bail!("Invalid device id '{}', expected hex VID:PID", id);
            };
            match registry.lookup(vendor_id, product_id) {
                Some(profile) => Ok(Some(profile.clone())),
                None => bail!("Unsupported device {:04x}:{:04x}", vendor_id, product_id),
            }
        }
        None => Ok(registry.detect(backend).cloned()),
    }
}

fn render_preview(
    engine: &MetricsEngine,
    scene: &lcd_sens_types::Scene,
    width: u32,
    height: u32,
    output: &std::path::Path,
) -> Result<()> {
    let snapshot = engine.get_all_metrics();
    let now = chrono::Local::now().naive_local();

    let frame = Compositor::new()
        .render(scene, &snapshot, now, width, height)
        .context("rendering preview frame")?;

    let mut file = std::fs::File::create(output)
        .with_context(|| format!("creating {}", output.display()))?;
    write_png(&frame, &mut file).with_context(|| format!("writing {}", output.display()))?;

    warn!("Wrote {}x{} preview to {}", width, height, output.display());
    Ok(())
}
