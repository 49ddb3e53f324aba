//! Render/encode/send loop driving one panel
//!
//! Each tick takes the latest metrics snapshot and scene, composes a frame,
//! encodes it for the panel and writes the packets. Per-tick failures are
//! logged and counted, never fatal: device errors drop the transport and
//! back off exponentially before the next reopen attempt. Animated images
//! in the scene schedule an extra pass when their next frame is due.

use anyhow::Result;
use arc_swap::ArcSwap;
use lcd_sens_device::{
    DeviceBackend, DeviceError, DeviceProfile, DeviceTransport, FrameEncoder,
};
use lcd_sens_render::{Compositor, RenderError};
use lcd_sens_types::{MetricsSnapshot, Scene};
use log::{debug, error, info, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::constants::{
    DEFAULT_MAX_BACKOFF_TICKS, DEFAULT_MIN_FRAME_INTERVAL, DEFAULT_OPEN_TIMEOUT,
    DEFAULT_REFRESH_INTERVAL,
};
use super::metrics_engine::MetricsEngine;

/// Source of the scene to render on each tick
pub trait SceneProvider: Send + Sync {
    fn current_scene(&self) -> Arc<Scene>;
}

impl SceneProvider for ArcSwap<Scene> {
    fn current_scene(&self) -> Arc<Scene> {
        self.load_full()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Tick period
    pub interval: Duration,
    /// Minimum gap between two passes, also for requested renders
    pub min_frame_interval: Duration,
    /// Bound on a single device open
    pub open_timeout: Duration,
    /// Cap on ticks skipped after consecutive failures
    pub max_backoff_ticks: u32,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            min_frame_interval: DEFAULT_MIN_FRAME_INTERVAL,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            max_backoff_ticks: DEFAULT_MAX_BACKOFF_TICKS,
        }
    }
}

/// Frame counters since the loop was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub rendered: u64,
    pub sent: u64,
    pub dropped: u64,
    pub skipped: u64,
}

/// Exponential backoff counted in ticks: skip 1, 2, 4, ... up to `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    failures: u32,
    remaining: u32,
    max: u32,
}

impl Backoff {
    pub fn new(max: u32) -> Self {
        Self {
            failures: 0,
            remaining: 0,
            max: max.max(1),
        }
    }

    pub fn on_failure(&mut self) {
        let skip = 1u32.checked_shl(self.failures).unwrap_or(u32::MAX);
        self.remaining = skip.min(self.max);
        self.failures = self.failures.saturating_add(1);
    }

    pub fn on_success(&mut self) {
        self.failures = 0;
        self.remaining = 0;
    }

    /// Consume one tick of backoff; true if this tick must be skipped
    pub fn should_skip(&mut self) -> bool {
        if self.remaining > 0 {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }
}

/// Open a transport on the blocking pool, giving up after `timeout`
pub async fn open_with_timeout(
    backend: Arc<dyn DeviceBackend>,
    profile: DeviceProfile,
    timeout: Duration,
) -> Result<DeviceTransport, DeviceError> {
    let open = tokio::task::spawn_blocking(move || DeviceTransport::open(backend.as_ref(), &profile));
    match tokio::time::timeout(timeout, open).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(DeviceError::Backend(format!("open task failed: {}", e))),
        Err(_) => Err(DeviceError::Timeout(timeout)),
    }
}

enum PassError {
    Render(RenderError),
    Device(DeviceError),
}

struct LoopShared {
    engine: Arc<MetricsEngine>,
    scenes: Arc<dyn SceneProvider>,
    encoder: FrameEncoder,
    backend: Arc<dyn DeviceBackend>,
    settings: RefreshSettings,
    compositor: Mutex<Compositor>,
    transport: Mutex<Option<Arc<DeviceTransport>>>,
    backoff: Mutex<Backoff>,
    stats: Mutex<FrameStats>,
    state: Mutex<LoopState>,
    render_requested: Notify,
    metrics_ready: Notify,
    /// Time until an animated layer shows its next frame, from the last pass
    next_frame: Mutex<Option<Duration>>,
    /// Scene of the last pass; a different one invalidates decoded images
    last_scene: Mutex<Option<Arc<Scene>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

struct LoopTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic driver for one panel
pub struct RefreshLoop {
    shared: Arc<LoopShared>,
    task: Mutex<Option<LoopTask>>,
}

impl RefreshLoop {
    pub fn new(
        engine: Arc<MetricsEngine>,
        scenes: Arc<dyn SceneProvider>,
        profile: DeviceProfile,
        backend: Arc<dyn DeviceBackend>,
        settings: RefreshSettings,
    ) -> Result<Self, DeviceError> {
        let encoder = FrameEncoder::new(profile)?;
        Ok(Self {
            shared: Arc::new(LoopShared {
                engine,
                scenes,
                encoder,
                backend,
                settings,
                compositor: Mutex::new(Compositor::new()),
                transport: Mutex::new(None),
                backoff: Mutex::new(Backoff::new(settings.max_backoff_ticks)),
                stats: Mutex::new(FrameStats::default()),
                state: Mutex::new(LoopState::Idle),
                render_requested: Notify::new(),
                metrics_ready: Notify::new(),
                next_frame: Mutex::new(None),
                last_scene: Mutex::new(None),
            }),
            task: Mutex::new(None),
        })
    }

    /// Install an already opened transport
    pub fn attach(&self, transport: DeviceTransport) {
        *lock(&self.shared.transport) = Some(Arc::new(transport));
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.shared.transport).is_some()
    }

    pub fn state(&self) -> LoopState {
        *lock(&self.shared.state)
    }

    pub fn stats(&self) -> FrameStats {
        *lock(&self.shared.stats)
    }

    pub fn profile(&self) -> &DeviceProfile {
        self.shared.encoder.profile()
    }

    /// Start ticking; no-op while already running
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| anyhow::anyhow!("refresh loop needs a tokio runtime: {}", e))?;

        {
            let mut state = lock(&self.shared.state);
            match *state {
                LoopState::Running | LoopState::Stopping => return Ok(()),
                LoopState::Idle | LoopState::Stopped => *state = LoopState::Running,
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let handle = runtime.spawn(run(shared, shutdown_rx));
        *lock(&self.task) = Some(LoopTask { shutdown, handle });

        info!(
            "Refresh loop started for {} ({:?} interval)",
            self.profile().name,
            self.shared.settings.interval
        );
        Ok(())
    }

    /// Stop after the in-flight pass and release the device
    pub async fn stop(&self) {
        let task = lock(&self.task).take();
        let Some(task) = task else {
            return;
        };
        *lock(&self.shared.state) = LoopState::Stopping;

        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            error!("Refresh loop task ended abnormally: {}", e);
        }

        let transport = lock(&self.shared.transport).take();
        if let Some(transport) = transport {
            let _ = tokio::task::spawn_blocking(move || transport.close()).await;
        }
        *lock(&self.shared.state) = LoopState::Stopped;
        info!("Refresh loop stopped");
    }

    /// Ask for a pass as soon as the in-flight one and the minimum frame
    /// interval allow
    pub fn request_render(&self) {
        self.shared.render_requested.notify_one();
    }

    /// Align passes with published metrics snapshots.
    ///
    /// A new snapshot wakes the loop, but passes stay at least `interval`
    /// apart, so the configured cadence is never exceeded.
    pub fn subscribe_to(&self, engine: &MetricsEngine) {
        let shared: Weak<LoopShared> = Arc::downgrade(&self.shared);
        engine.subscribe("refresh_loop", move || {
            if let Some(shared) = shared.upgrade() {
                shared.metrics_ready.notify_one();
            }
            Ok(())
        });
    }

    /// Run a single tick now
    pub async fn tick_once(&self) {
        tick(&self.shared).await;
    }
}

async fn run(shared: Arc<LoopShared>, mut shutdown: watch::Receiver<bool>) {
    let settings = shared.settings;
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_pass: Option<Instant> = None;
    let mut animation_deadline: Option<Instant> = None;

    loop {
        // Minimum gap to the previous pass for this wake-up
        let gap = tokio::select! {
            _ = ticker.tick() => None,
            _ = shared.render_requested.notified() => Some(settings.min_frame_interval),
            _ = shared.metrics_ready.notified() => {
                Some(settings.interval.max(settings.min_frame_interval))
            }
            _ = tokio::time::sleep_until(animation_deadline.unwrap_or_else(far_future)),
                if animation_deadline.is_some() => None,
            _ = shutdown.changed() => break,
        };

        if let (Some(gap), Some(last)) = (gap, last_pass) {
            tokio::select! {
                _ = tokio::time::sleep_until(last + gap) => {}
                _ = shutdown.changed() => break,
            }
        }
        if *shutdown.borrow() {
            break;
        }

        tick(&shared).await;
        let now = Instant::now();
        last_pass = Some(now);
        ticker.reset();
        // Without a panel the ticks only drain the backoff
        let next_frame = *lock(&shared.next_frame);
        animation_deadline = next_frame
            .filter(|_| lock(&shared.transport).is_some())
            .map(|delay| now + delay.max(settings.min_frame_interval));
    }
    trace!("Refresh loop task exited");
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

async fn tick(shared: &Arc<LoopShared>) {
    if lock(&shared.backoff).should_skip() {
        lock(&shared.stats).skipped += 1;
        trace!("Backing off, tick skipped");
        return;
    }

    let current = lock(&shared.transport).clone();
    let transport = match current {
        Some(transport) => transport,
        None => {
            let profile = shared.encoder.profile().clone();
            match open_with_timeout(
                Arc::clone(&shared.backend),
                profile,
                shared.settings.open_timeout,
            )
            .await
            {
                Ok(transport) => {
                    let transport = Arc::new(transport);
                    *lock(&shared.transport) = Some(Arc::clone(&transport));
                    transport
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", shared.encoder.profile().name, e);
                    lock(&shared.backoff).on_failure();
                    lock(&shared.stats).dropped += 1;
                    return;
                }
            }
        }
    };

    let snapshot = shared.engine.get_all_metrics();
    let pass_shared = Arc::clone(shared);
    let pass_transport = Arc::clone(&transport);
    let result = tokio::task::spawn_blocking(move || {
        // Scene providers may touch the filesystem
        let scene = pass_shared.scenes.current_scene();
        pass_shared.render_encode_send(&scene, &snapshot, &pass_transport)
    })
    .await;

    match result {
        Ok(Ok(())) => {
            lock(&shared.stats).sent += 1;
            lock(&shared.backoff).on_success();
        }
        Ok(Err(PassError::Render(e))) => {
            warn!("Frame dropped, render failed: {}", e);
            lock(&shared.stats).dropped += 1;
        }
        Ok(Err(PassError::Device(e @ DeviceError::ConfigMismatch { .. }))) => {
            warn!("Frame dropped: {}", e);
            lock(&shared.stats).dropped += 1;
        }
        Ok(Err(PassError::Device(e))) => {
            error!("Device error on {}: {}", transport.device(), e);
            lock(&shared.stats).dropped += 1;
            lock(&shared.backoff).on_failure();
            // Drop the transport; the next tick after backoff reopens it
            let stale = lock(&shared.transport).take();
            if let Some(stale) = stale {
                let _ = tokio::task::spawn_blocking(move || stale.close()).await;
            }
        }
        Err(e) => {
            error!("Render pass panicked: {}", e);
            lock(&shared.stats).dropped += 1;
        }
    }
}

impl LoopShared {
    fn render_encode_send(
        &self,
        scene: &Arc<Scene>,
        snapshot: &MetricsSnapshot,
        transport: &DeviceTransport,
    ) -> Result<(), PassError> {
        let (width, height) = self.encoder.profile().dimensions();
        let now = chrono::Local::now().naive_local();

        let frame = {
            let mut compositor = lock(&self.compositor);
            {
                let mut last = lock(&self.last_scene);
                if last.as_ref().is_some_and(|prev| !Arc::ptr_eq(prev, scene)) {
                    debug!("Scene changed, dropping decoded images");
                    compositor.clear_image_cache();
                }
                *last = Some(Arc::clone(scene));
            }
            let frame = compositor
                .render(scene, snapshot, now, width, height)
                .map_err(PassError::Render)?;
            *lock(&self.next_frame) = compositor.next_frame_in();
            frame
        };
        lock(&self.stats).rendered += 1;

        let encoded = self.encoder.encode(&frame).map_err(PassError::Device)?;
        transport.send(&encoded).map_err(PassError::Device)?;
        trace!(
            "Frame sent to {} ({} packets)",
            transport.device(),
            encoded.len()
        );
        Ok(())
    }
}
