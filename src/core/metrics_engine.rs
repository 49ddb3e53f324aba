//! Periodic metrics sampling with atomic snapshot publication
//!
//! The engine owns the metric sources, polls them on a fixed cadence on the
//! blocking pool and publishes each pass as one immutable
//! [`MetricsSnapshot`]. Readers never see a partially updated snapshot.

use anyhow::{anyhow, Result};
use arc_swap::ArcSwap;
use chrono::Local;
use lcd_sens_core::{sample_all, BoxedMetricSource, DEFAULT_SAMPLE_INTERVAL};
use lcd_sens_types::{MetricKind, MetricSample, MetricsSnapshot};
use log::{debug, error, info, trace, warn};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Change notification callback, invoked after every published snapshot
pub type SubscriberCallback = Arc<dyn Fn() -> Result<()> + Send + Sync>;

struct EngineInner {
    sources: Mutex<Vec<BoxedMetricSource>>,
    snapshot: ArcSwap<MetricsSnapshot>,
    subscribers: RwLock<HashMap<String, SubscriberCallback>>,
    interval: Duration,
}

struct SamplingTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Metrics sampling engine
pub struct MetricsEngine {
    inner: Arc<EngineInner>,
    task: Mutex<Option<SamplingTask>>,
}

impl MetricsEngine {
    pub fn new(sources: Vec<BoxedMetricSource>, interval: Duration) -> Self {
        let available: Vec<BoxedMetricSource> = sources
            .into_iter()
            .filter(|s| {
                let ok = s.is_available();
                if !ok {
                    debug!("Metric source {} unavailable, not polling it", s.kind());
                }
                ok
            })
            .collect();

        Self {
            inner: Arc::new(EngineInner {
                sources: Mutex::new(available),
                snapshot: ArcSwap::from_pointee(MetricsSnapshot::empty()),
                subscribers: RwLock::new(HashMap::new()),
                interval,
            }),
            task: Mutex::new(None),
        }
    }

    /// Engine over the built-in sources at the default 1 s cadence
    pub fn with_default_sources() -> Self {
        lcd_sens_sources::initialize_sensors();
        Self::new(lcd_sens_sources::default_sources(), DEFAULT_SAMPLE_INTERVAL)
    }

    /// Spawn the sampling task on the current tokio runtime.
    ///
    /// Calling `start` on a running engine is a no-op.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| anyhow!("metrics engine needs a tokio runtime: {}", e))?;

        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("Metrics engine already running");
            return Ok(());
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(inner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                let pass = Arc::clone(&inner);
                if let Err(e) = tokio::task::spawn_blocking(move || pass.refresh()).await {
                    error!("Metrics sampling pass panicked: {}", e);
                }

                if *shutdown_rx.borrow() {
                    break;
                }
            }
            trace!("Metrics sampling task exited");
        });

        info!("Metrics engine started ({:?} interval)", self.inner.interval);
        *task = Some(SamplingTask { shutdown, handle });
        Ok(())
    }

    /// Stop sampling. An in-flight pass completes and publishes first.
    pub async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|p| p.into_inner()).take();
        let Some(task) = task else {
            return;
        };
        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            warn!("Metrics sampling task ended abnormally: {}", e);
        }
        info!("Metrics engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Run one sampling pass synchronously: sample, publish, notify
    pub fn refresh(&self) {
        self.inner.refresh();
    }

    /// Two passes `settle` apart, for one-shot readers that never start the
    /// engine. Rate metrics (CPU usage, network) need a previous sample.
    pub async fn warm_up(&self, settle: Duration) {
        self.refresh();
        tokio::time::sleep(settle).await;
        self.refresh();
    }

    pub fn get_metric(&self, kind: MetricKind) -> Option<MetricSample> {
        self.inner.snapshot.load().get(kind).cloned()
    }

    pub fn get_all_metrics(&self) -> Arc<MetricsSnapshot> {
        self.inner.snapshot.load_full()
    }

    /// Register `callback` under `id`, replacing any previous registration
    pub fn subscribe<F>(&self, id: impl Into<String>, callback: F)
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let id = id.into();
        let mut subscribers = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(|p| p.into_inner());
        if subscribers.insert(id.clone(), Arc::new(callback)).is_some() {
            debug!("Replaced metrics subscriber {}", id);
        }
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn unsubscribe(&self, id: &str) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }
}

impl EngineInner {
    fn refresh(&self) {
        let now = Local::now();
        let samples = {
            let mut sources = self.sources.lock().unwrap_or_else(|p| p.into_inner());
            sample_all(&mut sources, now)
        };
        trace!("Sampled {} metrics", samples.len());
        self.snapshot
            .store(Arc::new(MetricsSnapshot::new(samples, now)));
        self.notify();
    }

    fn notify(&self) {
        // Callbacks run without the lock so they may (un)subscribe
        let callbacks: Vec<(String, SubscriberCallback)> = self
            .subscribers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(id, cb)| (id.clone(), Arc::clone(cb)))
            .collect();

        for (id, callback) in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Metrics subscriber {} failed: {:#}", id, e),
                Err(_) => error!("Metrics subscriber {} panicked", id),
            }
        }
    }
}

impl Drop for MetricsEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().unwrap_or_else(|p| p.into_inner()).take() {
            let _ = task.shutdown.send(true);
        }
    }
}
