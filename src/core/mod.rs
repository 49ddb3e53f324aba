//! Metrics engine and refresh loop for lcd-sens

pub mod constants;
mod metrics_engine;
mod refresh_loop;

pub use metrics_engine::{MetricsEngine, SubscriberCallback};
pub use refresh_loop::{
    open_with_timeout, Backoff, FrameStats, LoopState, RefreshLoop, RefreshSettings,
    SceneProvider,
};
