//! GPU detection and backend selection

use super::amd::AmdBackend;
use super::backend::{GpuBackend, GpuBackendEnum};
use super::intel::IntelBackend;
use super::nvidia::NvidiaBackend;

/// Highest DRM card index probed
const MAX_DRM_CARDS: u32 = 16;

/// Detect all available GPUs and create backends, best candidate first.
///
/// Order: NVIDIA, then AMD sorted so discrete cards come before APUs, then
/// Intel.
pub fn detect_gpus() -> Vec<GpuBackendEnum> {
    let mut gpus: Vec<GpuBackendEnum> = Vec::new();

    log::warn!("=== Detecting GPUs ===");

    for i in 0..NvidiaBackend::device_count() {
        match NvidiaBackend::new(i) {
            Ok(backend) => gpus.push(GpuBackendEnum::Nvidia(Box::new(backend))),
            Err(e) => log::warn!("  Failed to initialize NVIDIA GPU {}: {}", i, e),
        }
    }

    let mut amd: Vec<AmdBackend> = (0..MAX_DRM_CARDS)
        .filter_map(|i| AmdBackend::new(i).ok())
        .collect();
    amd.sort_by_key(|b| std::cmp::Reverse(b.discrete_score()));
    gpus.extend(amd.into_iter().map(|b| GpuBackendEnum::Amd(Box::new(b))));

    // Not all card indices exist or belong to Intel
    gpus.extend(
        (0..MAX_DRM_CARDS)
            .filter_map(|i| IntelBackend::new(i).ok())
            .map(|b| GpuBackendEnum::Intel(Box::new(b))),
    );

    if gpus.is_empty() {
        log::warn!("No GPUs detected");
    } else {
        log::warn!("Total GPUs detected: {}", gpus.len());
        for gpu_info in gpus.iter().map(|g| g.info()) {
            log::info!(
                "  [{}] {} - {}",
                gpu_info.index,
                gpu_info.vendor.as_str(),
                gpu_info.name
            );
        }
    }

    gpus
}
