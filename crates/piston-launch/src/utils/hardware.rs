use once_cell::sync::Lazy;
use std::sync::Mutex;
use sysinfo::System;

static SYSTEM: Lazy<Mutex<System>> = Lazy::new(|| {
    let mut sys = System::new();
    sys.refresh_memory();
    Mutex::new(sys)
});

/// Returns the total physical memory in Megabytes (0 if it cannot be read)
pub fn get_total_memory_mb() -> u64 {
    let mut sys = SYSTEM.lock().unwrap_or_else(|e| e.into_inner());
    sys.refresh_memory();
    sys.total_memory() / 1024 / 1024
}

/// Clamp requested heap bounds to what the machine can actually provide.
///
/// `total_mb == 0` means the probe failed and bounds are passed through.
/// The minimum never exceeds the maximum.
pub fn clamp_heap(min_mb: u32, max_mb: u32, total_mb: u64) -> (u32, u32) {
    let mut max = max_mb.max(1);
    if total_mb > 0 {
        let ceiling = u32::try_from(total_mb).unwrap_or(u32::MAX);
        if max > ceiling {
            log::warn!(
                "[launch] Requested -Xmx{}M exceeds physical memory ({}M); clamping",
                max,
                ceiling
            );
            max = ceiling;
        }
    }
    (min_mb.min(max), max)
}
